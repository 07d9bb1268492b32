//! Chart inspection reports
//!
//! Every report is a stream of YAML documents. Each document opens with
//! `# Chart:` or `# Source:` comments naming where its content came from.

use serde_json::{Map, Value as JsonValue};

use crate::archive::{read_chart_dir, read_chart_file};
use crate::chart::ResolvedChart;
use crate::error::{CoreError, Result};
use crate::value_chain::{Axis, Selectors};

/// Plain values file shipped with every chart
pub const CHART_VALUES_FILE: &str = "values.yaml";

/// Chart metadata file
pub const CHART_FILE: &str = "Chart.yaml";

/// Values a chart gets before any lookup on disk
///
/// Starts with the inline `values` and `resource-profiles` of the chart entry
/// found in `source`, then the chart's embedded resource profiles, embedded
/// values and plain `values.yaml`. With `selectors`, inline and embedded
/// documents are reduced to the current environment and profile. Secrets are
/// never shown.
pub fn values_report(
    chart: &ResolvedChart,
    source: &str,
    selectors: Option<&Selectors>,
) -> Result<String> {
    let mut out = format!("---\n# Chart: {}\n# Source: {}\n", chart.name, source);

    let mut inline = Map::new();
    for axis in [Axis::Values, Axis::ResourceProfile] {
        let Some(value) = axis.inline(&chart.spec) else {
            continue;
        };
        let value = match selectors {
            Some(selectors) => value.get(selectors.for_axis(axis)),
            None => Some(value),
        };
        if let Some(value) = value {
            inline.insert(axis.name().to_string(), value.clone());
        }
    }
    if !inline.is_empty() {
        out.push_str(&serde_yaml::to_string(&JsonValue::Object(inline))?);
    }

    let files = [
        (Axis::ResourceProfile.embedded_file(), Some(Axis::ResourceProfile)),
        (Axis::Values.embedded_file(), Some(Axis::Values)),
        (CHART_VALUES_FILE.to_string(), None),
    ];
    for (file, axis) in files {
        let Some(content) = read_chart_file(&chart.chartref, &chart.name, &file)? else {
            tracing::debug!("No {} in {}", file, chart.chartref.display());
            continue;
        };

        out.push_str(&format!("---\n# Source: {}\n", source_label(chart, &file)));
        match (selectors, axis) {
            (Some(selectors), Some(axis)) => {
                let document: JsonValue = serde_yaml::from_slice(&content)?;
                let selector = selectors.for_axis(axis);
                match document.get(selector) {
                    Some(selected) => out.push_str(&serde_yaml::to_string(selected)?),
                    None => tracing::warn!(
                        "{} {} not found in {} of chart {}",
                        axis.selector_key(),
                        selector,
                        file,
                        chart.name
                    ),
                }
            }
            _ => push_content(&mut out, &content),
        }
    }

    Ok(out)
}

/// The chart's `Chart.yaml`
pub fn chart_report(chart: &ResolvedChart) -> Result<String> {
    let content = read_chart_file(&chart.chartref, &chart.name, CHART_FILE)?.ok_or_else(|| {
        CoreError::InvalidChart {
            message: format!("no {} in {}", CHART_FILE, chart.chartref.display()),
        }
    })?;

    let mut out = format!("---\n# Chart: {}\n", chart.name);
    push_content(&mut out, &content);
    Ok(out)
}

/// Every file under the chart's `templates/`, sorted by path
pub fn templates_report(chart: &ResolvedChart) -> Result<String> {
    let mut out = format!("# Chart: {}\n", chart.name);
    for (path, content) in read_chart_dir(&chart.chartref, &chart.name, "templates")? {
        out.push_str(&format!("---\n# Source: {}/{}\n", chart.name, path));
        push_content(&mut out, &content);
    }
    Ok(out)
}

fn source_label(chart: &ResolvedChart, file: &str) -> String {
    if chart.is_archive() {
        format!("{}:{}/{}", chart.chartref.display(), chart.name, file)
    } else {
        chart.chartref.join(file).display().to_string()
    }
}

fn push_content(out: &mut String, content: &[u8]) {
    out.push_str(&String::from_utf8_lossy(content));
    if !out.ends_with('\n') {
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::test_support::write_archive;
    use crate::chart::ChartSpec;
    use serde_json::json;
    use tempfile::TempDir;

    fn web_archive(dir: &TempDir) -> ResolvedChart {
        let archive = dir.path().join("web-1.0.0.tgz");
        write_archive(
            &archive,
            &[
                ("web/Chart.yaml", "name: web\nversion: 1.0.0\n"),
                ("web/values.yaml", "replicas: 1\n"),
                ("web/convoy-values.yaml", "dev:\n  debug: true\nprod:\n  debug: false\n"),
                ("web/templates/service.yaml", "kind: Service"),
                ("web/templates/deployment.yaml", "kind: Deployment\n"),
            ],
        );
        let spec = ChartSpec {
            name: Some("web".to_string()),
            values: Some(json!({"dev": {"replicas": 2}, "prod": {"replicas": 5}})),
            secrets: Some(json!({"dev": {"password": "hunter2"}})),
            resource_profiles: Some(json!({"small": {"cpu": "100m"}})),
            ..Default::default()
        };
        ResolvedChart::new("web", Some("1.0.0".to_string()), archive, spec).unwrap()
    }

    #[test]
    fn test_values_report_lists_every_source() {
        let dir = TempDir::new().unwrap();
        let chart = web_archive(&dir);

        let report = values_report(&chart, "convoy.yaml", None).unwrap();
        let archive = chart.chartref.display().to_string();

        assert!(report.starts_with("---\n# Chart: web\n# Source: convoy.yaml\n"));
        assert!(report.contains("prod:\n    replicas: 5\n"));
        assert!(report.contains(&format!("# Source: {}:web/convoy-values.yaml\n", archive)));
        assert!(report.contains("prod:\n  debug: false\n"));
        assert!(report.ends_with(&format!("# Source: {}:web/values.yaml\nreplicas: 1\n", archive)));
        assert!(!report.contains("convoy-resource-profiles.yaml"));
        assert!(!report.contains("hunter2"));
    }

    #[test]
    fn test_values_report_reduced_to_selectors() {
        let dir = TempDir::new().unwrap();
        let chart = web_archive(&dir);
        let selectors = Selectors::new("dev", "small");

        let report = values_report(&chart, "convoy.yaml", Some(&selectors)).unwrap();

        assert!(report.contains("values:\n  replicas: 2\n"));
        assert!(report.contains("resource-profiles:\n  cpu: 100m\n"));
        assert!(report.contains("web/convoy-values.yaml\ndebug: true\n"));
        assert!(!report.contains("replicas: 5"));
        assert!(!report.contains("debug: false"));
    }

    #[test]
    fn test_values_report_for_directory_chart() {
        let dir = TempDir::new().unwrap();
        let chartref = dir.path().join("api");
        std::fs::create_dir_all(&chartref).unwrap();
        std::fs::write(chartref.join("values.yaml"), "port: 80").unwrap();
        let chart = ResolvedChart::new("api", None, &chartref, ChartSpec::default()).unwrap();

        let report = values_report(&chart, "convoy.yaml", None).unwrap();
        assert_eq!(
            report,
            format!(
                "---\n# Chart: api\n# Source: convoy.yaml\n---\n# Source: {}\nport: 80\n",
                chartref.join("values.yaml").display()
            )
        );
    }

    #[test]
    fn test_chart_report() {
        let dir = TempDir::new().unwrap();
        let chart = web_archive(&dir);
        assert_eq!(
            chart_report(&chart).unwrap(),
            "---\n# Chart: web\nname: web\nversion: 1.0.0\n"
        );

        let empty = ResolvedChart::new("api", None, dir.path(), ChartSpec::default()).unwrap();
        assert!(matches!(
            chart_report(&empty),
            Err(CoreError::InvalidChart { .. })
        ));
    }

    #[test]
    fn test_templates_report_in_path_order() {
        let dir = TempDir::new().unwrap();
        let chart = web_archive(&dir);
        assert_eq!(
            templates_report(&chart).unwrap(),
            "# Chart: web\n\
             ---\n# Source: web/templates/deployment.yaml\nkind: Deployment\n\
             ---\n# Source: web/templates/service.yaml\nkind: Service\n"
        );
    }
}

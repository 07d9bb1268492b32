//! Chart entries and resolved targets

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::PathBuf;

use crate::error::{CoreError, Result};

/// Values key used for the ingress host when a chart does not name one
pub const DEFAULT_INGRESS_VARIABLE: &str = "ingress.host";

/// A chart entry as declared under `charts:`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChartSpec {
    /// Chart name
    #[serde(default)]
    pub name: Option<String>,

    /// Chart version, used to fetch `<name>-<version>.tgz`
    #[serde(default, deserialize_with = "scalar_string")]
    pub version: Option<String>,

    /// Local directory or archive; skips the fetch when set
    #[serde(default)]
    pub chartref: Option<String>,

    /// Values file overriding the conventional lookup
    #[serde(default)]
    pub configref: Option<String>,

    /// Secrets file overriding the conventional lookup
    #[serde(default)]
    pub secretref: Option<String>,

    /// Resource profile file overriding the conventional lookup
    #[serde(default)]
    pub profileref: Option<String>,

    /// Inline values, keyed by environment
    #[serde(default)]
    pub values: Option<JsonValue>,

    /// Inline secrets, keyed by environment
    #[serde(default)]
    pub secrets: Option<JsonValue>,

    /// Inline resource profiles, keyed by profile
    #[serde(default)]
    pub resource_profiles: Option<JsonValue>,

    /// Values key receiving the ingress host
    #[serde(default)]
    pub ingress_variable: Option<String>,
}

impl ChartSpec {
    /// Parse one raw entry of the `charts` sequence
    pub fn from_value(value: &JsonValue) -> Result<Self> {
        serde_json::from_value(value.clone()).map_err(|e| CoreError::InvalidChart {
            message: e.to_string(),
        })
    }

    /// Name, if present and non-empty
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }

    pub fn ingress_variable(&self) -> &str {
        self.ingress_variable
            .as_deref()
            .unwrap_or(DEFAULT_INGRESS_VARIABLE)
    }
}

/// Accept `version: 1.0` as well as `version: "1.0"`
fn scalar_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Option::<JsonValue>::deserialize(deserializer)? {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::String(s)) => Ok(Some(s)),
        Some(JsonValue::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a version string, found {}",
            other
        ))),
    }
}

/// A chart selected for the run, with a concrete reference
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedChart {
    pub name: String,
    pub version: Option<String>,
    /// Directory or archive handed to the templating tool, never empty
    pub chartref: PathBuf,
    pub spec: ChartSpec,
}

impl ResolvedChart {
    pub fn new(
        name: impl Into<String>,
        version: Option<String>,
        chartref: impl Into<PathBuf>,
        spec: ChartSpec,
    ) -> Result<Self> {
        let chartref = chartref.into();
        if chartref.as_os_str().is_empty() {
            return Err(CoreError::InvalidChart {
                message: "empty chart reference".to_string(),
            });
        }
        Ok(Self {
            name: name.into(),
            version,
            chartref,
            spec,
        })
    }

    /// Whether the reference is a packaged `.tgz` archive
    pub fn is_archive(&self) -> bool {
        is_archive_path(&self.chartref)
    }
}

/// Chart archives are gzipped tarballs named `*.tgz`
pub fn is_archive_path(path: &std::path::Path) -> bool {
    path.extension().is_some_and(|ext| ext == "tgz")
}

/// File name of a packaged chart in the registry
pub fn archive_name(name: &str, version: &str) -> String {
    format!("{}-{}.tgz", name, version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_entry() {
        let spec = ChartSpec::from_value(&json!({
            "name": "web",
            "version": "1.2.0",
            "configref": "custom/web.yaml",
            "resource-profiles": {"small": {"cpu": "100m"}},
            "ingress-variable": "web.ingress.host"
        }))
        .unwrap();

        assert_eq!(spec.name(), Some("web"));
        assert_eq!(spec.version.as_deref(), Some("1.2.0"));
        assert_eq!(spec.configref.as_deref(), Some("custom/web.yaml"));
        assert_eq!(spec.resource_profiles, Some(json!({"small": {"cpu": "100m"}})));
        assert_eq!(spec.ingress_variable(), "web.ingress.host");
    }

    #[test]
    fn test_numeric_version_is_accepted() {
        let spec = ChartSpec::from_value(&json!({"name": "web", "version": 2})).unwrap();
        assert_eq!(spec.version.as_deref(), Some("2"));
    }

    #[test]
    fn test_missing_name_and_default_ingress_variable() {
        let spec = ChartSpec::from_value(&json!({"version": "1.0.0"})).unwrap();
        assert_eq!(spec.name(), None);
        assert_eq!(spec.ingress_variable(), DEFAULT_INGRESS_VARIABLE);

        let empty = ChartSpec::from_value(&json!({"name": ""})).unwrap();
        assert_eq!(empty.name(), None);
    }

    #[test]
    fn test_non_mapping_entry_is_invalid() {
        assert!(matches!(
            ChartSpec::from_value(&json!("web")),
            Err(CoreError::InvalidChart { .. })
        ));
    }

    #[test]
    fn test_resolved_chart_requires_reference() {
        assert!(ResolvedChart::new("web", None, "", ChartSpec::default()).is_err());

        let chart = ResolvedChart::new("web", None, "charts/web-1.0.0.tgz", ChartSpec::default())
            .unwrap();
        assert!(chart.is_archive());
        assert_eq!(archive_name("web", "1.0.0"), "web-1.0.0.tgz");
    }
}

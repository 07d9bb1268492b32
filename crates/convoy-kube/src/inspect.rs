//! Chart inspection through the templating tool

use async_trait::async_trait;
use serde_yaml::Value as YamlValue;
use std::path::Path;
use std::process::Stdio;

use crate::error::{KubeError, Result};

/// Name and version declared by a chart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartMetadata {
    pub name: String,
    pub version: Option<String>,
}

impl ChartMetadata {
    /// Parse the YAML printed by `helm inspect chart`
    pub fn from_yaml(chartref: &Path, yaml: &str) -> Result<Self> {
        let invalid = |message: String| KubeError::Inspect {
            chartref: chartref.display().to_string(),
            message,
        };

        let doc: YamlValue =
            serde_yaml::from_str(yaml).map_err(|e| invalid(format!("unparsable output: {}", e)))?;

        let name = match doc.get("name") {
            Some(YamlValue::String(name)) if !name.is_empty() => name.clone(),
            _ => return Err(invalid("output has no chart name".to_string())),
        };
        let version = match doc.get("version") {
            Some(YamlValue::String(v)) => Some(v.clone()),
            Some(YamlValue::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        Ok(Self { name, version })
    }
}

/// Learns the declared name and version of a local chart
#[async_trait]
pub trait ChartInspector: Send + Sync {
    async fn inspect(&self, chartref: &Path) -> Result<ChartMetadata>;
}

/// Runs `<helm> inspect chart <chartref>`
#[derive(Debug, Clone)]
pub struct HelmInspector {
    program: String,
}

impl HelmInspector {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl ChartInspector for HelmInspector {
    async fn inspect(&self, chartref: &Path) -> Result<ChartMetadata> {
        tracing::debug!(
            "Inspecting chart, executing {} inspect chart {}",
            self.program,
            chartref.display()
        );

        let output = tokio::process::Command::new(&self.program)
            .args(["inspect", "chart"])
            .arg(chartref)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| KubeError::Spawn {
                program: self.program.clone(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(KubeError::Inspect {
                chartref: chartref.display().to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let metadata = ChartMetadata::from_yaml(chartref, &String::from_utf8_lossy(&output.stdout))?;
        tracing::debug!(
            "* chartref {} == {} {}",
            chartref.display(),
            metadata.name,
            metadata.version.as_deref().unwrap_or("")
        );
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metadata() {
        let meta = ChartMetadata::from_yaml(
            Path::new("charts/web"),
            "apiVersion: v1\nname: web\nversion: 1.4.2\ndescription: Web tier\n",
        )
        .unwrap();
        assert_eq!(meta.name, "web");
        assert_eq!(meta.version.as_deref(), Some("1.4.2"));
    }

    #[test]
    fn test_parse_numeric_version() {
        let meta = ChartMetadata::from_yaml(Path::new("x"), "name: x\nversion: 2\n").unwrap();
        assert_eq!(meta.version.as_deref(), Some("2"));
    }

    #[test]
    fn test_missing_name_is_an_error() {
        let err = ChartMetadata::from_yaml(Path::new("charts/web"), "version: 1.0.0\n").unwrap_err();
        assert!(matches!(err, KubeError::Inspect { chartref, .. } if chartref == "charts/web"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_inspector_reports_stderr() {
        let inspector = HelmInspector::new("false");
        let err = inspector.inspect(Path::new("charts/web")).await.unwrap_err();
        assert!(matches!(err, KubeError::Inspect { .. }));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let inspector = HelmInspector::new("convoy-no-such-helm-binary");
        let err = inspector.inspect(Path::new("charts/web")).await.unwrap_err();
        assert!(matches!(err, KubeError::Spawn { .. }));
    }
}

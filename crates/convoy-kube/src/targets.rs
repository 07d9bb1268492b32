//! Chart target resolution
//!
//! Turns the declared `charts` list, plus an optional `--chart` filter, into the
//! ordered list of charts the run acts on. Each resolved target has a concrete
//! chart reference: either the declared `chartref` or a freshly fetched archive.

use std::path::Path;

use convoy_core::{ChartSpec, Config, ResolvedChart, Workspace, is_archive_path};
use convoy_repo::ChartFetcher;

use crate::error::{KubeError, Result};
use crate::inspect::ChartInspector;

/// Targets of a run plus the declared entries that had to be skipped
#[derive(Debug, Clone, Default)]
pub struct TargetResolution {
    pub targets: Vec<ResolvedChart>,
    /// One message per skipped invalid entry
    pub invalid: Vec<String>,
}

impl TargetResolution {
    pub fn names(&self) -> Vec<&str> {
        self.targets.iter().map(|t| t.name.as_str()).collect()
    }
}

/// Resolves chart targets against a workspace
pub struct TargetResolver<'a> {
    workspace: &'a Workspace,
    inspector: &'a dyn ChartInspector,
    fetcher: &'a dyn ChartFetcher,
}

impl<'a> TargetResolver<'a> {
    pub fn new(
        workspace: &'a Workspace,
        inspector: &'a dyn ChartInspector,
        fetcher: &'a dyn ChartFetcher,
    ) -> Self {
        Self {
            workspace,
            inspector,
            fetcher,
        }
    }

    pub async fn resolve(&self, config: &Config, filter: Option<&str>) -> Result<TargetResolution> {
        if let Some(filter) = filter {
            let candidate = self.workspace.resolve(filter);
            if is_local_chart(&candidate) {
                return self.resolve_local(&candidate).await;
            }
        }

        let mut resolution = TargetResolution::default();

        for (index, entry) in config.charts().iter().enumerate() {
            let spec = match ChartSpec::from_value(entry) {
                Ok(spec) => spec,
                Err(e) => {
                    tracing::error!("Invalid chart at position {}: {}", index + 1, e);
                    resolution.invalid.push(e.to_string());
                    continue;
                }
            };

            let Some(name) = spec.name().map(str::to_string) else {
                tracing::error!("Invalid chart: missing name");
                resolution
                    .invalid
                    .push(format!("chart at position {} is missing a name", index + 1));
                continue;
            };

            if filter.is_some_and(|f| f != name) {
                continue;
            }

            let version = spec.version.clone();
            let chartref = match spec.chartref.as_deref().filter(|r| !r.is_empty()) {
                Some(chartref) => self.workspace.resolve(chartref),
                None => {
                    let Some(version) = version.as_deref() else {
                        tracing::error!("Invalid chart {}: no chartref and no version", name);
                        resolution
                            .invalid
                            .push(format!("chart {} has neither chartref nor version", name));
                        continue;
                    };
                    self.fetcher.fetch(&name, version).await.inspect_err(|e| {
                        tracing::error!(
                            "Failed to fetch chart {} with version {}: {}",
                            name,
                            version,
                            e
                        );
                    })?
                }
            };

            resolution
                .targets
                .push(ResolvedChart::new(name, version, chartref, spec)?);
        }

        if let Some(filter) = filter
            && resolution.targets.is_empty()
        {
            return Err(KubeError::NoMatchingTarget {
                chart: filter.to_string(),
            });
        }

        Ok(resolution)
    }

    /// A local chart given on the command line, bypassing the declared list
    async fn resolve_local(&self, chartref: &Path) -> Result<TargetResolution> {
        let metadata = self.inspector.inspect(chartref).await?;
        let spec = ChartSpec {
            name: Some(metadata.name.clone()),
            version: metadata.version.clone(),
            chartref: Some(chartref.display().to_string()),
            ..Default::default()
        };
        let target = ResolvedChart::new(metadata.name, metadata.version, chartref, spec)?;
        Ok(TargetResolution {
            targets: vec![target],
            invalid: Vec::new(),
        })
    }
}

/// An existing chart directory or `.tgz` file
fn is_local_chart(path: &Path) -> bool {
    path.is_dir() || (is_archive_path(path) && path.is_file())
}

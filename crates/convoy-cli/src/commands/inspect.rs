//! Inspect command - what declared charts ship and what the config sets for them
//!
//! Targets are resolved the same way as for a deployment, so `--chart` filters
//! by name or points at a local chart, and charts without a `chartref` are
//! fetched. Nothing is validated or run.

use async_trait::async_trait;
use std::path::PathBuf;

use convoy_core::{
    ResolvedChart, Selectors, Workspace, archive_name, chart_report, keys, templates_report,
    values_report,
};
use convoy_kube::{HelmInspector, TargetResolver};
use convoy_repo::{ChartFetcher, HttpChartFetcher, RepoError, RetryPolicy};

use crate::GlobalArgs;
use crate::commands::deploy::gather_in;
use crate::error::Result;

/// What to print for each chart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Inline and embedded values, optionally reduced to the current selectors
    Values { use_context: bool },
    /// The chart's metadata file
    Chart,
    /// The chart's templates
    Templates,
}

pub async fn run(view: View, args: &GlobalArgs) -> Result<()> {
    let workspace = Workspace::current();
    let gathered = gather_in(&workspace, args)?;
    let config = gathered.config;

    if config.charts().is_empty() {
        tracing::info!("Config does not contain any charts. Nothing to inspect.");
        return Ok(());
    }

    let selectors = match view {
        View::Values { use_context: true } => Some(Selectors::from_config(&config)?),
        _ => None,
    };

    let tools = args.tool_config();
    let inspector = HelmInspector::new(&tools.helm);
    let http;
    let fetcher: &dyn ChartFetcher = match config.get_str(keys::REGISTRY_URL) {
        Some(registry) => {
            http = HttpChartFetcher::with_options(
                registry,
                workspace.charts_dir(),
                config.get_bool(keys::INSECURE_SKIP_TLS),
                RetryPolicy::default(),
            )?;
            &http
        }
        None => &NoRegistry,
    };

    let resolution = TargetResolver::new(&workspace, &inspector, fetcher)
        .resolve(&config, args.chart.as_deref())
        .await?;

    let source = if gathered.loaded.is_empty() {
        "command line".to_string()
    } else {
        gathered
            .loaded
            .iter()
            .map(|path| path.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };

    for target in &resolution.targets {
        print!("{}", report(view, target, &source, selectors.as_ref())?);
    }
    Ok(())
}

fn report(
    view: View,
    chart: &ResolvedChart,
    source: &str,
    selectors: Option<&Selectors>,
) -> Result<String> {
    let out = match view {
        View::Values { .. } => values_report(chart, source, selectors)?,
        View::Chart => chart_report(chart)?,
        View::Templates => templates_report(chart)?,
    };
    Ok(out)
}

/// Fetcher used when no registry is configured
struct NoRegistry;

#[async_trait]
impl ChartFetcher for NoRegistry {
    async fn fetch(&self, name: &str, version: &str) -> convoy_repo::Result<PathBuf> {
        Err(RepoError::InvalidRegistryUrl {
            url: String::new(),
            reason: format!(
                "`{}` is not set, cannot fetch {}",
                keys::REGISTRY_URL,
                archive_name(name, version)
            ),
        })
    }
}

//! Value chains: the override sources attached to each chart
//!
//! Three independent axes are resolved per chart. Values and secrets are
//! selected by environment, resource profiles by profile. Each axis collects,
//! from lowest to highest precedence:
//!
//! 1. chart-embedded defaults (`convoy-<axis>.yaml` inside the chart, reduced to the selector)
//! 2. the shared top-level file `<axis>.yaml`
//! 3. the reference file: override ref, `<axis>/<selector>/<chart>.yaml`, or `<axis>/<chart>.yaml`
//! 4. inline pairs from the chart entry, flattened
//!
//! Sources that do not exist are left out.

use serde_json::Value as JsonValue;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::archive::read_chart_file;
use crate::chart::{ChartSpec, ResolvedChart};
use crate::config::{Config, keys};
use crate::error::{CoreError, Result};
use crate::flatten::collapse;
use crate::workspace::Workspace;

/// Independent override dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Values,
    Secrets,
    ResourceProfile,
}

impl Axis {
    /// Directory root and shared file stem
    pub fn name(self) -> &'static str {
        match self {
            Axis::Values => "values",
            Axis::Secrets => "secrets",
            Axis::ResourceProfile => "resource-profiles",
        }
    }

    /// `<axis>.yaml` in the working directory
    pub fn shared_file(self) -> String {
        format!("{}.yaml", self.name())
    }

    /// Defaults file shipped inside a chart
    pub fn embedded_file(self) -> String {
        format!("convoy-{}.yaml", self.name())
    }

    /// Configuration key holding this axis's selector
    pub fn selector_key(self) -> &'static str {
        match self {
            Axis::Values | Axis::Secrets => keys::ENVIRONMENT,
            Axis::ResourceProfile => keys::PROFILE,
        }
    }

    fn override_field(self) -> &'static str {
        match self {
            Axis::Values => "configref",
            Axis::Secrets => "secretref",
            Axis::ResourceProfile => "profileref",
        }
    }

    fn override_ref(self, spec: &ChartSpec) -> Option<&str> {
        match self {
            Axis::Values => spec.configref.as_deref(),
            Axis::Secrets => spec.secretref.as_deref(),
            Axis::ResourceProfile => spec.profileref.as_deref(),
        }
        .filter(|r| !r.is_empty())
    }

    pub(crate) fn inline(self, spec: &ChartSpec) -> Option<&JsonValue> {
        match self {
            Axis::Values => spec.values.as_ref(),
            Axis::Secrets => spec.secrets.as_ref(),
            Axis::ResourceProfile => spec.resource_profiles.as_ref(),
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Selector values for the axes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selectors {
    pub environment: String,
    pub profile: String,
}

impl Selectors {
    pub fn new(environment: impl Into<String>, profile: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            profile: profile.into(),
        }
    }

    /// Read the environment and profile from a validated configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let environment = config.get_str(keys::ENVIRONMENT);
        let profile = config.get_str(keys::PROFILE);
        match (environment, profile) {
            (Some(environment), Some(profile)) => Ok(Self::new(environment, profile)),
            _ => Err(CoreError::MissingKeys {
                keys: [keys::ENVIRONMENT, keys::PROFILE]
                    .into_iter()
                    .filter(|k| config.get_str(k).is_none())
                    .map(str::to_string)
                    .collect(),
            }),
        }
    }

    pub fn for_axis(&self, axis: Axis) -> &str {
        match axis {
            Axis::Values | Axis::Secrets => &self.environment,
            Axis::ResourceProfile => &self.profile,
        }
    }
}

/// One override source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// A values file (`-f`)
    File(PathBuf),
    /// A single `key=value` assignment (`--set`)
    Set(String),
}

/// Ordered sources of one axis, lowest precedence first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueLayer {
    pub axis: Axis,
    pub sources: Vec<ValueSource>,
    /// How each source was picked or why it is absent, in lookup order
    pub notes: Vec<String>,
}

impl ValueLayer {
    pub fn new(axis: Axis) -> Self {
        Self {
            axis,
            sources: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.sources.iter().filter_map(|s| match s {
            ValueSource::File(path) => Some(path.as_path()),
            ValueSource::Set(_) => None,
        })
    }
}

/// All three axes of a chart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueChain {
    pub values: ValueLayer,
    pub secrets: ValueLayer,
    pub resource_profile: ValueLayer,
}

impl ValueChain {
    pub fn empty() -> Self {
        Self {
            values: ValueLayer::new(Axis::Values),
            secrets: ValueLayer::new(Axis::Secrets),
            resource_profile: ValueLayer::new(Axis::ResourceProfile),
        }
    }
}

/// Resolves value chains against a workspace
#[derive(Debug, Clone)]
pub struct ValueChainResolver<'a> {
    workspace: &'a Workspace,
    selectors: &'a Selectors,
    /// Where reduced chart-embedded defaults are written; disabled when `None`
    scratch: Option<&'a Path>,
}

impl<'a> ValueChainResolver<'a> {
    pub fn new(workspace: &'a Workspace, selectors: &'a Selectors) -> Self {
        Self {
            workspace,
            selectors,
            scratch: None,
        }
    }

    /// Enable chart-embedded defaults, materialized under `dir`
    pub fn with_scratch(mut self, dir: &'a Path) -> Self {
        self.scratch = Some(dir);
        self
    }

    pub fn resolve(&self, chart: &ResolvedChart) -> Result<ValueChain> {
        Ok(ValueChain {
            values: self.resolve_axis(chart, Axis::Values)?,
            secrets: self.resolve_axis(chart, Axis::Secrets)?,
            resource_profile: self.resolve_axis(chart, Axis::ResourceProfile)?,
        })
    }

    pub fn resolve_axis(&self, chart: &ResolvedChart, axis: Axis) -> Result<ValueLayer> {
        let mut layer = ValueLayer::new(axis);
        let selector = self.selectors.for_axis(axis);
        let selector_key = axis.selector_key();

        if let Some(path) = self.embedded_defaults(chart, axis, &mut layer.notes)? {
            layer.sources.push(ValueSource::File(path));
        }

        match self.shared_file(axis) {
            Some(path) => {
                layer
                    .notes
                    .push(format!("Appending shared {} file {}", axis, path.display()));
                layer.sources.push(ValueSource::File(path));
            }
            None => layer
                .notes
                .push(format!("No shared {} found", axis.shared_file())),
        }

        match self.locate_reference(chart, axis) {
            Some((path, note)) => {
                layer.notes.push(note);
                layer.sources.push(ValueSource::File(path));
            }
            None => layer
                .notes
                .push(format!("No {} file found for chart {}", axis, chart.name)),
        }

        let pairs = self.inline_pairs(&chart.spec, axis);
        if pairs.is_empty() {
            layer.notes.push(format!(
                "No inline {} for chart {} found in chart config for {} {}",
                axis, chart.name, selector_key, selector
            ));
        } else {
            layer.notes.push(format!(
                "Appending {} inline {} value(s) found in chart config for {} {} under '{}:'",
                pairs.len(),
                axis,
                selector_key,
                selector,
                axis
            ));
            layer.sources.extend(pairs.into_iter().map(ValueSource::Set));
        }

        tracing::debug!(
            "{} {}: {} source(s) for selector {}",
            chart.name,
            axis,
            layer.sources.len(),
            selector
        );
        Ok(layer)
    }

    /// Reference file: explicit override, then selector-specific, then base case
    pub fn reference_path(&self, chart: &ResolvedChart, axis: Axis) -> Option<PathBuf> {
        self.locate_reference(chart, axis).map(|(path, _)| path)
    }

    fn locate_reference(&self, chart: &ResolvedChart, axis: Axis) -> Option<(PathBuf, String)> {
        if let Some(reference) = axis.override_ref(&chart.spec) {
            let path = self.workspace.resolve(reference);
            if !path.exists() {
                tracing::warn!(
                    "{} for chart {} points at missing file {}",
                    axis,
                    chart.name,
                    path.display()
                );
            }
            let note = format!(
                "Appending {} file {} since it is set as '{}' in chart config",
                axis,
                path.display(),
                axis.override_field()
            );
            return Some((path, note));
        }

        let file = format!("{}.yaml", chart.name);
        let selector = self.selectors.for_axis(axis);
        let selected = Path::new(axis.name()).join(selector).join(&file);
        if self.workspace.exists(&selected) {
            let path = self.workspace.resolve(selected);
            let note = format!(
                "Appending {} file {} for {} {}",
                axis,
                path.display(),
                axis.selector_key(),
                selector
            );
            return Some((path, note));
        }

        let base = Path::new(axis.name()).join(&file);
        if self.workspace.exists(&base) {
            let path = self.workspace.resolve(base);
            let note = format!("Appending base {} file {}", axis, path.display());
            return Some((path, note));
        }

        None
    }

    /// Shared top-level `<axis>.yaml`, if present
    pub fn shared_file(&self, axis: Axis) -> Option<PathBuf> {
        let file = axis.shared_file();
        self.workspace
            .exists(&file)
            .then(|| self.workspace.resolve(&file))
    }

    /// Inline entry for the selector, flattened
    pub fn inline_pairs(&self, spec: &ChartSpec, axis: Axis) -> Vec<String> {
        axis.inline(spec)
            .and_then(|inline| inline.get(self.selectors.for_axis(axis)))
            .map(collapse)
            .unwrap_or_default()
    }

    /// Chart-embedded defaults reduced to the selector and written to scratch
    fn embedded_defaults(
        &self,
        chart: &ResolvedChart,
        axis: Axis,
        notes: &mut Vec<String>,
    ) -> Result<Option<PathBuf>> {
        let Some(scratch) = self.scratch else {
            return Ok(None);
        };

        let file = axis.embedded_file();
        let chartref = chart.chartref.display();
        let Some(content) = read_chart_file(&chart.chartref, &chart.name, &file)? else {
            notes.push(format!("No {} present in chartref {}", file, chartref));
            return Ok(None);
        };

        let document: JsonValue = serde_yaml::from_slice(&content)?;
        let selector = self.selectors.for_axis(axis);
        let Some(selected) = document.get(selector) else {
            tracing::warn!("{} not found in {} for chartref {}", selector, file, chartref);
            notes.push(format!(
                "{} {} not found in {} of chartref {}",
                axis.selector_key(),
                selector,
                file,
                chartref
            ));
            return Ok(None);
        };

        std::fs::create_dir_all(scratch)?;
        let path = scratch.join(format!("{}-{}.yaml", chart.name, axis.name()));
        std::fs::write(&path, serde_yaml::to_string(selected)?)?;
        notes.push(format!(
            "Appending {} file {} extracted from chartref {} for {} {}",
            axis,
            path.display(),
            chartref,
            axis.selector_key(),
            selector
        ));
        Ok(Some(path))
    }
}

//! Configuration gathering
//!
//! Builds the merged configuration of a run from, in order:
//! 1. the current context of the user context file
//! 2. each project config file
//! 3. command-line overrides
//!
//! and finally substitutes the host name placeholder in ingress hosts.

use std::path::{Path, PathBuf};

use crate::config::{Config, Overrides};
use crate::context::{ContextSelection, UserConfig};
use crate::error::{CoreError, Result};
use crate::workspace::Workspace;

/// Project config file considered when none is named
pub const DEFAULT_CONFIG_FILE: &str = "convoy.yaml";

/// A project config file and whether the user asked for it by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub path: PathBuf,
    pub explicit: bool,
}

impl ConfigFile {
    pub fn default_file() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_CONFIG_FILE),
            explicit: false,
        }
    }

    pub fn explicit(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            explicit: true,
        }
    }
}

/// The default file followed by explicitly named ones
pub fn config_files(explicit: &[PathBuf]) -> Vec<ConfigFile> {
    std::iter::once(ConfigFile::default_file())
        .chain(explicit.iter().cloned().map(ConfigFile::explicit))
        .collect()
}

/// Inputs to [`gather`]
#[derive(Debug, Clone)]
pub struct GatherOptions<'a> {
    pub workspace: &'a Workspace,
    pub user_config: Option<&'a Path>,
    pub config_files: &'a [ConfigFile],
    pub overrides: &'a Overrides,
    /// Replacement for the ingress host placeholder, if any
    pub hostname: Option<&'a str>,
}

/// Result of gathering
#[derive(Debug, Clone)]
pub struct Gathered {
    pub config: Config,
    pub current_context: Option<String>,
    /// Project files that were found and merged
    pub loaded: Vec<PathBuf>,
}

/// Merge every configuration source of a run
pub fn gather(options: &GatherOptions<'_>) -> Result<Gathered> {
    let mut config = Config::new();
    let mut current_context = None;

    match options.user_config {
        Some(path) => {
            if let Some(name) = merge_user_context(&mut config, path)? {
                current_context = Some(name);
            }
        }
        None => tracing::warn!("No user context file location known. Skipping."),
    }

    let mut loaded = Vec::new();
    for file in options.config_files {
        let path = options.workspace.resolve(&file.path);
        if path.exists() {
            let project = Config::from_file(&path)?;
            config.merge(&project);
            tracing::info!("- OK: {}", path.display());
            loaded.push(path);
        } else if file.explicit {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        } else {
            tracing::debug!("Ignoring missing default config file {}", path.display());
        }
    }

    config.apply_overrides(options.overrides);

    if let Some(hostname) = options.hostname {
        let rewritten = config.substitute_ingress_hosts(hostname);
        if rewritten > 0 {
            tracing::debug!("Substituted host name into {} ingress host(s)", rewritten);
        }
    }

    Ok(Gathered {
        config,
        current_context,
        loaded,
    })
}

/// Merge the current context fragment, returning its name
///
/// A missing file or an unusable pointer only warns.
fn merge_user_context(config: &mut Config, path: &Path) -> Result<Option<String>> {
    let Some(user) = UserConfig::load(path)? else {
        tracing::warn!("No user context file found at {}. Skipping.", path.display());
        return Ok(None);
    };

    match user.selection() {
        ContextSelection::Selected { name, fragment }
            if !fragment.is_object() && !fragment.is_null() =>
        {
            tracing::warn!(
                "Context {} in {} is not a mapping. Ignoring.",
                name,
                path.display()
            );
            Ok(None)
        }
        ContextSelection::Selected { name, fragment } => {
            tracing::debug!("current-context is {}", name);
            config.merge_value(fragment);
            Ok(Some(name.to_string()))
        }
        ContextSelection::NoPointer => {
            tracing::warn!("No current-context key found in {}. Ignoring.", path.display());
            Ok(None)
        }
        ContextSelection::UnknownContext { name } => {
            tracing::warn!(
                "Current context {} not found under `contexts`. Ignoring.",
                name
            );
            Ok(None)
        }
    }
}

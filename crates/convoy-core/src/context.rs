//! User-level context file
//!
//! Lives at `~/.convoy/config` by default and selects one named configuration
//! fragment as the current context:
//!
//! ```yaml
//! current-context: dev
//! contexts:
//!   dev:
//!     kube-context: minikube
//!     environment: dev
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

/// Environment variable overriding the user context file location
pub const USER_CONFIG_ENV: &str = "CONVOYCONFIG";

/// Parsed user context file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserConfig {
    /// Name of the active context
    #[serde(
        rename = "current-context",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub current_context: Option<String>,

    /// Named configuration fragments
    #[serde(default)]
    pub contexts: IndexMap<String, JsonValue>,

    /// Unknown keys, preserved when the file is rewritten
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_yaml::Value>,
}

/// Outcome of resolving the current-context pointer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextSelection<'a> {
    /// The pointer names a declared context
    Selected { name: &'a str, fragment: &'a JsonValue },
    /// No `current-context` key
    NoPointer,
    /// The pointer names a context missing from `contexts`
    UnknownContext { name: &'a str },
}

impl UserConfig {
    /// Default location: `~/.convoy/config`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".convoy").join("config"))
    }

    /// Load from a path, `None` if the file does not exist
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Some(Self::default()));
        }
        let config: Self =
            serde_yaml::from_str(&content).map_err(|source| CoreError::ConfigParse {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Some(config))
    }

    /// Write back to a path
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Resolve the current-context pointer
    pub fn selection(&self) -> ContextSelection<'_> {
        let Some(name) = self.current_context.as_deref() else {
            return ContextSelection::NoPointer;
        };
        match self.contexts.get(name) {
            Some(fragment) => ContextSelection::Selected { name, fragment },
            None => ContextSelection::UnknownContext { name },
        }
    }

    /// Declared context names, in file order
    pub fn context_names(&self) -> Vec<&str> {
        self.contexts.keys().map(String::as_str).collect()
    }

    /// Point `current-context` at a declared context
    ///
    /// `contexts` and any other keys are left untouched.
    pub fn use_context(&mut self, name: &str) -> Result<()> {
        if !self.contexts.contains_key(name) {
            return Err(CoreError::UnknownContext {
                name: name.to_string(),
                available: self.contexts.keys().cloned().collect(),
            });
        }
        self.current_context = Some(name.to_string());
        Ok(())
    }
}

//! Configuration tree with deep merge support

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::path::Path;

use crate::error::{CoreError, Result};

/// Well-known configuration keys
pub mod keys {
    pub const KUBE_CONTEXT: &str = "kube-context";
    pub const ENVIRONMENT: &str = "environment";
    pub const PROFILE: &str = "profile";
    pub const REGISTRY_URL: &str = "registry-url";
    pub const INSECURE_SKIP_TLS: &str = "insecure-skip-tls";
    pub const NAMESPACE: &str = "namespace";
    pub const RELEASE: &str = "release";
    pub const GLOBAL: &str = "global";
    pub const INGRESS: &str = "ingress";
    pub const CHARTS: &str = "charts";
    pub const BOOTSTRAP: &str = "bootstrap";
    pub const TEARDOWN: &str = "teardown";
    pub const DEPENDENCIES: &str = "dependencies";
    pub const ADMIN_DEPENDENCIES: &str = "admin-dependencies";
    pub const CLUSTER_ADMIN: &str = "cluster-admin";
}

/// Keys that must resolve to a non-empty string before any tool is invoked
pub const REQUIRED_KEYS: &[&str] = &[
    keys::KUBE_CONTEXT,
    keys::ENVIRONMENT,
    keys::PROFILE,
    keys::REGISTRY_URL,
];

/// Token replaced by the local host name inside ingress hosts
pub const HOSTNAME_PLACEHOLDER: &str = "${HOSTNAME}";

/// Merged configuration tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Config(pub JsonValue);

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self(JsonValue::Object(Map::new()))
    }

    /// Load a configuration document from a YAML file
    ///
    /// An empty document loads as `null`, which merges as a no-op.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let value: JsonValue =
            serde_yaml::from_str(&content).map_err(|source| CoreError::ConfigParse {
                path: path.display().to_string(),
                source,
            })?;

        if !(value.is_object() || value.is_null()) {
            return Err(CoreError::NotAMapping {
                path: path.display().to_string(),
            });
        }
        Ok(Self(value))
    }

    /// Parse a configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: JsonValue = serde_yaml::from_str(yaml)?;
        Ok(Self(value))
    }

    /// Deep merge `source` into this configuration, source wins
    ///
    /// Rules, per key of `source`:
    /// - both mappings: recursive merge
    /// - source sequence: existing sequence followed by source items
    /// - anything else: source replaces target
    pub fn merge(&mut self, source: &Config) {
        merge_value(&mut self.0, &source.0);
    }

    /// Deep merge a raw value (for example a context fragment)
    pub fn merge_value(&mut self, source: &JsonValue) {
        merge_value(&mut self.0, source);
    }

    /// Get a value by dotted path (e.g., "global.ingress")
    pub fn get(&self, path: &str) -> Option<&JsonValue> {
        let parts: Vec<&str> = path.split('.').collect();
        get_nested(&self.0, &parts)
    }

    /// Get a non-empty string value
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path)
            .and_then(JsonValue::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Get a boolean value, `false` when absent
    pub fn get_bool(&self, path: &str) -> bool {
        self.get(path).and_then(JsonValue::as_bool).unwrap_or(false)
    }

    /// Get a sequence of strings, skipping non-string items
    pub fn get_strings(&self, path: &str) -> Vec<String> {
        match self.get(path) {
            Some(JsonValue::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Set a value by dotted path, creating intermediate mappings
    pub fn set(&mut self, path: &str, value: JsonValue) {
        let parts: Vec<&str> = path.split('.').collect();
        set_nested(&mut self.0, &parts, value);
    }

    /// Raw chart entries, in declaration order
    pub fn charts(&self) -> &[JsonValue] {
        match self.get(keys::CHARTS) {
            Some(JsonValue::Array(entries)) => entries,
            _ => &[],
        }
    }

    /// Layer command-line overrides on top of the gathered configuration
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        let pairs = [
            (keys::KUBE_CONTEXT, &overrides.kube_context),
            (keys::ENVIRONMENT, &overrides.environment),
            (keys::PROFILE, &overrides.profile),
            (keys::NAMESPACE, &overrides.namespace),
            (keys::RELEASE, &overrides.release),
            (keys::REGISTRY_URL, &overrides.registry_url),
        ];

        for (key, value) in pairs {
            if let Some(value) = value {
                self.set(key, JsonValue::String(value.clone()));
            }
        }
    }

    /// Required keys that do not resolve to a non-empty string
    pub fn missing_required(&self) -> Vec<&'static str> {
        REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|key| self.get_str(key).is_none())
            .collect()
    }

    /// Fail with every missing required key at once
    pub fn validate(&self) -> Result<()> {
        let missing = self.missing_required();
        if missing.is_empty() {
            return Ok(());
        }
        Err(CoreError::MissingKeys {
            keys: missing.into_iter().map(str::to_string).collect(),
        })
    }

    /// Ingress host registered for a chart under `global.ingress`
    ///
    /// Entries are either a plain host string or a mapping with a `host` key.
    /// Chart names may contain dots, so the lookup is not path based.
    pub fn ingress_host(&self, chart_name: &str) -> Option<&str> {
        let entry = self
            .0
            .get(keys::GLOBAL)?
            .get(keys::INGRESS)?
            .get(chart_name)?;

        match entry {
            JsonValue::String(host) => Some(host.as_str()),
            JsonValue::Object(map) => map.get("host").and_then(JsonValue::as_str),
            _ => None,
        }
    }

    /// Replace [`HOSTNAME_PLACEHOLDER`] in every ingress host
    ///
    /// Returns the number of hosts rewritten.
    pub fn substitute_ingress_hosts(&mut self, hostname: &str) -> usize {
        let Some(ingresses) = self
            .0
            .get_mut(keys::GLOBAL)
            .and_then(|global| global.get_mut(keys::INGRESS))
            .and_then(JsonValue::as_object_mut)
        else {
            return 0;
        };

        let mut rewritten = 0;
        for entry in ingresses.values_mut() {
            let host = match entry {
                JsonValue::Object(map) => map.get_mut("host"),
                other => Some(other),
            };
            if let Some(JsonValue::String(host)) = host {
                if host.contains(HOSTNAME_PLACEHOLDER) {
                    *host = host.replace(HOSTNAME_PLACEHOLDER, hostname);
                    rewritten += 1;
                }
            }
        }
        rewritten
    }

    /// Get the inner JSON value
    pub fn inner(&self) -> &JsonValue {
        &self.0
    }

    /// Convert to JSON value
    pub fn into_inner(self) -> JsonValue {
        self.0
    }

    /// Check if the configuration is empty
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            JsonValue::Object(map) => map.is_empty(),
            JsonValue::Null => true,
            _ => false,
        }
    }

    /// Serialize back to YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.0)?)
    }
}

/// Command-line overrides, applied after all files are merged
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub kube_context: Option<String>,
    pub environment: Option<String>,
    pub profile: Option<String>,
    pub namespace: Option<String>,
    pub release: Option<String>,
    pub registry_url: Option<String>,
}

/// Deep merge `source` into `target`
///
/// A `null` source is a no-op. Merging the same sequence-valued source twice
/// appends its items twice.
pub fn merge_value(target: &mut JsonValue, source: &JsonValue) {
    match (target, source) {
        (_, JsonValue::Null) => {}
        (JsonValue::Object(target_map), JsonValue::Object(source_map)) => {
            for (key, value) in source_map {
                merge_entry(target_map, key, value);
            }
        }
        (target, source) => {
            *target = source.clone();
        }
    }
}

fn merge_entry(target: &mut Map<String, JsonValue>, key: &str, value: &JsonValue) {
    match value {
        JsonValue::Object(_) => {
            if matches!(target.get(key), Some(JsonValue::Object(_))) {
                if let Some(existing) = target.get_mut(key) {
                    merge_value(existing, value);
                }
            } else {
                target.insert(key.to_string(), value.clone());
            }
        }
        JsonValue::Array(items) => {
            let entry = target
                .entry(key.to_string())
                .or_insert_with(|| JsonValue::Array(Vec::new()));
            match entry {
                JsonValue::Array(existing) => existing.extend(items.iter().cloned()),
                other => *other = value.clone(),
            }
        }
        _ => {
            target.insert(key.to_string(), value.clone());
        }
    }
}

fn set_nested(value: &mut JsonValue, path: &[&str], new_value: JsonValue) {
    let Some((key, remaining)) = path.split_first() else {
        *value = new_value;
        return;
    };

    if !value.is_object() {
        *value = JsonValue::Object(Map::new());
    }

    if let JsonValue::Object(map) = value {
        let entry = map.entry(key.to_string()).or_insert(JsonValue::Null);
        set_nested(entry, remaining, new_value);
    }
}

fn get_nested<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a JsonValue> {
    let Some((key, remaining)) = path.split_first() else {
        return Some(value);
    };

    match value {
        JsonValue::Object(map) => map.get(*key).and_then(|v| get_nested(v, remaining)),
        _ => None,
    }
}

//! Convoy Core - configuration and value resolution for deployment runs
//!
//! This crate holds everything that does not talk to the network or spawn
//! processes:
//! - `Config`: the merged run configuration with deep merge support
//! - `UserConfig`: named contexts and the current-context pointer
//! - `gather`: layering of contexts, project files and command-line overrides
//! - `ChartSpec`/`ResolvedChart`: chart entries and their concrete references
//! - `ValueChainResolver`: per-chart values, secrets and resource profiles
//! - `collapse`: flattening of nested values into `--set` assignments
//! - `report`: what a chart ships and what the configuration sets for it

pub mod archive;
pub mod chart;
pub mod config;
pub mod context;
pub mod error;
pub mod flatten;
pub mod gather;
pub mod report;
pub mod value_chain;
pub mod workspace;

pub use chart::{ChartSpec, ResolvedChart, archive_name, is_archive_path};
pub use config::{Config, Overrides, keys};
pub use context::{ContextSelection, USER_CONFIG_ENV, UserConfig};
pub use error::{CoreError, Result};
pub use flatten::{collapse, collapse_with_prefix};
pub use gather::{ConfigFile, DEFAULT_CONFIG_FILE, GatherOptions, Gathered, config_files, gather};
pub use report::{chart_report, templates_report, values_report};
pub use value_chain::{
    Axis, Selectors, ValueChain, ValueChainResolver, ValueLayer, ValueSource,
};
pub use workspace::Workspace;

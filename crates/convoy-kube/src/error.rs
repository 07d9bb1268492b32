//! Error types for convoy-kube

use thiserror::Error;

use convoy_core::CoreError;
use convoy_repo::RepoError;

/// Result type for convoy-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Which half of a pipeline failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Manifest rendering
    Template,
    /// Cluster action, or the pass-through for render-only runs
    Action,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Template => write!(f, "template"),
            Stage::Action => write!(f, "action"),
        }
    }
}

/// Errors that can occur while resolving targets or running pipelines
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// Chart inspection failed or produced unusable output
    #[error("could not inspect chart '{chartref}': {message}")]
    Inspect { chartref: String, message: String },

    /// An external tool could not be started
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A pipeline stage exited unsuccessfully
    #[error("{target}: {stage} stage failed ({status}): {stderr}")]
    PipelineFailed {
        target: String,
        stage: Stage,
        status: String,
        stderr: String,
        /// Targets reported successful before the failure
        completed: Vec<String>,
    },

    /// A chart filter was given but nothing matched it
    #[error("could not find any target for chart '{chart}'")]
    NoMatchingTarget { chart: String },

    /// The user declined the confirmation prompt
    #[error("aborted by user")]
    Aborted,

    /// A bootstrap or teardown script failed
    #[error("script '{path}' failed ({status}): {stderr}")]
    ScriptFailed {
        path: String,
        status: String,
        stderr: String,
    },

    /// Chart fetch error
    #[error(transparent)]
    Fetch(#[from] RepoError),

    /// Configuration error
    #[error(transparent)]
    Core(#[from] CoreError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

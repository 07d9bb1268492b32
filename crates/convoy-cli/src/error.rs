//! CLI error types with exit code handling
//!
//! Library errors are sorted into the classes a user cares about: bad
//! configuration, unresolvable targets, failed pipelines and aborts.

use miette::Diagnostic;
use thiserror::Error;

use convoy_core::CoreError;
use convoy_kube::KubeError;
use convoy_repo::RepoError;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Missing or unusable configuration
    #[error("Configuration error: {message}")]
    #[diagnostic(code(convoy::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Targets could not be resolved or fetched
    #[error("Resolution error: {message}")]
    #[diagnostic(code(convoy::cli::resolution))]
    Resolution { message: String },

    /// A pipeline or helper script failed
    #[error("Execution failed: {message}")]
    #[diagnostic(code(convoy::cli::execution))]
    Execution { message: String },

    /// Declined confirmation
    #[error("Aborted")]
    #[diagnostic(code(convoy::cli::aborted))]
    Aborted,

    /// Ctrl-C
    #[error("Interrupted")]
    #[diagnostic(code(convoy::cli::interrupted))]
    Interrupted,

    /// Command name not recognised
    #[error("Unknown command '{command}'")]
    #[diagnostic(code(convoy::cli::unknown_command))]
    UnknownCommand {
        command: String,
        #[help]
        suggestion: Option<String>,
    },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(convoy::cli::io))]
    Io { message: String },

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(convoy::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config { .. }
            | CliError::Resolution { .. }
            | CliError::Execution { .. }
            | CliError::Aborted
            | CliError::Interrupted
            | CliError::UnknownCommand { .. }
            | CliError::Io { .. }
            | CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a configuration error with help text
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Unknown command, suggesting the closest known one
    pub fn unknown_command(command: impl Into<String>, suggestion: Option<&str>) -> Self {
        Self::UnknownCommand {
            command: command.into(),
            suggestion: suggestion.map(|s| format!("Did you mean '{}'?", s)),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match &err {
            CoreError::MissingKeys { keys } => CliError::config_with_help(
                err.to_string(),
                format!(
                    "Set {} in a config file, the current context, or on the command line (e.g. --{})",
                    keys.join(", "),
                    keys.first().map(String::as_str).unwrap_or("kube-context")
                ),
            ),
            CoreError::UnknownContext { available, .. } => CliError::config_with_help(
                err.to_string(),
                format!("Available contexts: {}", available.join(", ")),
            ),
            CoreError::InvalidChart { .. } | CoreError::Archive { .. } => CliError::Resolution {
                message: err.to_string(),
            },
            _ => CliError::config(err.to_string()),
        }
    }
}

impl From<RepoError> for CliError {
    fn from(err: RepoError) -> Self {
        CliError::Resolution {
            message: err.to_string(),
        }
    }
}

impl From<KubeError> for CliError {
    fn from(err: KubeError) -> Self {
        match err {
            KubeError::Aborted => CliError::Aborted,
            KubeError::Core(e) => e.into(),
            KubeError::Fetch(e) => e.into(),
            KubeError::Inspect { .. } | KubeError::NoMatchingTarget { .. } => {
                CliError::Resolution {
                    message: err.to_string(),
                }
            }
            KubeError::Io(e) => e.into(),
            other => CliError::Execution {
                message: other.to_string(),
            },
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

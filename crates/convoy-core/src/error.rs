//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Cannot find config file {path}")]
    ConfigNotFound { path: String },

    #[error("Failed to parse {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Config file {path} must contain a mapping at the top level")]
    NotAMapping { path: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing required configuration: {}", keys.join(", "))]
    MissingKeys { keys: Vec<String> },

    #[error("Context \"{name}\" not found under `contexts`")]
    UnknownContext { name: String, available: Vec<String> },

    #[error("Invalid chart: {message}")]
    InvalidChart { message: String },

    #[error("Archive error: {message}")]
    Archive { message: String },

    #[error(
        "Directory {dir} declares dependencies while dependencies are already being processed; recursive dependencies are not supported"
    )]
    RecursiveDependencies { dir: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;

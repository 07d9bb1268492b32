//! Error types for registry operations

use thiserror::Error;

/// Registry operation errors
#[derive(Debug, Error)]
pub enum RepoError {
    // ============ Configuration Errors ============
    #[error("Invalid registry URL: {url} - {reason}")]
    InvalidRegistryUrl { url: String, reason: String },

    // ============ Network Errors ============
    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Request timeout: {message}")]
    Timeout { message: String },

    // ============ Fetch Errors ============
    #[error("Could not fetch {url} after {attempts} attempt(s): {last_error}")]
    FetchFailed {
        url: String,
        attempts: u32,
        last_error: String,
    },

    // ============ IO Errors ============
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RepoError>;

impl RepoError {
    /// Whether another attempt could succeed
    ///
    /// Client errors are final, except request timeouts and rate limiting.
    pub fn is_retryable(&self) -> bool {
        match self {
            RepoError::HttpError { status, .. } => {
                !(400..500).contains(status) || matches!(*status, 408 | 429)
            }
            RepoError::InvalidRegistryUrl { .. } | RepoError::Io(_) => false,
            RepoError::NetworkError { .. }
            | RepoError::Timeout { .. }
            | RepoError::FetchFailed { .. } => true,
        }
    }
}

impl From<reqwest::Error> for RepoError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RepoError::Timeout {
                message: e.to_string(),
            }
        } else if e.is_connect() {
            RepoError::NetworkError {
                message: format!("Connection failed: {}", e),
            }
        } else if let Some(status) = e.status() {
            RepoError::HttpError {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            RepoError::NetworkError {
                message: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16) -> RepoError {
        RepoError::HttpError {
            status,
            message: String::new(),
        }
    }

    #[test]
    fn test_client_errors_are_final() {
        assert!(!http(404).is_retryable());
        assert!(!http(403).is_retryable());
        assert!(http(408).is_retryable());
        assert!(http(429).is_retryable());
        assert!(http(503).is_retryable());
        assert!(RepoError::Timeout {
            message: String::new()
        }
        .is_retryable());
    }
}

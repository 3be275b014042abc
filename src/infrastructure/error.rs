use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Cache error types
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum CacheError {
    #[error("remote store error during {operation}: {message}")]
    Remote { operation: String, message: String },

    #[error("serialization error: {message}")]
    Serialization { message: String },

    #[error("compression error: {message}")]
    Compression { message: String },

    #[error("refresh error for key {key}: {message}")]
    Refresh { key: String, message: String },

    #[error("cache `{name}` is already registered with a different policy")]
    PolicyConflict { name: String },

    #[error("cache `{name}` is registered with a different value type")]
    TypeMismatch { name: String },

    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl CacheError {
    /// Whether the failure is expected to clear up on its own (network, origin).
    pub fn is_transient(&self) -> bool {
        matches!(self, CacheError::Remote { .. } | CacheError::Refresh { .. })
    }

    /// Error category, used as a structured log field
    pub fn category(&self) -> ErrorCategory {
        match self {
            CacheError::Remote { .. } => ErrorCategory::Remote,
            CacheError::Serialization { .. } | CacheError::Compression { .. } => ErrorCategory::Data,
            CacheError::Refresh { .. } => ErrorCategory::Origin,
            CacheError::PolicyConflict { .. } | CacheError::TypeMismatch { .. } => {
                ErrorCategory::Registry
            }
            CacheError::Configuration { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn remote(operation: impl Into<String>, message: impl Into<String>) -> Self {
        CacheError::Remote {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        CacheError::Serialization {
            message: message.into(),
        }
    }

    pub fn refresh(key: impl Into<String>, message: impl Into<String>) -> Self {
        CacheError::Refresh {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        CacheError::Configuration {
            message: message.into(),
        }
    }
}

/// Error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    Remote,
    Data,
    Origin,
    Registry,
    Configuration,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorCategory::Remote => "remote",
            ErrorCategory::Data => "data",
            ErrorCategory::Origin => "origin",
            ErrorCategory::Registry => "registry",
            ErrorCategory::Configuration => "configuration",
        };
        f.write_str(name)
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, CacheError>;

impl From<rmp_serde::encode::Error> for CacheError {
    fn from(error: rmp_serde::encode::Error) -> Self {
        CacheError::Serialization {
            message: error.to_string(),
        }
    }
}

impl From<rmp_serde::decode::Error> for CacheError {
    fn from(error: rmp_serde::decode::Error) -> Self {
        CacheError::Serialization {
            message: error.to_string(),
        }
    }
}

// flate2 reports through std::io
impl From<std::io::Error> for CacheError {
    fn from(error: std::io::Error) -> Self {
        CacheError::Compression {
            message: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(error: serde_json::Error) -> Self {
        CacheError::Serialization {
            message: error.to_string(),
        }
    }
}

impl From<toml::de::Error> for CacheError {
    fn from(error: toml::de::Error) -> Self {
        CacheError::Configuration {
            message: format!("TOML parse error: {}", error),
        }
    }
}

impl From<serde_yaml::Error> for CacheError {
    fn from(error: serde_yaml::Error) -> Self {
        CacheError::Configuration {
            message: format!("YAML parse error: {}", error),
        }
    }
}

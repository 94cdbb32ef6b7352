//! HCM-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, HcmError>;

/// Broad failure class, used to decide whether a failure is terminal for a widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad configuration. Terminal: no polling starts.
    Configuration,
    /// One poll cycle failed. Recovered locally on the next cycle.
    Fetch,
    /// Process-level failure (IO, threads, serialization).
    Runtime,
}

/// Top-level error type for the hit count monitor.
#[derive(Debug, Error)]
pub enum HcmError {
    #[error("[HCM-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[HCM-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[HCM-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[HCM-1101] ValidationError @ {widget}: {}", violations.join("; "))]
    WidgetValidation {
        widget: &'static str,
        violations: Vec<String>,
    },

    #[error("[HCM-2001] search request to {url} failed: {details}")]
    Transport { url: String, details: String },

    #[error("[HCM-2002] search request to {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("[HCM-2003] malformed search response: {details}")]
    MalformedResponse { details: String },

    #[error("[HCM-2004] no credentials configured for auth key {key:?}")]
    MissingCredentials { key: String },

    #[error("[HCM-3001] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[HCM-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[HCM-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl HcmError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "HCM-1001",
            Self::MissingConfig { .. } => "HCM-1002",
            Self::ConfigParse { .. } => "HCM-1003",
            Self::WidgetValidation { .. } => "HCM-1101",
            Self::Transport { .. } => "HCM-2001",
            Self::HttpStatus { .. } => "HCM-2002",
            Self::MalformedResponse { .. } => "HCM-2003",
            Self::MissingCredentials { .. } => "HCM-2004",
            Self::Serialization { .. } => "HCM-3001",
            Self::Io { .. } => "HCM-3002",
            Self::Runtime { .. } => "HCM-3900",
        }
    }

    /// Failure class of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig { .. }
            | Self::MissingConfig { .. }
            | Self::ConfigParse { .. }
            | Self::WidgetValidation { .. } => ErrorKind::Configuration,
            Self::Transport { .. }
            | Self::HttpStatus { .. }
            | Self::MalformedResponse { .. }
            | Self::MissingCredentials { .. } => ErrorKind::Fetch,
            Self::Serialization { .. } | Self::Io { .. } | Self::Runtime { .. } => {
                ErrorKind::Runtime
            }
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. }
                | Self::HttpStatus { .. }
                | Self::MalformedResponse { .. }
                | Self::Io { .. }
                | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for HcmError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for HcmError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

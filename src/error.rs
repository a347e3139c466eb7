use serde::Serialize;
use thiserror::Error;

use crate::registry::Slot;

/// Outcome of a single driver capability call that did not succeed.
///
/// `NotEnabled` and `PingFailed` are not hard failures; see [`DriverError::severity`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("backend is not enabled")]
    NotEnabled,

    #[error("connection failed: {0}")]
    ConnectFailed(String),

    #[error("liveness check failed: {0}")]
    PingFailed(String),

    #[error("dump failed: {0}")]
    DumpFailed(String),

    #[error("restore failed: {0}")]
    RestoreFailed(String),

    #[error("copy failed: {0}")]
    CopyFailed(String),
}

/// Discriminant of [`DriverError`] without the reason text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotEnabled,
    ConnectFailed,
    PingFailed,
    DumpFailed,
    RestoreFailed,
    CopyFailed,
}

/// How bad an outcome is. Ordered so that `max` gives the worst case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Success,
    Skipped,
    Warning,
    Failure,
}

impl DriverError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DriverError::NotEnabled => ErrorKind::NotEnabled,
            DriverError::ConnectFailed(_) => ErrorKind::ConnectFailed,
            DriverError::PingFailed(_) => ErrorKind::PingFailed,
            DriverError::DumpFailed(_) => ErrorKind::DumpFailed,
            DriverError::RestoreFailed(_) => ErrorKind::RestoreFailed,
            DriverError::CopyFailed(_) => ErrorKind::CopyFailed,
        }
    }

    pub fn severity(&self) -> Severity {
        self.kind().severity()
    }

    /// Reason text without the stage prefix; empty for `NotEnabled`.
    pub fn reason(&self) -> &str {
        match self {
            DriverError::NotEnabled => "",
            DriverError::ConnectFailed(r)
            | DriverError::PingFailed(r)
            | DriverError::DumpFailed(r)
            | DriverError::RestoreFailed(r)
            | DriverError::CopyFailed(r) => r,
        }
    }
}

impl ErrorKind {
    pub fn severity(self) -> Severity {
        match self {
            ErrorKind::NotEnabled => Severity::Skipped,
            ErrorKind::PingFailed => Severity::Warning,
            _ => Severity::Failure,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("slot '{0}' is already occupied by another driver")]
    SlotAlreadyOccupied(Slot),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("[{backend}] is enabled but '{field}' is empty")]
    MissingField {
        backend: &'static str,
        field: String,
    },
}

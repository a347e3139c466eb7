use chrono::{DateTime, Local};
use serde::Serialize;

use crate::error::{DriverError, ErrorKind, Severity};
use crate::registry::Slot;

/// Result of one lifecycle stage of one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Stage {
    Ok,
    /// The stage was not run.
    Skipped,
    Warning { kind: ErrorKind, reason: String },
    Failed { kind: ErrorKind, reason: String },
}

impl Stage {
    pub fn from_result(result: &Result<(), DriverError>) -> Self {
        match result {
            Ok(()) => Stage::Ok,
            Err(err) => match err.severity() {
                Severity::Success | Severity::Skipped => Stage::Skipped,
                Severity::Warning => Stage::Warning {
                    kind: err.kind(),
                    reason: err.reason().to_string(),
                },
                Severity::Failure => Stage::Failed {
                    kind: err.kind(),
                    reason: err.reason().to_string(),
                },
            },
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Stage::Ok => Severity::Success,
            Stage::Skipped => Severity::Skipped,
            Stage::Warning { .. } => Severity::Warning,
            Stage::Failed { .. } => Severity::Failure,
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Stage::Warning { kind, .. } | Stage::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendReport {
    pub slot: Slot,
    pub backend: String,
    pub connect: Stage,
    pub replicate: Stage,
}

impl BackendReport {
    pub fn severity(&self) -> Severity {
        self.connect.severity().max(self.replicate.severity())
    }

    /// The backend was switched off in the config and never touched.
    pub fn not_enabled(&self) -> bool {
        self.connect == Stage::Skipped
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
    pub backends: Vec<BackendReport>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self {
            started_at: Local::now(),
            finished_at: None,
            backends: Vec::new(),
        }
    }
}

impl RunReport {
    /// Worst severity over every stage of every backend.
    pub fn status(&self) -> Severity {
        self.backends
            .iter()
            .map(BackendReport::severity)
            .max()
            .unwrap_or(Severity::Success)
    }

    /// Kind of the first stage with the worst severity, if anything went wrong.
    pub fn worst_error(&self) -> Option<ErrorKind> {
        let worst = self.status();
        self.backends
            .iter()
            .flat_map(|b| [&b.connect, &b.replicate])
            .find(|stage| stage.severity() == worst)
            .and_then(Stage::kind)
    }

    pub fn exit_code(&self) -> i32 {
        if self.status() == Severity::Failure { 1 } else { 0 }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

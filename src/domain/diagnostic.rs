//! Diagnostic events relayed from update procedures

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a diagnostic event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Verbose,
    Info,
    Warning,
    Error,
}

impl Level {
    /// Returns the lowercase label for this level
    pub fn label(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Verbose => "verbose",
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
        }
    }

    /// Returns true for levels only shown in verbose mode
    pub fn is_detail(&self) -> bool {
        matches!(self, Level::Debug | Level::Verbose)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A single leveled message, tagged with the package that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    pub level: Level,
    /// Owning package name; empty for run-level messages
    pub package: String,
    pub message: String,
}

impl DiagnosticEvent {
    pub fn new(level: Level, package: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            package: package.into(),
            message: message.into(),
        }
    }

    /// Creates a run-level event with no owning package
    pub fn run(level: Level, message: impl Into<String>) -> Self {
        Self::new(level, String::new(), message)
    }
}

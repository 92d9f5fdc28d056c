//! Application error types using thiserror
//!
//! Error hierarchy:
//! - ConfigError: Issues with the configuration file or CLI values
//! - DiscoveryError: Issues enumerating the packages root
//! - ProcessError: Failures launching or waiting on an external command
//!
//! Each surfaces through its own seam: ConfigError from settings loading,
//! DiscoveryError from the orchestrator run, ProcessError from the process
//! runner. main converts all three into anyhow errors.
//!
//! Per-package failures (procedure errors, publish or tag failures) are not
//! errors in this sense: they are recorded as package states and never abort
//! the run.

use std::path::PathBuf;
use thiserror::Error;

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML or has unknown keys
    #[error("failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    /// A value is syntactically valid but not acceptable
    #[error("invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors related to enumerating package directories
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// The packages root does not exist or is not a directory
    #[error("packages root not found: {path}")]
    RootNotFound { path: PathBuf },

    /// The packages root could not be read
    #[error("failed to read packages root {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors related to running an external command
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The command could not be started
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Waiting on the command failed
    #[error("failed waiting for '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading the command's output failed
    #[error("failed reading output of '{program}': {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Creates a new ReadError
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::ReadError {
            path: path.into(),
            source,
        }
    }

    /// Creates a new ParseError
    pub fn parse_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ConfigError::ParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new InvalidValue error
    pub fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

impl DiscoveryError {
    /// Creates a new RootNotFound error
    pub fn root_not_found(path: impl Into<PathBuf>) -> Self {
        DiscoveryError::RootNotFound { path: path.into() }
    }

    /// Creates a new ReadError
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DiscoveryError::ReadError {
            path: path.into(),
            source,
        }
    }
}

impl ProcessError {
    pub fn spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        ProcessError::Spawn {
            program: program.into(),
            source,
        }
    }

    pub fn wait(program: impl Into<String>, source: std::io::Error) -> Self {
        ProcessError::Wait {
            program: program.into(),
            source,
        }
    }

    pub fn io(program: impl Into<String>, source: std::io::Error) -> Self {
        ProcessError::Io {
            program: program.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_parse() {
        let err = ConfigError::parse_error("/repo/autoupdate.toml", "unknown field `foo`");
        let msg = format!("{}", err);
        assert!(msg.contains("failed to parse config file"));
        assert!(msg.contains("autoupdate.toml"));
        assert!(msg.contains("unknown field"));
    }

    #[test]
    fn test_config_error_invalid_value() {
        let err = ConfigError::invalid_value("vcs.tag_policy", "expected 'force'");
        let msg = format!("{}", err);
        assert!(msg.contains("invalid value for 'vcs.tag_policy'"));
    }

    #[test]
    fn test_config_error_read() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = ConfigError::read_error("/nowhere.toml", io);
        assert!(err.to_string().contains("failed to read config file"));
    }

    #[test]
    fn test_discovery_error_root_not_found() {
        let err = DiscoveryError::root_not_found("/path/to/missing");
        let msg = format!("{}", err);
        assert!(msg.contains("packages root not found"));
        assert!(msg.contains("/path/to/missing"));
    }

    #[test]
    fn test_process_error_spawn() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = ProcessError::spawn("choco", io);
        let msg = format!("{}", err);
        assert!(msg.contains("failed to start 'choco'"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_error_debug_trait() {
        let err = DiscoveryError::root_not_found("/test");
        let debug = format!("{:?}", err);
        assert!(debug.contains("RootNotFound"));
    }
}

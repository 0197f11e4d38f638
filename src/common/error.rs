//! Error types for the e2e harness
//!
//! Command errors embed the attempted command line and everything the child
//! wrote, so a failed step can be triaged from the message alone.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Stderr fragments that the cluster CLI prints when its API server
/// connection times out.
const NETWORK_TIMEOUT_MARKERS: &[&str] = &[
    "i/o timeout",
    "TLS handshake timeout",
    "Client.Timeout exceeded",
];

/// Main error type for the e2e harness
#[derive(Error, Debug)]
pub enum Error {
    // === Command Errors ===
    #[error("Invalid command type: {0}")]
    UnknownCommandKind(String),

    #[error("error starting {command}:\nCommand stdout:\n{stdout}\nstderr:\n{stderr}\nerror:\n{source}\n")]
    CommandStart {
        command: String,
        stdout: String,
        stderr: String,
        #[source]
        source: io::Error,
    },

    #[error("error running {command}:\nCommand stdout:\n{stdout}\nstderr:\n{stderr}\nerror:\n{reason}\ncode: {code}")]
    CommandFailed {
        command: String,
        stdout: String,
        stderr: String,
        reason: String,
        code: i32,
    },

    #[error("timed out waiting for command {command}:\nCommand stdout:\n{stdout}\nstderr:\n{stderr}\n")]
    CommandTimedOut {
        command: String,
        stdout: String,
        stderr: String,
    },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Scenario Errors ===
    #[error("Invalid scenario: {0}")]
    Scenario(String),

    #[error("Test assertion failed: {0}")]
    TestAssertion(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error is a timeout, either ours (the timeout signal fired)
    /// or a network timeout reported by the tool itself.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::CommandTimedOut { .. } => true,
            Error::CommandStart { source, .. } => source.kind() == io::ErrorKind::TimedOut,
            Error::Io(e) => e.kind() == io::ErrorKind::TimedOut,
            Error::CommandFailed { stderr, .. } => NETWORK_TIMEOUT_MARKERS
                .iter()
                .any(|marker| stderr.contains(marker)),
            _ => false,
        }
    }

    /// Exit code of a command that ran to completion with a nonzero status
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Error::CommandFailed { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Create a file read error
    pub fn file_read(path: &std::path::Path, error: &io::Error) -> Self {
        Self::FileRead {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed_with_stderr(stderr: &str) -> Error {
        Error::CommandFailed {
            command: "kubectl get pods".to_string(),
            stdout: String::new(),
            stderr: stderr.to_string(),
            reason: "exit status: 1".to_string(),
            code: 1,
        }
    }

    #[test]
    fn test_failed_message_ends_with_code() {
        let err = Error::CommandFailed {
            command: "sh -c exit 3".to_string(),
            stdout: "out".to_string(),
            stderr: "err".to_string(),
            reason: "exit status: 3".to_string(),
            code: 3,
        };
        let msg = err.to_string();
        assert!(msg.starts_with("error running sh -c exit 3:\n"));
        assert!(msg.contains("Command stdout:\nout\nstderr:\nerr\n"));
        assert!(msg.ends_with("code: 3"));
        assert_eq!(err.exit_code(), Some(3));
    }

    #[test]
    fn test_timeout_classification() {
        let timed_out = Error::CommandTimedOut {
            command: "sleep 10".to_string(),
            stdout: String::new(),
            stderr: String::new(),
        };
        assert!(timed_out.is_timeout());
        assert!(timed_out.to_string().starts_with("timed out waiting for command sleep 10"));

        let io_timeout = Error::Io(io::Error::new(io::ErrorKind::TimedOut, "slow"));
        assert!(io_timeout.is_timeout());

        assert!(failed_with_stderr(
            "Unable to connect to the server: dial tcp 10.0.0.1:443: i/o timeout"
        )
        .is_timeout());
        assert!(!failed_with_stderr("error: the server doesn't have a resource type").is_timeout());
        assert!(!Error::UnknownCommandKind("helm".to_string()).is_timeout());
    }
}

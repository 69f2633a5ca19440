//! Error types for the fixture runner
//!
//! Fatal errors carry enough context to tell which fixture file, program
//! or RPC method was involved. Expectation failures are not errors here;
//! they are collected as [`crate::runner::CheckError`] values.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the fixture runner
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Fixture Errors ===
    #[error("Failed to parse fixture file '{path}': {message}")]
    FixtureParse { path: String, message: String },

    #[error("Program {0} is not declared in the test's programs list")]
    UnknownProgram(u64),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid hex in {what}: {error}")]
    InvalidHex { what: String, error: String },

    // === Chain Errors ===
    #[error("RPC method '{method}' failed: {message}")]
    Rpc { method: String, message: String },

    #[error("HTTP error talking to node: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Signer failed: {0}")]
    Signer(String),

    #[error("Failed to decode {what}: {message}")]
    Decode { what: String, message: String },

    #[error("Gave up waiting for {what} after {attempts} attempts")]
    PollExhausted { what: String, attempts: u32 },

    #[error("Message queue exceeds {0} entries; refusing to walk further")]
    QueueTooLong(usize),

    #[error("Sudo key is not set in chain state")]
    SudoKeyMissing,

    // === Bindings Errors ===
    #[error("Required tool '{0}' not found in PATH")]
    ToolNotFound(String),

    #[error("Command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },

    #[error("Node log never printed a version line containing '{0}'")]
    VersionNotFound(String),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an RPC failure error
    pub fn rpc(method: &str, message: impl Into<String>) -> Self {
        Self::Rpc {
            method: method.to_string(),
            message: message.into(),
        }
    }

    /// Create a decode error for a named value
    pub fn decode(what: &str, message: impl Into<String>) -> Self {
        Self::Decode {
            what: what.to_string(),
            message: message.into(),
        }
    }

    /// Create an invalid hex error for a named field
    pub fn invalid_hex(what: &str, error: hex::FromHexError) -> Self {
        Self::InvalidHex {
            what: what.to_string(),
            error: error.to_string(),
        }
    }

    /// Create a command failure error
    pub fn command_failed(command: &str, message: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.to_string(),
            message: message.into(),
        }
    }

    /// Whether this error only affects the fixture file it came from
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Error::FixtureParse { .. }
                | Error::FileRead { .. }
                | Error::UnknownProgram(_)
                | Error::InvalidPayload(_)
                | Error::InvalidHex { .. }
                | Error::Config(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_errors_are_classified() {
        assert!(Error::UnknownProgram(3).is_parse_error());
        assert!(Error::FixtureParse {
            path: "a.json".to_string(),
            message: "eof".to_string()
        }
        .is_parse_error());
        assert!(!Error::rpc("state_getStorage", "boom").is_parse_error());
        assert!(!Error::QueueTooLong(10).is_parse_error());
    }

    #[test]
    fn test_rpc_error_message() {
        let e = Error::rpc("author_submitExtrinsic", "1010: Invalid Transaction");
        assert_eq!(
            e.to_string(),
            "RPC method 'author_submitExtrinsic' failed: 1010: Invalid Transaction"
        );
    }
}

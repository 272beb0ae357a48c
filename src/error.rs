//! Error types for the Ceph Salt deployment glue
//!
//! Provides structured error types for policy expansion, pillar file
//! generation, external command execution and daemon orchestration.

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("filename {} is missing", path.display())]
    PolicyMissing { path: PathBuf },

    #[error("syntax error in {} on line {line} in position {column}: {message}", path.display())]
    PolicySyntax {
        path: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Directory Errors
    // =========================================================================
    #[error("Cannot create directory {} - verify that it is owned by salt", path.display())]
    DirectoryAccessDenied { path: PathBuf },

    // =========================================================================
    // External Command Errors
    // =========================================================================
    #[error("{program} not found")]
    ProgramNotFound { program: String },

    #[error("Command '{command}' failed with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("Failed to spawn '{command}': {source}")]
    CommandSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // =========================================================================
    // Orchestration Errors
    // =========================================================================
    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Execution context lookup failed: {0}")]
    Context(String),

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed configuration input
    Config,
    /// Output directory could not be prepared
    Directory,
    /// An external program was missing or exited unsuccessfully
    ExternalCommand,
    /// A required value was empty when an orchestration step needed it
    Precondition,
    /// Everything else
    Internal,
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::PolicyMissing { .. }
            | Error::PolicySyntax { .. }
            | Error::Configuration(_)
            | Error::Yaml(_) => ErrorKind::Config,

            Error::DirectoryAccessDenied { .. } => ErrorKind::Directory,

            Error::ProgramNotFound { .. }
            | Error::CommandFailed { .. }
            | Error::CommandSpawn { .. } => ErrorKind::ExternalCommand,

            Error::Precondition(_) => ErrorKind::Precondition,

            Error::Context(_) | Error::JsonParse(_) | Error::Io(_) => ErrorKind::Internal,
        }
    }

    /// Process exit status the CLI reports for this error
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Config => 2,
            ErrorKind::Precondition => 3,
            _ => 1,
        }
    }

    /// Check if this error came from an external program
    pub fn is_external(&self) -> bool {
        self.kind() == ErrorKind::ExternalCommand
    }
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;

//! Error types for the package builder
//!
//! Every fatal condition of a run is one of these variants. They are
//! propagated to `main`, which reports the message and exits with status 1.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the package builder
#[derive(Error, Debug)]
pub enum BuilderError {
    /// A required input file is absent
    #[error("{message}")]
    MissingFile { message: String, path: PathBuf },

    /// package.yaml is malformed or fails validation
    #[error("{message}")]
    Manifest {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The TML toolchain file or the build tool could not be located
    #[error("{message}")]
    Toolchain { message: String },

    /// Configure or compile step failed
    #[error("{message}")]
    Build {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// File system operation errors
    #[error("File system error: {operation} failed on {path}")]
    FileSystem {
        operation: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Process execution errors
    #[error("Process error: {command} failed")]
    Process {
        command: String,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// Errors while writing the output archive
    #[error("Packaging error: {message}")]
    Packaging {
        message: String,
        path: PathBuf,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl BuilderError {
    /// Create a new missing-file error
    pub fn missing_file<P: Into<PathBuf>>(message: impl Into<String>, path: P) -> Self {
        Self::MissingFile {
            message: message.into(),
            path: path.into(),
        }
    }

    /// Create a new manifest validation error
    pub fn manifest(message: impl Into<String>) -> Self {
        Self::Manifest {
            message: message.into(),
            source: None,
        }
    }

    /// Create a manifest error caused by a lower-level failure
    pub fn manifest_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Manifest {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new toolchain error
    pub fn toolchain(message: impl Into<String>) -> Self {
        Self::Toolchain {
            message: message.into(),
        }
    }

    /// Create a new build error wrapping the failed step
    pub fn build(message: impl Into<String>, source: BuilderError) -> Self {
        Self::Build {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new file system error
    pub fn file_system<P: Into<PathBuf>>(
        operation: impl Into<String>,
        path: P,
        source: std::io::Error,
    ) -> Self {
        Self::FileSystem {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }

    /// Create a new process error
    pub fn process(
        command: impl Into<String>,
        exit_code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::Process {
            command: command.into(),
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Create a new packaging error
    pub fn packaging<P: Into<PathBuf>>(
        message: impl Into<String>,
        path: P,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Packaging {
            message: message.into(),
            path: path.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, BuilderError>;

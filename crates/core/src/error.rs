//! Error types for tool acquisition

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for tool lookup, installation and invocation
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// The registry could not tell us the latest version of a tool
    #[error("Unable to resolve latest version of `{tool}`: {message}")]
    #[diagnostic(
        code(toolcache::resolution),
        help("Pin an explicit version to skip the registry lookup")
    )]
    Resolution {
        /// Tool (crate) being resolved
        tool: String,
        /// What went wrong
        message: String,
    },

    /// The tool is not on the search path
    #[error("`{tool}` is not installed")]
    #[diagnostic(code(toolcache::not_installed))]
    NotInstalled {
        /// Tool that was looked up
        tool: String,
        /// Installation hint shown to the user
        #[help]
        hint: Option<String>,
    },

    /// The real install command exited unsuccessfully
    #[error("Installing `{tool}` {version} failed with exit code {code}")]
    #[diagnostic(
        code(toolcache::install_command),
        help("Check the cargo output above for the build failure")
    )]
    InstallCommand {
        /// Tool being installed
        tool: String,
        /// Concrete version that was requested
        version: String,
        /// Exit code of the install command
        code: i32,
    },

    /// Invalid or unusable configuration
    #[error("Configuration error: {0}")]
    #[diagnostic(code(toolcache::config))]
    Configuration(String),

    /// The cache request itself was malformed
    #[error("Invalid cache request: {0}")]
    #[diagnostic(code(toolcache::cache_validation))]
    CacheValidation(String),

    /// A subprocess could not be spawned or violated its exec options
    #[error("Failed to execute `{}`: {message}", program.display())]
    #[diagnostic(code(toolcache::exec))]
    Exec {
        /// Program that was executed
        program: PathBuf,
        /// What went wrong
        message: String,
    },

    /// I/O error outside of the cache store
    #[error("I/O {operation} failed{}", path.as_ref().map_or(String::new(), |p| format!(": {}", p.display())))]
    #[diagnostic(code(toolcache::io))]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available
        path: Option<Box<Path>>,
        /// Operation that failed
        operation: String,
    },
}

impl Error {
    /// Create a resolution error
    #[must_use]
    pub fn resolution(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resolution {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a not-installed error without a hint
    #[must_use]
    pub fn not_installed(tool: impl Into<String>) -> Self {
        Self::NotInstalled {
            tool: tool.into(),
            hint: None,
        }
    }

    /// Create an exec error
    #[must_use]
    pub fn exec(program: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Exec {
            program: program.into(),
            message: message.into(),
        }
    }

    /// Create an I/O error with path context
    #[must_use]
    pub fn io(source: std::io::Error, path: impl AsRef<Path>, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: Some(path.as_ref().into()),
            operation: operation.into(),
        }
    }

    /// Create an I/O error without path context
    #[must_use]
    pub fn io_no_path(source: std::io::Error, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: None,
            operation: operation.into(),
        }
    }

    /// Whether this error is the expected "tool absent" outcome of a lookup.
    #[must_use]
    pub fn is_not_installed(&self) -> bool {
        matches!(self, Self::NotInstalled { .. })
    }
}

/// Result type for tool operations
pub type Result<T> = std::result::Result<T, Error>;

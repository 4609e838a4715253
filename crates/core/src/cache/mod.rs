//! Keyed artifact cache for installed tool binaries
//!
//! A cached entry is an *artifact set*: a list of filesystem paths (for a tool,
//! just its binary in the cargo bin directory) archived under a string key.
//! The paths are derived from the tool, never from the key, so a restore always
//! puts the binary back where `cargo install` would have put it.
//!
//! ## Key precedence
//!
//! A restore tries the primary key first, then each restore key in the order
//! given. Restore keys match exactly or, failing that, as a prefix of a stored
//! key (newest entry wins). See [`CacheKeys`] for how keys are derived.
//!
//! ## Failure classes
//!
//! [`CacheError`] separates three classes of failure:
//!
//! - **Validation**: the request itself is malformed. Callers propagate it.
//! - **Reservation conflict**: another run already claimed the key. Callers
//!   log it and carry on, the tool is usable locally either way.
//! - **Anything else**: I/O, archive or backend trouble. Logged as a warning.
//!
//! Caching is skipped entirely when the primary key is [`NO_CACHE`].

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

mod keys;
mod local;

pub use keys::{CacheKeys, NO_CACHE, default_primary_key};
pub use local::{DEFAULT_RESERVATION_TTL, LocalCacheStore};

use async_trait::async_trait;
use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Longest key the backing store accepts.
pub const MAX_KEY_LENGTH: usize = 512;

/// Most restore keys accepted in one request.
pub const MAX_RESTORE_KEYS: usize = 10;

/// Error type for cache store operations
#[derive(Error, Debug, Diagnostic)]
pub enum CacheError {
    /// Malformed cache request
    #[error("Cache validation failed: {0}")]
    #[diagnostic(code(toolcache::cache::validation))]
    Validation(String),

    /// Another run already reserved this key
    #[error("Unable to reserve cache with key {key}, another job may be creating this cache")]
    #[diagnostic(code(toolcache::cache::reserve))]
    ReservationConflict {
        /// The contested key
        key: String,
    },

    /// I/O error inside the store
    #[error("Cache I/O {operation} failed: {}", path.display())]
    #[diagnostic(code(toolcache::cache::io))]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error
        path: PathBuf,
        /// Operation that failed
        operation: &'static str,
    },

    /// Any other backend failure
    #[error("Cache error: {0}")]
    #[diagnostic(code(toolcache::cache::other))]
    Other(String),
}

impl CacheError {
    /// Create a validation error
    #[must_use]
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an I/O error with path context
    #[must_use]
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>, operation: &'static str) -> Self {
        Self::Io {
            source,
            path: path.into(),
            operation,
        }
    }

    /// Create a catch-all error
    #[must_use]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Whether the request itself was malformed.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Whether the key was already claimed by another run.
    #[must_use]
    pub fn is_reservation_conflict(&self) -> bool {
        matches!(self, Self::ReservationConflict { .. })
    }
}

/// Keyed artifact store used to carry installed tools across CI runs.
///
/// Implementations must be thread-safe (`Send + Sync`); managers for
/// different tools may share one store.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Restore `paths` from the first matching key.
    ///
    /// Returns the key that matched, or `None` on a miss. A miss is never an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Validation`] for malformed requests and other
    /// variants when the store itself fails.
    async fn restore(
        &self,
        paths: &[PathBuf],
        primary_key: &str,
        restore_keys: &[String],
    ) -> Result<Option<String>, CacheError>;

    /// Archive `paths` under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Validation`] for malformed requests,
    /// [`CacheError::ReservationConflict`] when `key` is already taken, and
    /// other variants when the store itself fails.
    async fn save(&self, paths: &[PathBuf], key: &str) -> Result<(), CacheError>;
}

/// Check a single key against the store's rules.
///
/// # Errors
///
/// Returns [`CacheError::Validation`] if the key is empty, too long, or
/// contains a comma.
pub fn validate_key(key: &str) -> Result<(), CacheError> {
    if key.is_empty() {
        return Err(CacheError::validation("Key cannot be empty"));
    }
    if key.chars().count() > MAX_KEY_LENGTH {
        return Err(CacheError::validation(format!(
            "Key {key} cannot be larger than {MAX_KEY_LENGTH} characters."
        )));
    }
    if key.contains(',') {
        return Err(CacheError::validation(format!(
            "Key {key} cannot contain commas."
        )));
    }
    Ok(())
}

/// Check a full restore request.
///
/// # Errors
///
/// Returns [`CacheError::Validation`] if no paths are given, too many restore
/// keys are given, or any key is invalid.
pub fn validate_request(
    paths: &[PathBuf],
    primary_key: &str,
    restore_keys: &[String],
) -> Result<(), CacheError> {
    validate_paths(paths)?;
    if restore_keys.len() > MAX_RESTORE_KEYS {
        return Err(CacheError::validation(format!(
            "Key Validation Error: Keys are limited to a maximum of {MAX_RESTORE_KEYS}."
        )));
    }
    validate_key(primary_key)?;
    for key in restore_keys {
        validate_key(key)?;
    }
    Ok(())
}

/// Check that a request names at least one path.
///
/// # Errors
///
/// Returns [`CacheError::Validation`] on an empty path list.
pub fn validate_paths(paths: &[PathBuf]) -> Result<(), CacheError> {
    if paths.is_empty() {
        return Err(CacheError::validation(
            "Path Validation Error: At least one directory or file path is required",
        ));
    }
    Ok(())
}

/// Whether any of the artifact paths exists on disk.
pub(crate) fn any_path_exists(paths: &[PathBuf]) -> bool {
    paths.iter().any(|p| Path::new(p).exists())
}

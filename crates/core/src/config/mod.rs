//! Configuration types for toolcache
//!
//! Two layers: [`Config`] sets up the shared collaborators (registry, cache,
//! key namespace), [`InstallOptions`] is what a caller passes per tool.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::cache::NO_CACHE;

/// Process-wide configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Cache root; defaults to the first writable standard cache location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Registry base URL; defaults to crates.io
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_url: Option<String>,

    /// Namespace for default primary cache keys
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Search path used to locate tools; defaults to `PATH`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_path: Option<String>,
}

/// Per-tool options for `install` and `get_or_install`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct InstallOptions {
    /// Toolchain the tool is invoked with (`nightly`, `+1.83.0`, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toolchain: Option<String>,

    /// Version to install, or `latest`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Primary cache key, or `no-cache`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,

    /// Restore key suffixes, tried in order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub restore_keys: Vec<String>,
}

impl InstallOptions {
    /// Create empty options (latest version, default cache key).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the toolchain.
    #[must_use]
    pub fn with_toolchain(mut self, toolchain: impl Into<String>) -> Self {
        self.toolchain = Some(toolchain.into());
        self
    }

    /// Set the version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set the primary cache key.
    #[must_use]
    pub fn with_primary_key(mut self, key: impl Into<String>) -> Self {
        self.primary_key = Some(key.into());
        self
    }

    /// Set the restore keys.
    #[must_use]
    pub fn with_restore_keys(mut self, keys: Vec<String>) -> Self {
        self.restore_keys = keys;
        self
    }

    /// Disable caching.
    #[must_use]
    pub fn without_cache(self) -> Self {
        self.with_primary_key(NO_CACHE)
    }

    /// Whether caching is disabled.
    #[must_use]
    pub fn cache_disabled(&self) -> bool {
        self.primary_key.as_deref() == Some(NO_CACHE)
    }
}

//! Collaborators shared by all tool managers.

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;

use super::definition::{Lookup, locate};
use crate::cache::{CacheStore, LocalCacheStore};
use crate::config::Config;
use crate::exec::{CommandRunner, ProcessRunner};
use crate::installer::{DEFAULT_NAMESPACE, ToolInstaller};
use crate::resolver::{CratesIoResolver, VersionResolver};
use crate::{Error, Result};

/// Host build tool every managed tool is installed with.
pub const CARGO: &str = "cargo";

const CARGO_HINT: &str = "cargo is not installed by default in some CI environments. \
Install a Rust toolchain first, for example with rustup (https://rustup.rs).";

/// Registry, cache, process runner and lookup settings.
///
/// Cheap to clone; managers for several tools can share one context.
#[derive(Clone)]
pub struct ToolContext {
    resolver: Arc<dyn VersionResolver>,
    cache: Arc<dyn CacheStore>,
    runner: Arc<dyn CommandRunner>,
    search_path: Option<OsString>,
    namespace: String,
    build_dir: PathBuf,
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("search_path", &self.search_path)
            .field("namespace", &self.namespace)
            .field("build_dir", &self.build_dir)
            .finish_non_exhaustive()
    }
}

impl ToolContext {
    /// Create a context from explicit collaborators.
    #[must_use]
    pub fn new(
        resolver: Arc<dyn VersionResolver>,
        cache: Arc<dyn CacheStore>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            resolver,
            cache,
            runner,
            search_path: None,
            namespace: DEFAULT_NAMESPACE.to_string(),
            build_dir: std::env::temp_dir(),
        }
    }

    /// Create the production context: crates.io, local cache, real processes.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or no cache
    /// directory is writable.
    pub fn from_config(config: &Config) -> Result<Self> {
        let resolver = match &config.registry_url {
            Some(url) => CratesIoResolver::with_base_url(url.clone())?,
            None => CratesIoResolver::new()?,
        };
        let cache = LocalCacheStore::resolve(config.cache_dir.clone())
            .map_err(|e| Error::configuration(e.to_string()))?;
        tracing::debug!(root = %cache.root().display(), "Using local cache store");

        let mut context = Self::new(Arc::new(resolver), Arc::new(cache), Arc::new(ProcessRunner));
        if let Some(namespace) = &config.namespace {
            context = context.with_namespace(namespace.clone());
        }
        if let Some(search_path) = &config.search_path {
            context = context.with_search_path(search_path);
        }
        Ok(context)
    }

    /// Look tools up on `search_path` instead of `PATH`.
    #[must_use]
    pub fn with_search_path(mut self, search_path: impl Into<OsString>) -> Self {
        self.search_path = Some(search_path.into());
        self
    }

    /// Set the namespace used in default primary keys.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the neutral directory builds run from.
    #[must_use]
    pub fn with_build_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.build_dir = dir.into();
        self
    }

    /// Process runner handed to tool handles.
    #[must_use]
    pub fn runner(&self) -> Arc<dyn CommandRunner> {
        Arc::clone(&self.runner)
    }

    /// Look an executable up on the configured search path.
    #[must_use]
    pub fn locate(&self, name: &str) -> Lookup {
        locate(name, self.search_path.as_deref())
    }

    /// Locate `cargo`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInstalled`] with an installation hint if `cargo`
    /// is not on the search path.
    pub fn cargo(&self) -> Result<PathBuf> {
        match self.locate(CARGO) {
            Lookup::Found(spec) => Ok(spec.path),
            Lookup::NotFound { name } => Err(Error::NotInstalled {
                tool: name,
                hint: Some(CARGO_HINT.to_string()),
            }),
        }
    }

    /// Build an installer driving the located `cargo`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInstalled`] if `cargo` cannot be located.
    pub fn installer(&self) -> Result<ToolInstaller> {
        Ok(ToolInstaller::new(
            self.cargo()?,
            Arc::clone(&self.resolver),
            Arc::clone(&self.cache),
            Arc::clone(&self.runner),
        )
        .with_namespace(self.namespace.clone())
        .with_build_dir(self.build_dir.clone()))
    }
}

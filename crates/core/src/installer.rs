//! Install-or-restore orchestration for one tool.
//!
//! An install walks these steps strictly in order, each depending on the
//! previous result:
//!
//! 1. resolve `latest` (or no version) to a concrete version,
//! 2. derive cache keys from the concrete version,
//! 3. try a cache restore; a hit ends the install without building,
//! 4. otherwise run `cargo install` from a neutral working directory,
//! 5. save the fresh binary to the cache.
//!
//! Identical `(tool, version, key)` triples therefore build at most once for
//! runs sharing a cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::cache::{CacheError, CacheKeys, CacheStore, NO_CACHE, default_primary_key};
use crate::exec::{CommandRunner, ExecOptions};
use crate::resolver::VersionResolver;
use crate::workdir::WorkdirGuard;
use crate::{Error, Result};

/// Version value asking for the newest published release.
pub const LATEST: &str = "latest";

/// Default namespace for generated primary keys.
pub const DEFAULT_NAMESPACE: &str = "toolcache";

/// One install request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    /// Crate to install; also the tool name used in cache keys.
    pub tool_name: String,
    /// Executable produced by the crate.
    pub binary_name: String,
    /// Concrete version, `latest`, or `None` for latest.
    pub version: Option<String>,
    /// Primary key suffix, `no-cache`, or `None` for the default.
    pub primary_key: Option<String>,
    /// Restore key suffixes, tried in order.
    pub restore_keys: Vec<String>,
}

impl InstallRequest {
    /// Request the latest version of `tool_name`, whose binary has the same name.
    #[must_use]
    pub fn new(tool_name: impl Into<String>) -> Self {
        let tool_name = tool_name.into();
        Self {
            binary_name: tool_name.clone(),
            tool_name,
            version: None,
            primary_key: None,
            restore_keys: Vec::new(),
        }
    }

    /// Set the executable name.
    #[must_use]
    pub fn with_binary_name(mut self, binary_name: impl Into<String>) -> Self {
        self.binary_name = binary_name.into();
        self
    }

    /// Set the version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set the primary key suffix.
    #[must_use]
    pub fn with_primary_key(mut self, key: impl Into<String>) -> Self {
        self.primary_key = Some(key.into());
        self
    }

    /// Set the restore key suffixes.
    #[must_use]
    pub fn with_restore_keys(mut self, keys: Vec<String>) -> Self {
        self.restore_keys = keys;
        self
    }
}

/// Installs tools with `cargo install`, fronted by a [`CacheStore`].
pub struct ToolInstaller {
    cargo: PathBuf,
    resolver: Arc<dyn VersionResolver>,
    cache: Arc<dyn CacheStore>,
    runner: Arc<dyn CommandRunner>,
    namespace: String,
    build_dir: PathBuf,
}

impl std::fmt::Debug for ToolInstaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolInstaller")
            .field("cargo", &self.cargo)
            .field("namespace", &self.namespace)
            .field("build_dir", &self.build_dir)
            .finish_non_exhaustive()
    }
}

impl ToolInstaller {
    /// Create an installer driving the `cargo` binary at `cargo`.
    #[must_use]
    pub fn new(
        cargo: impl Into<PathBuf>,
        resolver: Arc<dyn VersionResolver>,
        cache: Arc<dyn CacheStore>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            cargo: cargo.into(),
            resolver,
            cache,
            runner,
            namespace: DEFAULT_NAMESPACE.to_string(),
            build_dir: std::env::temp_dir(),
        }
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

    /// Path of the `cargo` binary this installer drives.
    #[must_use]
    pub fn cargo(&self) -> &Path {
        &self.cargo
    }

    /// Where `cargo install` puts `binary_name`: next to `cargo` itself.
    #[must_use]
    pub fn artifact_paths(&self, binary_name: &str) -> Vec<PathBuf> {
        let file_name = format!("{binary_name}{}", std::env::consts::EXE_SUFFIX);
        let path = self
            .cargo
            .parent()
            .map_or_else(|| PathBuf::from(&file_name), |dir| dir.join(&file_name));
        vec![path]
    }

    /// Turn `None` or `latest` into a concrete version.
    ///
    /// # Errors
    ///
    /// Propagates [`Error::Resolution`] from the resolver.
    pub async fn resolve_version(&self, tool: &str, version: Option<&str>) -> Result<String> {
        match version {
            Some(v) if !v.is_empty() && v != LATEST => Ok(v.to_string()),
            _ => self.resolver.latest_version(tool).await,
        }
    }

    /// Derive the cache keys for a request at a concrete version.
    #[must_use]
    pub fn cache_keys(&self, request: &InstallRequest, version: &str) -> CacheKeys {
        let primary = request
            .primary_key
            .clone()
            .unwrap_or_else(|| default_primary_key(&self.namespace, &request.tool_name));
        CacheKeys::derive(&request.tool_name, version, &primary, &request.restore_keys)
    }

    /// Install the requested tool, restoring it from the cache when possible.
    ///
    /// Returns the path of the installed binary.
    ///
    /// # Errors
    ///
    /// - [`Error::Resolution`] if `latest` cannot be resolved,
    /// - [`Error::CacheValidation`] if the cache rejects the request as malformed,
    /// - [`Error::InstallCommand`] if `cargo install` exits non-zero (no cache
    ///   save is attempted then),
    /// - [`Error::Io`] / [`Error::Exec`] if the build cannot be started.
    pub async fn install(&self, request: &InstallRequest) -> Result<PathBuf> {
        let version = self
            .resolve_version(&request.tool_name, request.version.as_deref())
            .await?;
        let span = info_span!("install", tool = %request.tool_name, %version);
        self.install_version(request, version).instrument(span).await
    }

    async fn install_version(&self, request: &InstallRequest, version: String) -> Result<PathBuf> {
        let tool = request.tool_name.as_str();
        let keys = self.cache_keys(request, &version);
        let caching = request.primary_key.as_deref() != Some(NO_CACHE);
        let paths = self.artifact_paths(&request.binary_name);
        let installed = paths
            .first()
            .cloned()
            .unwrap_or_else(|| PathBuf::from(&request.binary_name));

        if caching {
            if let Some(matched) = self.restore(&paths, &keys).await? {
                info!(key = %matched, "Using cached `{tool}` with version `{version}`");
                return Ok(installed);
            }
        } else {
            debug!("Caching disabled for `{tool}`");
        }

        self.cargo_install(tool, &version).await?;

        if caching {
            self.save(tool, &paths, &keys.primary).await?;
        }

        Ok(installed)
    }

    async fn restore(&self, paths: &[PathBuf], keys: &CacheKeys) -> Result<Option<String>> {
        match self.cache.restore(paths, &keys.primary, &keys.restore).await {
            Ok(hit) => Ok(hit),
            Err(e) => swallow_unless_validation(e, "restore").map(|()| None),
        }
    }

    async fn save(&self, tool: &str, paths: &[PathBuf], key: &str) -> Result<()> {
        info!("Caching `{tool}` with key `{key}`");
        match self.cache.save(paths, key).await {
            Ok(()) => Ok(()),
            Err(e) => swallow_unless_validation(e, "save"),
        }
    }

    async fn cargo_install(&self, tool: &str, version: &str) -> Result<()> {
        let args = vec![
            "install".to_string(),
            "--version".to_string(),
            version.to_string(),
            tool.to_string(),
        ];

        info!("Installing \"{tool} = {version}\"");
        // Building from a neutral directory picks up the system default
        // toolchain instead of any project `rust-toolchain` override.
        let _workdir = WorkdirGuard::enter(&self.build_dir).await?;
        let output = self
            .runner
            .run(&self.cargo, &args, &ExecOptions::new())
            .await?;

        if !output.success() {
            return Err(Error::InstallCommand {
                tool: tool.to_string(),
                version: version.to_string(),
                code: output.code,
            });
        }
        Ok(())
    }
}

/// Validation errors propagate; everything else is logged and dropped.
fn swallow_unless_validation(err: CacheError, operation: &str) -> Result<()> {
    if err.is_validation() {
        return Err(Error::CacheValidation(err.to_string()));
    }
    if err.is_reservation_conflict() {
        info!("{err}");
    } else {
        warn!("Cache {operation} failed: {err}");
    }
    Ok(())
}

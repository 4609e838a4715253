//! Counting fakes for the resolver, cache and process runner.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use toolcache_core::{
    CacheError, CacheStore, CommandRunner, ExecOptions, ExecOutput, ProcessRunner, Result,
    ToolContext, VersionResolver,
};

/// Resolver answering with a fixed version and counting lookups.
pub struct CountingResolver {
    version: String,
    pub calls: AtomicUsize,
}

impl CountingResolver {
    pub fn new(version: &str) -> Arc<Self> {
        Arc::new(Self {
            version: version.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VersionResolver for CountingResolver {
    async fn latest_version(&self, _tool: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.version.clone())
    }
}

/// What [`RecordingCache`] answers.
#[derive(Debug, Clone, Default)]
pub enum CacheBehavior {
    /// Restore misses, save succeeds.
    #[default]
    Empty,
    /// Restore hits with the given key.
    Hit(String),
    /// Save reports that another writer holds the key.
    ReservationConflict,
    /// Restore and save both fail with a transient error.
    Unavailable,
    /// Restore and save reject the request as malformed.
    Invalid,
}

/// Cache recording every restore and save.
#[derive(Default)]
pub struct RecordingCache {
    behavior: CacheBehavior,
    pub restores: Mutex<Vec<(String, Vec<String>)>>,
    pub saves: Mutex<Vec<(Vec<PathBuf>, String)>>,
}

impl RecordingCache {
    pub fn new(behavior: CacheBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            ..Self::default()
        })
    }

    pub fn restore_count(&self) -> usize {
        self.restores.lock().unwrap().len()
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().unwrap().len()
    }

    pub fn saved_keys(&self) -> Vec<String> {
        self.saves
            .lock()
            .unwrap()
            .iter()
            .map(|(_, key)| key.clone())
            .collect()
    }

    pub fn restored_keys(&self) -> Vec<(String, Vec<String>)> {
        self.restores.lock().unwrap().clone()
    }
}

#[async_trait]
impl CacheStore for RecordingCache {
    async fn restore(
        &self,
        _paths: &[PathBuf],
        primary_key: &str,
        restore_keys: &[String],
    ) -> std::result::Result<Option<String>, CacheError> {
        self.restores
            .lock()
            .unwrap()
            .push((primary_key.to_string(), restore_keys.to_vec()));
        match &self.behavior {
            CacheBehavior::Hit(key) => Ok(Some(key.clone())),
            CacheBehavior::Unavailable => Err(CacheError::other("cache service unavailable")),
            CacheBehavior::Invalid => Err(CacheError::validation("key contains a comma")),
            CacheBehavior::Empty | CacheBehavior::ReservationConflict => Ok(None),
        }
    }

    async fn save(&self, paths: &[PathBuf], key: &str) -> std::result::Result<(), CacheError> {
        self.saves
            .lock()
            .unwrap()
            .push((paths.to_vec(), key.to_string()));
        match &self.behavior {
            CacheBehavior::ReservationConflict => Err(CacheError::ReservationConflict {
                key: key.to_string(),
            }),
            CacheBehavior::Unavailable => Err(CacheError::other("cache service unavailable")),
            CacheBehavior::Invalid => Err(CacheError::validation("key contains a comma")),
            CacheBehavior::Empty | CacheBehavior::Hit(_) => Ok(()),
        }
    }
}

/// One `cargo install` seen by [`FakeCargo`].
#[derive(Debug, Clone)]
pub struct InstallCall {
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

/// Runner standing in for `cargo install`.
///
/// Install invocations of the cargo binary are recorded, together with the
/// working directory at the time, and drop an executable script for the
/// crate next to cargo. Everything else runs as a real process.
pub struct FakeCargo {
    cargo: PathBuf,
    install_exit_code: i32,
    pub installs: Mutex<Vec<InstallCall>>,
}

impl FakeCargo {
    pub fn new(cargo: &Path, install_exit_code: i32) -> Arc<Self> {
        Arc::new(Self {
            cargo: cargo.to_path_buf(),
            install_exit_code,
            installs: Mutex::new(Vec::new()),
        })
    }

    pub fn install_count(&self) -> usize {
        self.installs.lock().unwrap().len()
    }

    pub fn install_calls(&self) -> Vec<InstallCall> {
        self.installs.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeCargo {
    async fn run(
        &self,
        program: &Path,
        args: &[String],
        options: &ExecOptions,
    ) -> Result<ExecOutput> {
        if program == self.cargo && args.first().map(String::as_str) == Some("install") {
            self.installs.lock().unwrap().push(InstallCall {
                args: args.to_vec(),
                cwd: std::env::current_dir().unwrap(),
            });
            if self.install_exit_code == 0 {
                let version = &args[2];
                let crate_name = &args[3];
                let bin = self.cargo.parent().unwrap().join(crate_name);
                write_script(&bin, &format!("echo \"{crate_name} {version}\""));
            }
            return Ok(ExecOutput {
                code: self.install_exit_code,
                ..ExecOutput::default()
            });
        }
        ProcessRunner.run(program, args, options).await
    }
}

/// Write an executable shell script.
pub fn write_script(path: &Path, body: &str) {
    std::fs::write(path, format!("#!/bin/sh\n{body}\n")).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
}

/// A bin directory holding a fake `cargo`, plus a build directory.
pub struct Sandbox {
    pub bin: TempDir,
    pub build: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        let sandbox = Self {
            bin: TempDir::new().unwrap(),
            build: TempDir::new().unwrap(),
        };
        write_script(&sandbox.cargo(), "exit 0");
        sandbox
    }

    /// A sandbox whose bin directory has no `cargo`.
    pub fn without_cargo() -> Self {
        Self {
            bin: TempDir::new().unwrap(),
            build: TempDir::new().unwrap(),
        }
    }

    pub fn cargo(&self) -> PathBuf {
        self.bin.path().join("cargo")
    }

    pub fn tool(&self, name: &str) -> PathBuf {
        self.bin.path().join(name)
    }

    /// Context looking tools up only in this sandbox.
    pub fn context(
        &self,
        resolver: Arc<dyn VersionResolver>,
        cache: Arc<dyn CacheStore>,
        runner: Arc<dyn CommandRunner>,
    ) -> ToolContext {
        ToolContext::new(resolver, cache, runner)
            .with_search_path(self.bin.path())
            .with_build_dir(self.build.path())
    }
}

//! Filesystem-backed cache store.
//!
//! Layout:
//! ```text
//! {root}/
//! └── {encoded key}/
//!     ├── archive.tar.zst   # artifact set, one tar member tree per path
//!     └── manifest.json     # key, artifact paths, creation time
//! ```
//!
//! The entry directory doubles as the reservation: it is created with
//! `create_dir`, so exactly one writer wins a key. The manifest is written
//! last; an entry without one is never restored. A reservation that still has
//! no manifest after [`DEFAULT_RESERVATION_TTL`] belongs to a writer that died
//! and is reclaimed by the next save.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, trace, warn};

use super::{
    CacheError, CacheStore, any_path_exists, validate_key, validate_paths, validate_request,
};

const ARCHIVE_FILE: &str = "archive.tar.zst";
const MANIFEST_FILE: &str = "manifest.json";

/// Age after which a manifest-less reservation is considered abandoned.
pub const DEFAULT_RESERVATION_TTL: Duration = Duration::from_secs(10 * 60);

/// Environment variable overriding the cache root.
pub const CACHE_DIR_ENV: &str = "TOOLCACHE_CACHE_DIR";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryManifest {
    key: String,
    paths: Vec<PathBuf>,
    created_at: DateTime<Utc>,
}

/// Cache store keeping entries as zstd-compressed tarballs on local disk.
///
/// Pointing the root at a directory that the CI runner persists between jobs
/// turns this into a cross-run cache.
#[derive(Debug, Clone)]
pub struct LocalCacheStore {
    root: PathBuf,
    reservation_ttl: Duration,
}

/// Inputs for determining the cache root directory
#[derive(Debug, Clone)]
struct RootInputs {
    override_dir: Option<PathBuf>,
    xdg_cache_home: Option<PathBuf>,
    os_cache_dir: Option<PathBuf>,
    temp_dir: PathBuf,
}

fn root_from_inputs(inputs: RootInputs) -> Result<PathBuf, CacheError> {
    // Resolution order (first writable wins):
    // 1) explicit override (flag or TOOLCACHE_CACHE_DIR)
    // 2) XDG_CACHE_HOME/toolcache/tools
    // 3) OS cache dir/toolcache/tools
    // 4) TMPDIR/toolcache/tools
    let mut candidates: Vec<PathBuf> = Vec::new();

    if let Some(dir) = inputs.override_dir.filter(|p| !p.as_os_str().is_empty()) {
        candidates.push(dir);
    }
    if let Some(xdg) = inputs.xdg_cache_home {
        candidates.push(xdg.join("toolcache/tools"));
    }
    if let Some(os_cache) = inputs.os_cache_dir {
        candidates.push(os_cache.join("toolcache/tools"));
    }
    candidates.push(inputs.temp_dir.join("toolcache/tools"));

    for path in candidates {
        if path.exists() {
            let probe = path.join(".write_probe");
            match fs::OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(&probe)
            {
                Ok(_) => {
                    let _ = fs::remove_file(&probe);
                    return Ok(path);
                }
                Err(_) => continue,
            }
        }
        if fs::create_dir_all(&path).is_ok() {
            return Ok(path);
        }
    }
    Err(CacheError::other(
        "Failed to determine a writable cache directory",
    ))
}

fn non_empty_env(name: &str) -> Option<PathBuf> {
    std::env::var(name)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
}

/// Encode a key into a single safe path component.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.') {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

impl LocalCacheStore {
    /// Create a store rooted at `root`. The directory is created on first save.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            reservation_ttl: DEFAULT_RESERVATION_TTL,
        }
    }

    /// Override how long an unfinished reservation blocks other writers.
    #[must_use]
    pub fn with_reservation_ttl(mut self, ttl: Duration) -> Self {
        self.reservation_ttl = ttl;
        self
    }

    /// Create a store at `override_dir`, or at the first writable default
    /// location when no override is given.
    ///
    /// # Errors
    ///
    /// Returns an error if no candidate directory is writable.
    pub fn resolve(override_dir: Option<PathBuf>) -> Result<Self, CacheError> {
        let inputs = RootInputs {
            override_dir: override_dir.or_else(|| non_empty_env(CACHE_DIR_ENV)),
            xdg_cache_home: non_empty_env("XDG_CACHE_HOME"),
            os_cache_dir: dirs::cache_dir(),
            temp_dir: std::env::temp_dir(),
        };
        root_from_inputs(inputs).map(Self::new)
    }

    /// Cache root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_dir(&self, key: &str) -> PathBuf {
        self.root.join(encode_key(key))
    }

    fn read_manifest(dir: &Path) -> Option<EntryManifest> {
        let bytes = fs::read(dir.join(MANIFEST_FILE)).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    fn find_exact(&self, key: &str, paths: &[PathBuf]) -> Option<(PathBuf, EntryManifest)> {
        let dir = self.entry_dir(key);
        let manifest = Self::read_manifest(&dir)?;
        (manifest.key == key && manifest.paths == paths).then_some((dir, manifest))
    }

    fn find_newest_with_prefix(
        &self,
        prefix: &str,
        paths: &[PathBuf],
    ) -> Option<(PathBuf, EntryManifest)> {
        let entries = fs::read_dir(&self.root).ok()?;
        entries
            .filter_map(std::result::Result::ok)
            .filter_map(|entry| {
                let dir = entry.path();
                let manifest = Self::read_manifest(&dir)?;
                (manifest.key.starts_with(prefix) && manifest.paths == paths)
                    .then_some((dir, manifest))
            })
            .max_by_key(|(_, manifest)| manifest.created_at)
    }

    fn lookup(
        &self,
        paths: &[PathBuf],
        primary_key: &str,
        restore_keys: &[String],
    ) -> Option<(PathBuf, EntryManifest)> {
        if let Some(found) = self.find_exact(primary_key, paths) {
            return Some(found);
        }
        for key in restore_keys {
            if let Some(found) = self
                .find_exact(key, paths)
                .or_else(|| self.find_newest_with_prefix(key, paths))
            {
                return Some(found);
            }
        }
        None
    }

    fn restore_blocking(
        &self,
        paths: &[PathBuf],
        primary_key: &str,
        restore_keys: &[String],
    ) -> Result<Option<String>, CacheError> {
        let Some((dir, manifest)) = self.lookup(paths, primary_key, restore_keys) else {
            trace!(primary_key, "Cache miss");
            return Ok(None);
        };
        unpack_archive(&dir.join(ARCHIVE_FILE), paths)?;
        debug!(key = %manifest.key, dir = %dir.display(), "Restored cache entry");
        Ok(Some(manifest.key))
    }

    fn save_blocking(&self, paths: &[PathBuf], key: &str) -> Result<(), CacheError> {
        validate_paths(paths)?;
        validate_key(key)?;
        if !any_path_exists(paths) {
            return Err(CacheError::other(
                "Path Validation Error: Path(s) specified for caching do not exist, hence no cache is being saved.",
            ));
        }

        fs::create_dir_all(&self.root).map_err(|e| CacheError::io(e, &self.root, "create"))?;
        let dir = self.entry_dir(key);
        self.reserve(&dir, key)?;

        if let Err(err) = write_entry(&dir, paths, key) {
            let _ = fs::remove_dir_all(&dir);
            return Err(err);
        }
        debug!(key, dir = %dir.display(), "Saved cache entry");
        Ok(())
    }

    fn reserve(&self, dir: &Path, key: &str) -> Result<(), CacheError> {
        let conflict = || CacheError::ReservationConflict {
            key: key.to_string(),
        };
        match fs::create_dir(dir) {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => return Err(CacheError::io(e, dir, "reserve")),
        }
        if !self.is_abandoned(dir) {
            return Err(conflict());
        }

        warn!(key, dir = %dir.display(), "Reclaiming abandoned cache reservation");
        fs::remove_dir_all(dir).map_err(|e| CacheError::io(e, dir, "reclaim"))?;
        // One retry only: losing this race to another reclaimer is a conflict.
        match fs::create_dir(dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(conflict()),
            Err(e) => Err(CacheError::io(e, dir, "reserve")),
        }
    }

    fn is_abandoned(&self, dir: &Path) -> bool {
        if dir.join(MANIFEST_FILE).exists() {
            return false;
        }
        let age = fs::metadata(dir)
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok());
        age.is_some_and(|age| age >= self.reservation_ttl)
    }
}

fn write_entry(dir: &Path, paths: &[PathBuf], key: &str) -> Result<(), CacheError> {
    write_archive(&dir.join(ARCHIVE_FILE), paths)?;

    let manifest = EntryManifest {
        key: key.to_string(),
        paths: paths.to_vec(),
        created_at: Utc::now(),
    };
    let json = serde_json::to_vec_pretty(&manifest)
        .map_err(|e| CacheError::other(format!("Failed to serialize manifest: {e}")))?;
    let tmp = dir.join(format!("{MANIFEST_FILE}.tmp"));
    fs::write(&tmp, json).map_err(|e| CacheError::io(e, &tmp, "write"))?;
    let dest = dir.join(MANIFEST_FILE);
    fs::rename(&tmp, &dest).map_err(|e| CacheError::io(e, &dest, "rename"))?;
    Ok(())
}

/// Archive each path under a top-level member named by its index.
fn write_archive(archive_path: &Path, paths: &[PathBuf]) -> Result<(), CacheError> {
    let file =
        fs::File::create(archive_path).map_err(|e| CacheError::io(e, archive_path, "create"))?;
    let enc = zstd::Encoder::new(file, 3)
        .map_err(|e| CacheError::other(format!("zstd encoder error: {e}")))?;
    let mut builder = tar::Builder::new(enc);

    for (index, path) in paths.iter().enumerate() {
        let name = index.to_string();
        let appended = if path.is_dir() {
            builder.append_dir_all(&name, path)
        } else if path.exists() {
            builder.append_path_with_name(path, &name)
        } else {
            trace!(path = %path.display(), "Skipping missing artifact path");
            continue;
        };
        appended.map_err(|e| CacheError::io(e, path, "archive"))?;
    }

    let enc = builder
        .into_inner()
        .map_err(|e| CacheError::other(format!("tar finalize failed: {e}")))?;
    enc.finish()
        .map_err(|e| CacheError::other(format!("zstd finish failed: {e}")))?;
    Ok(())
}

/// Map an archive member back onto the artifact path it came from.
fn target_for(member: &Path, paths: &[PathBuf]) -> Result<PathBuf, CacheError> {
    let mut components = member.components();
    let index = match components.next() {
        Some(Component::Normal(first)) => first.to_str().and_then(|s| s.parse::<usize>().ok()),
        _ => None,
    };
    let base = index
        .and_then(|i| paths.get(i))
        .ok_or_else(|| CacheError::other(format!("Unexpected archive member {}", member.display())))?;

    let rest = components.as_path();
    if rest
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(CacheError::other(format!(
            "Refusing to unpack archive member {}",
            member.display()
        )));
    }
    if rest.as_os_str().is_empty() {
        Ok(base.clone())
    } else {
        Ok(base.join(rest))
    }
}

fn unpack_archive(archive_path: &Path, paths: &[PathBuf]) -> Result<(), CacheError> {
    let file = fs::File::open(archive_path).map_err(|e| CacheError::io(e, archive_path, "open"))?;
    let dec = zstd::Decoder::new(file).map_err(|e| CacheError::io(e, archive_path, "decode"))?;
    let mut archive = tar::Archive::new(dec);
    let entries = archive
        .entries()
        .map_err(|e| CacheError::io(e, archive_path, "read"))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| CacheError::io(e, archive_path, "read"))?;
        let member = entry
            .path()
            .map_err(|e| CacheError::io(e, archive_path, "read"))?
            .into_owned();
        let target = target_for(&member, paths)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| CacheError::io(e, parent, "create"))?;
        }
        entry
            .unpack(&target)
            .map_err(|e| CacheError::io(e, &target, "unpack"))?;
    }
    Ok(())
}

#[async_trait]
impl CacheStore for LocalCacheStore {
    async fn restore(
        &self,
        paths: &[PathBuf],
        primary_key: &str,
        restore_keys: &[String],
    ) -> Result<Option<String>, CacheError> {
        validate_request(paths, primary_key, restore_keys)?;
        let store = self.clone();
        let paths = paths.to_vec();
        let primary_key = primary_key.to_string();
        let restore_keys = restore_keys.to_vec();
        tokio::task::spawn_blocking(move || {
            store.restore_blocking(&paths, &primary_key, &restore_keys)
        })
        .await
        .map_err(|e| CacheError::other(format!("Cache restore task failed: {e}")))?
    }

    async fn save(&self, paths: &[PathBuf], key: &str) -> Result<(), CacheError> {
        let store = self.clone();
        let paths = paths.to_vec();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || store.save_blocking(&paths, &key))
            .await
            .map_err(|e| CacheError::other(format!("Cache save task failed: {e}")))?
    }
}

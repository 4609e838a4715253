//! Cache key derivation.

/// Primary key value that disables caching entirely.
pub const NO_CACHE: &str = "no-cache";

/// Primary key used when the caller does not supply one.
#[must_use]
pub fn default_primary_key(namespace: &str, tool: &str) -> String {
    format!("{namespace}-{tool}")
}

/// Primary and restore keys for one tool at one concrete version.
///
/// Keys take the form `{tool}-{version}-{suffix}`, so separately cached
/// entries exist per concrete version and the same `(tool, version, suffix)`
/// triple always yields the same key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeys {
    /// Exact-match key the entry is saved under.
    pub primary: String,
    /// Fallback keys tried in order on a primary miss.
    pub restore: Vec<String>,
}

impl CacheKeys {
    /// Derive keys for `tool` at `version`.
    ///
    /// `version` must already be resolved; passing `latest` here would make
    /// every release share one entry.
    #[must_use]
    pub fn derive(tool: &str, version: &str, primary_key: &str, restore_keys: &[String]) -> Self {
        Self {
            primary: format!("{tool}-{version}-{primary_key}"),
            restore: restore_keys
                .iter()
                .map(|key| format!("{tool}-{version}-{key}"))
                .collect(),
        }
    }
}

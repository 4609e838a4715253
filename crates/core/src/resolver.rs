//! Latest-version lookup against the crates.io registry API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::{Error, Result};

/// Default registry base URL.
pub const CRATES_IO_URL: &str = "https://crates.io";

/// User agent sent to the registry; crates.io rejects anonymous clients.
const USER_AGENT: &str = concat!(
    "toolcache/",
    env!("CARGO_PKG_VERSION"),
    " (https://github.com/toolcache/toolcache)"
);

/// Resolves the newest published version of a tool.
#[async_trait]
pub trait VersionResolver: Send + Sync {
    /// Return the newest published version of `tool`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Resolution`] when the registry is unreachable, answers
    /// with a non-success status, or omits the version field.
    async fn latest_version(&self, tool: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct CrateResponse {
    #[serde(rename = "crate")]
    krate: CrateInfo,
}

#[derive(Debug, Deserialize)]
struct CrateInfo {
    newest_version: Option<String>,
}

/// [`VersionResolver`] backed by the crates.io `/api/v1/crates/{name}` endpoint.
#[derive(Debug, Clone)]
pub struct CratesIoResolver {
    client: Client,
    base_url: String,
}

impl CratesIoResolver {
    /// Create a resolver for the public crates.io registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new() -> Result<Self> {
        Self::with_base_url(CRATES_IO_URL)
    }

    /// Create a resolver for a registry mirror (or a test server).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(client_build_error)?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn crate_url(&self, tool: &str) -> String {
        format!("{}/api/v1/crates/{}", self.base_url, tool)
    }
}

#[async_trait]
impl VersionResolver for CratesIoResolver {
    async fn latest_version(&self, tool: &str) -> Result<String> {
        let url = self.crate_url(tool);
        debug!(%url, "Resolving latest crate version");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::resolution(tool, format!("registry unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::resolution(
                tool,
                format!("registry returned HTTP {}", response.status()),
            ));
        }

        let body: CrateResponse = response
            .json()
            .await
            .map_err(|e| Error::resolution(tool, format!("malformed registry response: {e}")))?;

        match body.krate.newest_version {
            Some(version) if !version.is_empty() => {
                debug!(%tool, %version, "Resolved latest version");
                Ok(version)
            }
            _ => Err(Error::resolution(
                tool,
                "registry response has no newest_version",
            )),
        }
    }
}

fn client_build_error(e: impl std::fmt::Display) -> Error {
    Error::configuration(format!("Failed to create HTTP client: {e}"))
}

//! Upstream registry API clients for debler.
//!
//! The builder's `fetchSource` step needs to resolve a package name and
//! version to a download URL before it can pull the archive: RubyGems
//! exposes this as `https://rubygems.org/api/v1/gems/<name>.json` plus a
//! `.gem` download link, and the npm registry exposes it as
//! `https://registry.npmjs.org/<name>` with a `dist.tarball` field per
//! version (scoped packages use the URL-encoded `@scope%2Fname` form).
//!
//! # Example
//!
//! ```
//! use debler_registry::RegistryClient;
//!
//! let client = RegistryClient::rubygems();
//! assert_eq!(client.base_url(), "https://rubygems.org");
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default RubyGems API endpoint.
pub const RUBYGEMS_API: &str = "https://rubygems.org";

/// Default npm registry endpoint.
pub const NPM_REGISTRY_API: &str = "https://registry.npmjs.org";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const USER_AGENT: &str = concat!("debler/", env!("CARGO_PKG_VERSION"));

/// Generic upstream registry client, parameterized by base URL so tests
/// and configured mirrors can point it elsewhere.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    base_url: String,
    timeout: Duration,
    client: reqwest::blocking::Client,
}

impl RegistryClient {
    pub fn new(base_url: &str) -> Self {
        let timeout = Duration::from_secs(DEFAULT_TIMEOUT_SECS);
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            client,
        }
    }

    pub fn rubygems() -> Self {
        Self::new(RUBYGEMS_API)
    }

    pub fn npm() -> Self {
        Self::new(NPM_REGISTRY_API)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch gem metadata from `/api/v1/gems/<name>.json`.
    pub fn fetch_gem_metadata(&self, name: &str) -> Result<Option<GemMetadata>> {
        let url = format!("{}/api/v1/gems/{}.json", self.base_url, name);
        let response = self.client.get(&url).send().context("gem metadata request failed")?;

        match response.status() {
            reqwest::StatusCode::OK => {
                Ok(Some(response.json().context("failed to parse gem metadata")?))
            }
            reqwest::StatusCode::NOT_FOUND => Ok(None),
            status => Err(anyhow::anyhow!("unexpected status fetching gem metadata: {status}")),
        }
    }

    /// The `.gem` download URL for a name/version pair.
    pub fn gem_download_url(&self, name: &str, version: &str) -> String {
        format!("{}/downloads/{}-{}.gem", self.base_url, name, version)
    }

    /// Download a `.gem` file's bytes.
    pub fn download_gem(&self, name: &str, version: &str) -> Result<Vec<u8>> {
        let url = self.gem_download_url(name, version);
        let response = self.client.get(&url).send().context("gem download request failed")?;
        if !response.status().is_success() {
            return Err(anyhow::anyhow!("gem download failed with status {}", response.status()));
        }
        Ok(response.bytes().context("failed to read gem body")?.to_vec())
    }

    /// Fetch full npm package metadata (all versions) from `/<name>`,
    /// URL-encoding a scoped package's `/` as required by the registry.
    pub fn fetch_npm_package(&self, name: &str) -> Result<Option<NpmPackageMetadata>> {
        let encoded = npm_encode_name(name);
        let url = format!("{}/{}", self.base_url, encoded);
        let response = self.client.get(&url).send().context("npm metadata request failed")?;

        match response.status() {
            reqwest::StatusCode::OK => {
                Ok(Some(response.json().context("failed to parse npm metadata")?))
            }
            reqwest::StatusCode::NOT_FOUND => Ok(None),
            status => Err(anyhow::anyhow!("unexpected status fetching npm metadata: {status}")),
        }
    }

    /// Download an npm tarball's bytes from a `dist.tarball` URL.
    pub fn download_tarball(&self, tarball_url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(tarball_url).send().context("tarball download failed")?;
        if !response.status().is_success() {
            return Err(anyhow::anyhow!("tarball download failed with status {}", response.status()));
        }
        Ok(response.bytes().context("failed to read tarball body")?.to_vec())
    }
}

/// URL-encode an npm package name for use as a registry path segment.
/// Scoped packages (`@scope/name`) need their `/` escaped to `%2f`.
pub fn npm_encode_name(name: &str) -> String {
    if let Some(rest) = name.strip_prefix('@')
        && let Some((scope, pkg)) = rest.split_once('/')
    {
        return format!("@{scope}%2f{pkg}");
    }
    name.to_string()
}

/// A single gem's metadata as returned by the RubyGems API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GemMetadata {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub dependencies: GemDependencies,
    #[serde(default)]
    pub authors: String,
    #[serde(default)]
    pub licenses: Option<Vec<String>>,
    #[serde(default)]
    pub homepage_uri: Option<String>,
    pub sha: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GemDependencies {
    #[serde(default)]
    pub runtime: Vec<GemDependency>,
    #[serde(default)]
    pub development: Vec<GemDependency>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GemDependency {
    pub name: String,
    pub requirements: String,
}

/// npm package metadata: versions keyed by version string, with each
/// version's dist info (including the tarball URL).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpmPackageMetadata {
    pub name: String,
    pub versions: std::collections::BTreeMap<String, NpmVersionMetadata>,
    #[serde(rename = "dist-tags")]
    #[serde(default)]
    pub dist_tags: std::collections::BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpmVersionMetadata {
    pub name: String,
    pub version: String,
    pub dist: NpmDist,
    #[serde(default)]
    pub dependencies: std::collections::BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpmDist {
    pub tarball: String,
    pub shasum: Option<String>,
}

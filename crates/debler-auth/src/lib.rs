//! Webhook API-key resolution and the SHA-256 auth check for trigger
//! requests.
//!
//! Each packager is configured with an API key. A trigger request must
//! carry an `Authorization` header equal to the hex-encoded SHA-256
//! digest of `name || version || apikey` (§4.7 validation step 5). This
//! is deliberately not HMAC: it matches the upstream webhook contract
//! being repackaged, which predates keyed-hash primitives in its
//! tool-chain. Keys can come from the packager's config entry directly,
//! or from a keys file (`$DEBLER_HOME/webhook-keys.toml`) keyed by
//! packager name, mirroring how registry credentials are resolved from a
//! dotfile rather than baked into the main config.
//!
//! # Example
//!
//! ```
//! use debler_auth::{compute_digest, verify};
//!
//! let digest = compute_digest("libfoo", "1.2.3", "s3kr3t");
//! assert!(verify(&digest, "libfoo", "1.2.3", "s3kr3t"));
//! assert!(!verify(&digest, "libfoo", "1.2.4", "s3kr3t"));
//! ```

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Environment variable naming `$DEBLER_HOME` (defaults to `~/.debler`).
pub const DEBLER_HOME_ENV: &str = "DEBLER_HOME";

/// File, relative to `$DEBLER_HOME`, holding per-packager webhook keys.
pub const WEBHOOK_KEYS_FILE: &str = "webhook-keys.toml";

/// Compute the expected `Authorization` header value for a trigger
/// request: hex(SHA-256(name || version || apikey)).
pub fn compute_digest(name: &str, version: &str, apikey: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(version.as_bytes());
    hasher.update(apikey.as_bytes());
    hex::encode(hasher.finalize())
}

/// Verify a supplied `Authorization` header against the expected digest,
/// in constant time so a timing side-channel can't shortcut key
/// recovery.
pub fn verify(header_value: &str, name: &str, version: &str, apikey: &str) -> bool {
    let expected = compute_digest(name, version, apikey);
    if header_value.len() != expected.len() {
        return false;
    }
    header_value.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Resolve `$DEBLER_HOME`, defaulting to `~/.debler`.
pub fn debler_home_path(debler_home: Option<&Path>) -> PathBuf {
    if let Some(path) = debler_home {
        return path.to_path_buf();
    }
    if let Ok(path) = env::var(DEBLER_HOME_ENV) {
        return PathBuf::from(path);
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".debler");
    }
    PathBuf::from(".debler")
}

/// Look up the configured API key for a packager in the keys file.
pub fn apikey_from_keys_file(path: &Path, packager: &str) -> Result<String> {
    if !path.exists() {
        return Err(anyhow::anyhow!("webhook keys file not found: {}", path.display()));
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read webhook keys file: {}", path.display()))?;
    let keys: toml::Value = toml::from_str(&content)
        .with_context(|| format!("failed to parse webhook keys file: {}", path.display()))?;

    keys.get(packager)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("no webhook key configured for packager: {packager}"))
}

/// Resolve the API key for a packager: an explicit key from config takes
/// priority, falling back to the keys file under `$DEBLER_HOME`.
pub fn resolve_apikey(
    packager: &str,
    configured: Option<&str>,
    debler_home: Option<&Path>,
) -> Result<String> {
    if let Some(key) = configured
        && !key.is_empty()
    {
        return Ok(key.to_string());
    }

    let home = debler_home_path(debler_home);
    apikey_from_keys_file(&home.join(WEBHOOK_KEYS_FILE), packager)
}

/// Mask an API key for safe display in logs (first 4 and last 4 chars).
pub fn mask_token(token: &str) -> String {
    if token.len() <= 8 {
        return "*".repeat(token.len());
    }
    format!("{}****{}", &token[..4], &token[token.len() - 4..])
}

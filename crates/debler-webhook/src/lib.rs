//! Inbound upstream-release webhook intake for debler.
//!
//! Upstream registries (or CI pipelines publishing to them) call
//! `POST /debler/updatetrigger/<packager>` with `{"name", "version"}`
//! whenever a new release goes out. This crate validates that request
//! (§4.7's five-step order) and turns it into a [`ReleaseNotification`]
//! the caller can feed to the scheduler; it does not itself touch the
//! catalog, so it stays usable from both the long-running `serve`
//! command and from tests.
//!
//! # Example
//!
//! ```
//! use debler_webhook::{validate_request, PackagerWebhookConfig};
//!
//! let config = PackagerWebhookConfig { apikey: None, hook_command: None };
//! let notification = validate_request(
//!     Some("application/json"),
//!     Some(17),
//!     br#"{"name":"rails","version":"7.1.0"}"#,
//!     None,
//!     &config,
//! ).expect("valid request");
//! assert_eq!(notification.name, "rails");
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum accepted request body size: 1 MiB.
pub const MAX_BODY_BYTES: u64 = 1024 * 1024;

/// Timeout applied to the optional post-schedule hook command.
pub const HOOK_TIMEOUT: Duration = Duration::from_secs(60);

/// The JSON body of an upstream release notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseNotification {
    pub name: String,
    pub version: String,
}

/// Per-packager webhook configuration: an optional API key (if absent,
/// requests are accepted unauthenticated) and an optional hook command
/// template run after a Revision is scheduled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackagerWebhookConfig {
    pub apikey: Option<String>,
    pub hook_command: Option<String>,
}

/// Validation failure, each variant carrying the HTTP status §4.7
/// assigns it.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("no packager registered at this path")]
    UnknownPackager,
    #[error("Content-Type must be application/json")]
    UnsupportedMediaType,
    #[error("Content-Length header is required")]
    MissingContentLength,
    #[error("request body exceeds {MAX_BODY_BYTES} bytes")]
    PayloadTooLarge,
    #[error("request body is not valid JSON with name and version")]
    InvalidJson,
    #[error("Authorization header missing or incorrect")]
    Unauthorized,
}

impl WebhookError {
    /// The HTTP status code §4.7 assigns to this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            WebhookError::UnknownPackager => 404,
            WebhookError::UnsupportedMediaType => 415,
            WebhookError::MissingContentLength => 411,
            WebhookError::PayloadTooLarge => 413,
            WebhookError::InvalidJson => 400,
            WebhookError::Unauthorized => 403,
        }
    }
}

/// Run the webhook's request validation, in the exact order §4.7
/// specifies: media type, then declared length, then body parse, then
/// auth. Packager lookup (step 1, `404` for an unknown path) happens
/// one level up, in the router, since this function already has a
/// resolved [`PackagerWebhookConfig`] in hand.
pub fn validate_request(
    content_type: Option<&str>,
    content_length: Option<u64>,
    body: &[u8],
    authorization: Option<&str>,
    config: &PackagerWebhookConfig,
) -> Result<ReleaseNotification, WebhookError> {
    match content_type {
        Some(ct) if ct.split(';').next().unwrap_or("").trim() == "application/json" => {}
        _ => return Err(WebhookError::UnsupportedMediaType),
    }

    let length = content_length.ok_or(WebhookError::MissingContentLength)?;
    if length > MAX_BODY_BYTES {
        return Err(WebhookError::PayloadTooLarge);
    }

    let notification: ReleaseNotification =
        serde_json::from_slice(body).map_err(|_| WebhookError::InvalidJson)?;

    if let Some(apikey) = &config.apikey {
        let header = authorization.ok_or(WebhookError::Unauthorized)?;
        if !debler_auth::verify(header, &notification.name, &notification.version, apikey) {
            return Err(WebhookError::Unauthorized);
        }
    }

    Ok(notification)
}

/// Substitute `{gem}`, `{slot}`, and `{version}` placeholders in a
/// configured hook command template.
pub fn substitute_placeholders(template: &str, gem: &str, slot: &str, version: &str) -> String {
    template
        .replace("{gem}", gem)
        .replace("{slot}", slot)
        .replace("{version}", version)
}

/// Run a configured hook command (already placeholder-substituted)
/// under a shell, subject to [`HOOK_TIMEOUT`]. Argv is sanitized before
/// being handed back in the result so a secret baked into the template
/// never reaches the event log verbatim.
pub fn run_hook_command(command: &str) -> anyhow::Result<debler_process::CommandOutput> {
    debler_process::run_command_with_timeout(
        "sh",
        &["-c", command],
        std::path::Path::new("."),
        Some(HOOK_TIMEOUT),
    )
}

/// Outcome of dispatching a validated notification against the
/// catalog: distinguishes the "nothing to do" paths (§4.7's "log and
/// return" cases) from an actually scheduled build, so callers can
/// decide what to log without re-deriving it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No package is registered under this name (`autocreate=false`).
    UnknownPackage,
    /// No slot's key is a prefix of this version.
    NoMatchingSlot,
    /// This exact version is already present in the matched slot.
    AlreadyScheduled,
    /// A new Revision was scheduled for the given slot.
    Scheduled { slot: String },
}

/// Resolves a notification against the catalog and schedules a
/// Revision if appropriate. The catalog itself lives in
/// [`debler_catalog`]; this trait keeps that dependency out of the
/// webhook crate so it can be unit-tested without a real catalog.
pub trait ReleaseScheduler {
    fn dispatch(&self, notification: &ReleaseNotification) -> anyhow::Result<DispatchOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_without_key() -> PackagerWebhookConfig {
        PackagerWebhookConfig { apikey: None, hook_command: None }
    }

    #[test]
    fn accepts_valid_unauthenticated_request() {
        let result = validate_request(
            Some("application/json"),
            Some(30),
            br#"{"name":"rails","version":"7.1.0"}"#,
            None,
            &config_without_key(),
        );
        assert_eq!(result.unwrap(), ReleaseNotification { name: "rails".into(), version: "7.1.0".into() });
    }

    #[test]
    fn rejects_wrong_content_type() {
        let result = validate_request(Some("text/plain"), Some(10), b"{}", None, &config_without_key());
        assert_eq!(result.unwrap_err(), WebhookError::UnsupportedMediaType);
    }

    #[test]
    fn rejects_missing_content_length() {
        let result = validate_request(Some("application/json"), None, b"{}", None, &config_without_key());
        assert_eq!(result.unwrap_err(), WebhookError::MissingContentLength);
    }

    #[test]
    fn rejects_oversized_content_length() {
        let result = validate_request(
            Some("application/json"),
            Some(MAX_BODY_BYTES + 1),
            b"{}",
            None,
            &config_without_key(),
        );
        assert_eq!(result.unwrap_err(), WebhookError::PayloadTooLarge);
    }

    #[test]
    fn rejects_malformed_json() {
        let result = validate_request(Some("application/json"), Some(2), b"{not json", None, &config_without_key());
        assert_eq!(result.unwrap_err(), WebhookError::InvalidJson);
    }

    #[test]
    fn rejects_missing_auth_when_apikey_configured() {
        let config = PackagerWebhookConfig { apikey: Some("secret".into()), hook_command: None };
        let result = validate_request(
            Some("application/json"),
            Some(30),
            br#"{"name":"rails","version":"7.1.0"}"#,
            None,
            &config,
        );
        assert_eq!(result.unwrap_err(), WebhookError::Unauthorized);
    }

    #[test]
    fn accepts_correct_digest_auth() {
        let config = PackagerWebhookConfig { apikey: Some("secret".into()), hook_command: None };
        let digest = debler_auth::compute_digest("rails", "7.1.0", "secret");
        let result = validate_request(
            Some("application/json"),
            Some(30),
            br#"{"name":"rails","version":"7.1.0"}"#,
            Some(&digest),
            &config,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn rejects_wrong_digest_auth() {
        let config = PackagerWebhookConfig { apikey: Some("secret".into()), hook_command: None };
        let result = validate_request(
            Some("application/json"),
            Some(30),
            br#"{"name":"rails","version":"7.1.0"}"#,
            Some("0000"),
            &config,
        );
        assert_eq!(result.unwrap_err(), WebhookError::Unauthorized);
    }

    #[test]
    fn content_type_with_charset_suffix_accepted() {
        let result = validate_request(
            Some("application/json; charset=utf-8"),
            Some(30),
            br#"{"name":"rails","version":"7.1.0"}"#,
            None,
            &config_without_key(),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn substitutes_all_placeholders() {
        let out = substitute_placeholders("notify {gem} {slot} {version}", "rails", "7.1", "7.1.0");
        assert_eq!(out, "notify rails 7.1 7.1.0");
    }

    #[test]
    fn run_hook_command_executes_shell() {
        let result = run_hook_command("echo hi").expect("run");
        assert_eq!(result.exit_code, 0);
        assert!(result.stdout.contains("hi"));
    }

    #[test]
    fn status_codes_match_spec() {
        assert_eq!(WebhookError::UnknownPackager.status_code(), 404);
        assert_eq!(WebhookError::UnsupportedMediaType.status_code(), 415);
        assert_eq!(WebhookError::MissingContentLength.status_code(), 411);
        assert_eq!(WebhookError::PayloadTooLarge.status_code(), 413);
        assert_eq!(WebhookError::InvalidJson.status_code(), 400);
        assert_eq!(WebhookError::Unauthorized.status_code(), 403);
    }
}

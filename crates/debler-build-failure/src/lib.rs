//! Typed build-failure classification for debler.
//!
//! A build fails for one of a small number of reasons, and the
//! scheduler needs to tell them apart: an infrastructure failure
//! (`dpkg-buildpackage` rejected the tree, the signer couldn't reach
//! the key) is worth retrying on a later attempt; a programming error
//! (unknown constraint operator, a metadata field the parser didn't
//! expect) is not, since retrying reproduces the same bug.
//! [`BuildFail`] carries that distinction at the type level instead of
//! leaving it to a string message.
//!
//! # Example
//!
//! ```
//! use debler_build_failure::BuildFail;
//! use debler_types::ErrorClass;
//!
//! let fail = BuildFail::ToolChain { tool: "dpkg-buildpackage".into(), detail: "exit 2".into() };
//! assert_eq!(fail.class(), ErrorClass::Infrastructure);
//! assert!(fail.is_retryable());
//! ```

use debler_types::ErrorClass;
use thiserror::Error;

/// A classified build failure, distinguishing infrastructure errors
/// (retryable) from programming errors (not).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildFail {
    /// The packaging tool-chain itself failed: `dpkg-buildpackage`,
    /// `dpkg-source`, `sbuild`, or the `gpg` signer exited non-zero.
    #[error("{tool} failed: {detail}")]
    ToolChain { tool: String, detail: String },

    /// Fetching or extracting the upstream archive failed.
    #[error("failed to fetch or extract upstream source: {detail}")]
    UpstreamFetch { detail: String },

    /// A metadata field the parser expected was absent or malformed.
    #[error("missing or malformed metadata field: {field}")]
    MissingMetadata { field: String },

    /// A constraint operator the compiler doesn't know how to handle.
    #[error("unknown constraint operator: {operator}")]
    UnknownOperator { operator: String },

    /// Any other programming error surfaced at the build-loop boundary,
    /// carrying its message for the event log.
    #[error("programming error: {detail}")]
    Internal { detail: String },
}

impl BuildFail {
    /// The cause-based class this failure belongs to, per the error
    /// taxonomy: tool-chain and fetch failures are infrastructure (or
    /// upstream-fetch) failures; everything else is a programming
    /// error.
    pub fn class(&self) -> ErrorClass {
        match self {
            BuildFail::ToolChain { .. } => ErrorClass::Infrastructure,
            BuildFail::UpstreamFetch { .. } => ErrorClass::UpstreamFetch,
            BuildFail::MissingMetadata { .. }
            | BuildFail::UnknownOperator { .. }
            | BuildFail::Internal { .. } => ErrorClass::Programming,
        }
    }

    /// Whether a later scheduler pass should retry this revision.
    /// Infrastructure and upstream-fetch failures are transient by
    /// nature; programming errors reproduce identically on retry, so
    /// retrying wastes a build slot without changing the outcome.
    pub fn is_retryable(&self) -> bool {
        matches!(self.class(), ErrorClass::Infrastructure | ErrorClass::UpstreamFetch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_chain_failure_is_infrastructure_and_retryable() {
        let fail = BuildFail::ToolChain { tool: "sbuild".into(), detail: "chroot missing".into() };
        assert_eq!(fail.class(), ErrorClass::Infrastructure);
        assert!(fail.is_retryable());
    }

    #[test]
    fn upstream_fetch_failure_is_retryable() {
        let fail = BuildFail::UpstreamFetch { detail: "connection reset".into() };
        assert_eq!(fail.class(), ErrorClass::UpstreamFetch);
        assert!(fail.is_retryable());
    }

    #[test]
    fn missing_metadata_is_programming_and_not_retryable() {
        let fail = BuildFail::MissingMetadata { field: "homepage_uri".into() };
        assert_eq!(fail.class(), ErrorClass::Programming);
        assert!(!fail.is_retryable());
    }

    #[test]
    fn unknown_operator_is_programming() {
        let fail = BuildFail::UnknownOperator { operator: "<=>".into() };
        assert_eq!(fail.class(), ErrorClass::Programming);
        assert!(!fail.is_retryable());
    }

    #[test]
    fn display_messages_are_descriptive() {
        let fail = BuildFail::ToolChain { tool: "dpkg-buildpackage".into(), detail: "exit 2".into() };
        assert_eq!(fail.to_string(), "dpkg-buildpackage failed: exit 2");
    }

    #[test]
    fn internal_error_is_not_retryable() {
        let fail = BuildFail::Internal { detail: "unreachable state".into() };
        assert!(!fail.is_retryable());
    }
}

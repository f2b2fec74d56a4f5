//! Environment fingerprinting for debler.
//!
//! Detects the ambient CI environment and produces the builder identity
//! string recorded on a revision's `claimed` marker, so two builders
//! racing to claim the same revision is visible in the audit trail even
//! when it doesn't result in a double build.
//!
//! # Example
//!
//! ```
//! use debler_environment::{builder_identity, detect_environment};
//!
//! let env = detect_environment();
//! let identity = builder_identity();
//! println!("Running in {:?} as {}", env, identity);
//! ```

use std::collections::BTreeMap;
use std::env;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Detected CI environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CiEnvironment {
    GitHubActions,
    GitLabCI,
    CircleCI,
    TravisCI,
    AzurePipelines,
    Jenkins,
    BitbucketPipelines,
    #[default]
    Local,
}

impl std::fmt::Display for CiEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CiEnvironment::GitHubActions => write!(f, "GitHub Actions"),
            CiEnvironment::GitLabCI => write!(f, "GitLab CI"),
            CiEnvironment::CircleCI => write!(f, "CircleCI"),
            CiEnvironment::TravisCI => write!(f, "Travis CI"),
            CiEnvironment::AzurePipelines => write!(f, "Azure Pipelines"),
            CiEnvironment::Jenkins => write!(f, "Jenkins"),
            CiEnvironment::BitbucketPipelines => write!(f, "Bitbucket Pipelines"),
            CiEnvironment::Local => write!(f, "Local"),
        }
    }
}

pub fn detect_environment() -> CiEnvironment {
    if env::var("GITHUB_ACTIONS").is_ok() {
        return CiEnvironment::GitHubActions;
    }
    if env::var("GITLAB_CI").is_ok() {
        return CiEnvironment::GitLabCI;
    }
    if env::var("CIRCLECI").is_ok() {
        return CiEnvironment::CircleCI;
    }
    if env::var("TRAVIS").is_ok() {
        return CiEnvironment::TravisCI;
    }
    if env::var("TF_BUILD").is_ok() {
        return CiEnvironment::AzurePipelines;
    }
    if env::var("JENKINS_URL").is_ok() {
        return CiEnvironment::Jenkins;
    }
    if env::var("BITBUCKET_BUILD_NUMBER").is_ok() {
        return CiEnvironment::BitbucketPipelines;
    }
    CiEnvironment::Local
}

pub fn is_ci() -> bool {
    detect_environment() != CiEnvironment::Local
}

/// The identity string written onto a revision's `claimed` marker: the
/// host name, falling back to `PID@unknown-host` if it can't be read.
pub fn builder_identity() -> String {
    let host = gethostname::gethostname()
        .into_string()
        .unwrap_or_else(|_| "unknown-host".to_string());
    format!("{host}:{}", std::process::id())
}

/// Environment information collected alongside a build, for the audit
/// trail and for diagnosing builds that behave differently across hosts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    pub ci_environment: CiEnvironment,
    pub os: String,
    pub arch: String,
    pub builder: String,
    pub env_vars: BTreeMap<String, String>,
    pub collected_at: DateTime<Utc>,
}

impl EnvironmentInfo {
    pub fn collect() -> Self {
        Self {
            ci_environment: detect_environment(),
            os: env::consts::OS.to_string(),
            arch: env::consts::ARCH.to_string(),
            builder: builder_identity(),
            env_vars: collect_env_vars(),
            collected_at: Utc::now(),
        }
    }

    pub fn fingerprint(&self) -> String {
        let mut components = vec![
            format!("ci:{}", self.ci_environment),
            format!("os:{}", self.os),
            format!("arch:{}", self.arch),
            format!("builder:{}", self.builder),
        ];
        for (key, value) in &self.env_vars {
            components.push(format!("{key}:{value}"));
        }
        components.join("|")
    }
}

fn collect_env_vars() -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    let ci_vars = [
        "CI",
        "GITHUB_REF",
        "GITHUB_SHA",
        "GITHUB_REPOSITORY",
        "GITHUB_RUN_ID",
        "GITLAB_CI_PIPELINE_ID",
        "CIRCLE_BUILD_NUM",
        "TRAVIS_BUILD_NUMBER",
        "BUILD_BUILDID",
    ];
    for var in ci_vars {
        if let Ok(value) = env::var(var) {
            vars.insert(var.to_string(), value);
        }
    }
    vars
}

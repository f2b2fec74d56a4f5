//! Git-sourced upstream checkout for the builder's `fetchSource` step.
//!
//! A handful of packagers source their upstream from a git repository
//! rather than a gem/npm tarball (first-party apps, vendored forks).
//! This crate clones the configured repository, resets it to the
//! configured revision, and produces a deterministic source archive from
//! the checkout, plus the provenance ([`GitContext`]) recorded against
//! the resulting build.
//!
//! # Example
//!
//! ```no_run
//! use debler_git::{clone_at_revision, get_git_context};
//! use std::path::Path;
//!
//! clone_at_revision("https://example.com/app.git", "v1.2.3", Path::new("/tmp/app-checkout")).unwrap();
//! let context = get_git_context(Path::new("/tmp/app-checkout"));
//! ```

use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Provenance recorded against a git-sourced build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitContext {
    pub commit: Option<String>,
    pub branch: Option<String>,
    pub tag: Option<String>,
    pub dirty: Option<bool>,
}

impl GitContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_commit(&self) -> bool {
        self.commit.is_some()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.unwrap_or(true)
    }

    /// Short commit hash (first 7 characters), as embedded in a
    /// generated changelog entry or orig tarball name.
    pub fn short_commit(&self) -> Option<&str> {
        self.commit.as_ref().map(|c| if c.len() > 7 { &c[..7] } else { c.as_str() })
    }
}

/// Clone `repo_url` into `dest` and reset the working tree to
/// `revision` (a tag, branch, or commit). `dest` must not already exist.
pub fn clone_at_revision(repo_url: &str, revision: &str, dest: &Path) -> Result<()> {
    let status = Command::new("git")
        .args(["clone", "--quiet", repo_url])
        .arg(dest)
        .status()
        .with_context(|| format!("failed to run git clone {repo_url}"))?;
    if !status.success() {
        return Err(anyhow::anyhow!("git clone of {repo_url} failed"));
    }

    let status = Command::new("git")
        .args(["fetch", "--quiet", "--tags", "origin", revision])
        .current_dir(dest)
        .status()
        .with_context(|| format!("failed to fetch revision {revision}"))?;
    if !status.success() {
        return Err(anyhow::anyhow!("git fetch of revision {revision} failed"));
    }

    let status = Command::new("git")
        .args(["reset", "--quiet", "--hard", revision])
        .current_dir(dest)
        .status()
        .with_context(|| format!("failed to reset to revision {revision}"))?;
    if !status.success() {
        return Err(anyhow::anyhow!("git reset to {revision} failed"));
    }

    Ok(())
}

/// Produce a deterministic tar archive of a checkout's tracked files
/// (used as the upstream content feeding `buildOrigTar`).
pub fn archive_checkout(checkout: &Path, revision: &str, dest_tar: &Path) -> Result<()> {
    let output = Command::new("git")
        .args(["archive", "--format=tar", "-o"])
        .arg(dest_tar)
        .arg(revision)
        .current_dir(checkout)
        .output()
        .context("failed to run git archive")?;

    if !output.status.success() {
        return Err(anyhow::anyhow!(
            "git archive failed: {}",
            String::from_utf8_lossy(&output.stderr)
        ));
    }
    Ok(())
}

/// Check if the git working tree is clean (no uncommitted changes).
pub fn is_git_clean(path: &Path) -> Result<bool> {
    let output = Command::new("git")
        .args(["status", "--porcelain"])
        .current_dir(path)
        .output()
        .context("failed to run git status")?;

    if !output.status.success() {
        return Err(anyhow::anyhow!(
            "git status failed: {}",
            String::from_utf8_lossy(&output.stderr)
        ));
    }
    Ok(output.stdout.is_empty())
}

pub fn is_git_repo(path: &Path) -> bool {
    Command::new("git")
        .args(["rev-parse", "--is-inside-work-tree"])
        .current_dir(path)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

pub fn get_commit_hash(path: &Path) -> Result<String> {
    let output = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(path)
        .output()
        .context("failed to run git rev-parse")?;

    if !output.status.success() {
        return Err(anyhow::anyhow!(
            "git rev-parse failed: {}",
            String::from_utf8_lossy(&output.stderr)
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

pub fn get_branch(path: &Path) -> Result<Option<String>> {
    let output = Command::new("git")
        .args(["rev-parse", "--abbrev-ref", "HEAD"])
        .current_dir(path)
        .output()
        .context("failed to run git rev-parse")?;

    if !output.status.success() {
        return Ok(None);
    }
    let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if branch == "HEAD" {
        return Ok(None);
    }
    Ok(Some(branch))
}

pub fn get_tag(path: &Path) -> Result<Option<String>> {
    let output = Command::new("git")
        .args(["describe", "--exact-match", "--tags"])
        .current_dir(path)
        .output()
        .context("failed to run git describe")?;

    if !output.status.success() {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
}

pub fn get_git_context(path: &Path) -> GitContext {
    GitContext {
        commit: get_commit_hash(path).ok(),
        branch: get_branch(path).ok().flatten(),
        tag: get_tag(path).ok().flatten(),
        dirty: is_git_clean(path).ok().map(|c| !c),
    }
}

pub fn get_remote_url(path: &Path, remote: &str) -> Result<Option<String>> {
    let output = Command::new("git")
        .args(["remote", "get-url", remote])
        .current_dir(path)
        .output()
        .context("failed to run git remote")?;

    if !output.status.success() {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use tempfile::tempdir;

    fn init_git_repo(dir: &Path) {
        Command::new("git").args(["init", "--quiet"]).current_dir(dir).output().expect("git init");
        Command::new("git")
            .args(["config", "user.email", "test@example.com"])
            .current_dir(dir)
            .output()
            .expect("git config");
        Command::new("git")
            .args(["config", "user.name", "Test User"])
            .current_dir(dir)
            .output()
            .expect("git config");
    }

    fn make_commit(dir: &Path, msg: &str) {
        Command::new("git")
            .args(["commit", "--allow-empty", "-m", msg])
            .current_dir(dir)
            .output()
            .expect("git commit");
    }

    #[test]
    fn is_git_repo_detects_repo() {
        let td = tempdir().expect("tempdir");
        init_git_repo(td.path());
        assert!(is_git_repo(td.path()));
    }

    #[test]
    fn is_git_repo_returns_false_for_non_repo() {
        let td = tempdir().expect("tempdir");
        assert!(!is_git_repo(td.path()));
    }

    #[test]
    fn is_git_clean_for_empty_repo() {
        let td = tempdir().expect("tempdir");
        init_git_repo(td.path());
        assert!(is_git_clean(td.path()).unwrap_or(false));
    }

    #[test]
    fn get_commit_hash_returns_hash() {
        let td = tempdir().expect("tempdir");
        init_git_repo(td.path());
        make_commit(td.path(), "test");

        let hash = get_commit_hash(td.path()).expect("commit hash");
        assert_eq!(hash.len(), 40);
    }

    #[test]
    fn get_git_context_populates_fields() {
        let td = tempdir().expect("tempdir");
        init_git_repo(td.path());
        make_commit(td.path(), "test");

        let context = get_git_context(td.path());
        assert!(context.has_commit());
        assert!(!context.is_dirty());
        assert!(context.short_commit().is_some());
    }

    #[test]
    fn git_context_default() {
        let context = GitContext::new();
        assert!(!context.has_commit());
        assert!(context.branch.is_none());
    }

    #[test]
    fn short_commit_truncates() {
        let mut context = GitContext::new();
        context.commit = Some("0123456789abcdef0123456789abcdef01234567".to_string());
        assert_eq!(context.short_commit(), Some("0123456"));
    }

    #[test]
    fn get_remote_url_none_when_no_remote() {
        let td = tempdir().expect("tempdir");
        init_git_repo(td.path());
        let url = get_remote_url(td.path(), "origin").expect("remote url");
        assert!(url.is_none());
    }

    #[test]
    fn archive_checkout_produces_tar() {
        let td = tempdir().expect("tempdir");
        init_git_repo(td.path());
        std::fs::write(td.path().join("file.txt"), "content").expect("write");
        Command::new("git").args(["add", "."]).current_dir(td.path()).output().expect("add");
        make_commit(td.path(), "test");

        let tar_path = td.path().join("out.tar");
        archive_checkout(td.path(), "HEAD", &tar_path).expect("archive");
        assert!(tar_path.exists());
        assert!(std::fs::metadata(&tar_path).unwrap().len() > 0);
    }
}

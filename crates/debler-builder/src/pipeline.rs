//! The nine-step build pipeline: createDirs, fetchSource, parseMetadata,
//! buildOrigTar, extractOrigTar, genDebianPackage, createSourcePackage,
//! run, upload. Grounded directly in the base builder's file-writing
//! order (source format, compat, copyright, changelog, control, rules)
//! and its `create_source_package`/`build`/module-level `publish` steps.

use std::fs;
use std::path::{Path, PathBuf};

use debler_build_failure::BuildFail;
use debler_catalog::BuildData;
use debler_git::{archive_checkout, clone_at_revision};
use debler_output_sanitizer::SecretSet;
use debler_process::{run_apt_ftparchive, run_command_in_dir, run_dpkg_source, run_gpg_clearsign, run_sbuild};
use debler_registry::RegistryClient;

use crate::changelog;
use crate::emitter::DebianTree;
use crate::generator::{Generator, UpstreamMetadata};

/// Everything a pipeline run needs that isn't specific to one revision:
/// where to stage trees, how to sign, what to scrub from logs.
pub struct BuildContext {
    pub maintainer: String,
    pub work_dir: PathBuf,
    pub keyid: String,
    /// Distribution name passed to `sbuild --dist`.
    pub chroot_dist: String,
    pub secrets: SecretSet,
}

/// The on-disk layout for one revision's build, once staged.
pub struct WorkingTree {
    pub pkg_dir: PathBuf,
    pub orig_tar: PathBuf,
    pub dsc_path: Option<PathBuf>,
}

fn to_fail(tool: &str, err: anyhow::Error) -> BuildFail {
    BuildFail::ToolChain {
        tool: tool.to_string(),
        detail: err.to_string(),
    }
}

/// Step 1: lay out `<work_dir>/<deb_name>-<version>/debian/source`.
pub fn create_dirs(ctx: &BuildContext, deb_name: &str, version: &str) -> Result<WorkingTree, BuildFail> {
    let pkg_dir = ctx.work_dir.join(format!("{deb_name}-{version}"));
    fs::create_dir_all(pkg_dir.join("debian/source")).map_err(|e| BuildFail::Internal {
        detail: format!("creating package tree at {}: {e}", pkg_dir.display()),
    })?;
    let orig_tar = ctx
        .work_dir
        .join(format!("{deb_name}_{version}.orig.tar.gz"));
    Ok(WorkingTree {
        pkg_dir,
        orig_tar,
        dsc_path: None,
    })
}

/// Step 2 + 3: fetch upstream source (git pin or registry tarball) and
/// whatever metadata the registry already gave us for it — the API
/// responses `debler-registry` already parses cover what the original
/// tool had to unpack the archive's embedded metadata for, so there is
/// no separate metadata-extraction pass here.
pub fn fetch_source(data: &BuildData, tree: &WorkingTree) -> Result<(Vec<u8>, UpstreamMetadata), BuildFail> {
    if let Some(git) = &data.version_config.git {
        let checkout = tree.pkg_dir.with_extension("git-checkout");
        clone_at_revision(&git.repository, &git.revision, &checkout)
            .map_err(|e| to_fail("git clone", e))?;
        let archive = tree.pkg_dir.with_extension("git-archive.tar");
        archive_checkout(&checkout, &git.revision, &archive).map_err(|e| to_fail("git archive", e))?;
        let bytes = fs::read(&archive).map_err(|e| BuildFail::UpstreamFetch {
            detail: format!("reading git archive {}: {e}", archive.display()),
        })?;
        return Ok((bytes, UpstreamMetadata::default()));
    }

    match data.packager.as_str() {
        "bundler" => {
            let client = RegistryClient::rubygems();
            let bytes = client
                .download_gem(&data.package_name, &data.version)
                .map_err(|e| BuildFail::UpstreamFetch { detail: e.to_string() })?;
            let metadata = client
                .fetch_gem_metadata(&data.package_name)
                .map_err(|e| BuildFail::UpstreamFetch { detail: e.to_string() })?
                .map(|gem| UpstreamMetadata {
                    description: gem.authors,
                    homepage: gem.homepage_uri,
                    runtime_deps: gem.dependencies.runtime.into_iter().map(|d| d.name).collect(),
                    has_native_extension: false,
                })
                .unwrap_or_default();
            Ok((bytes, metadata))
        }
        "yarn" => {
            let client = RegistryClient::npm();
            let upstream = client
                .fetch_npm_package(&data.package_name)
                .map_err(|e| BuildFail::UpstreamFetch { detail: e.to_string() })?
                .ok_or_else(|| BuildFail::UpstreamFetch {
                    detail: format!("{} not found on npm", data.package_name),
                })?;
            let version_meta = upstream.versions.get(&data.version).ok_or_else(|| BuildFail::MissingMetadata {
                field: format!("npm version {} of {}", data.version, data.package_name),
            })?;
            let bytes = client
                .download_tarball(&version_meta.dist.tarball)
                .map_err(|e| BuildFail::UpstreamFetch { detail: e.to_string() })?;
            let metadata = UpstreamMetadata {
                description: String::new(),
                homepage: None,
                runtime_deps: version_meta.dependencies.keys().cloned().collect(),
                has_native_extension: false,
            };
            Ok((bytes, metadata))
        }
        other => Err(BuildFail::Internal {
            detail: format!("no source fetcher registered for packager {other}"),
        }),
    }
}

/// Step 4: stage the downloaded bytes as the `.orig.tar.gz` dpkg-source
/// expects to find alongside the package tree.
pub fn build_orig_tar(tree: &WorkingTree, source_bytes: &[u8]) -> Result<(), BuildFail> {
    fs::write(&tree.orig_tar, source_bytes).map_err(|e| BuildFail::Internal {
        detail: format!("writing orig tarball {}: {e}", tree.orig_tar.display()),
    })
}

/// Step 5: unpack the orig tarball into the package tree dpkg-source
/// will read from.
pub fn extract_orig_tar(tree: &WorkingTree) -> Result<(), BuildFail> {
    let orig_tar = tree.orig_tar.to_string_lossy().into_owned();
    run_command_in_dir("tar", &["xzf", &orig_tar, "--strip-components=0"], &tree.pkg_dir)
        .and_then(|r| r.ok().map(|_| ()))
        .map_err(|e| to_fail("tar", e))
}

/// Step 6: write `debian/source/format`, `debian/compat`,
/// `debian/copyright`, `debian/changelog`, `debian/control`,
/// `debian/rules`, and every per-package `.install`/`.links` manifest.
/// Mirrors `gen_debian_package`'s step order exactly.
pub fn gen_debian_package(
    ctx: &BuildContext,
    tree: &WorkingTree,
    source_name: &str,
    changelog_entries: &[debler_catalog::ChangelogEntry],
    generator: &dyn Generator,
    data: &BuildData,
    metadata: &UpstreamMetadata,
) -> Result<DebianTree, BuildFail> {
    let debian_dir = tree.pkg_dir.join("debian");
    write_file(&debian_dir.join("source/format"), "3.0 (quilt)\n")?;
    write_file(&debian_dir.join("compat"), "9\n")?;
    write_file(
        &debian_dir.join("copyright"),
        &format!(
            "Format: https://www.debian.org/doc/packaging-manuals/copyright-format/1.0/\nUpstream-Name: {}\n",
            data.package_name
        ),
    )?;
    write_file(
        &debian_dir.join("changelog"),
        &changelog::render(source_name, &ctx.maintainer, changelog_entries),
    )?;

    let records = generator.emit(data, metadata);
    let debian_tree = DebianTree::materialize(records);

    write_file(&debian_dir.join("control"), &debian_tree.format_control(source_name, &ctx.maintainer))?;
    write_file(&debian_dir.join("rules"), &debian_tree.format_rules())?;
    set_executable(&debian_dir.join("rules"))?;

    for pkg in &debian_tree.packages {
        if let Some(manifest) = debian_tree.format_install_manifest(pkg) {
            write_file(&debian_dir.join(format!("{}.install", pkg.name)), &manifest)?;
        }
        if let Some(manifest) = debian_tree.format_links_manifest(pkg) {
            write_file(&debian_dir.join(format!("{}.links", pkg.name)), &manifest)?;
        }
        for (name, _dest, content, mode) in &pkg.content_files {
            let path = debian_dir.join(name);
            write_file(&path, content)?;
            if *mode & 0o111 != 0 {
                set_executable(&path)?;
            }
        }
    }
    for (name, content, mode) in &debian_tree.debian_content {
        let path = debian_dir.join(name);
        write_file(&path, content)?;
        if *mode & 0o111 != 0 {
            set_executable(&path)?;
        }
    }

    Ok(debian_tree)
}

fn write_file(path: &Path, contents: &str) -> Result<(), BuildFail> {
    fs::write(path, contents).map_err(|e| BuildFail::Internal {
        detail: format!("writing {}: {e}", path.display()),
    })
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<(), BuildFail> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)
        .map_err(|e| BuildFail::Internal {
            detail: format!("stat {}: {e}", path.display()),
        })?
        .permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).map_err(|e| BuildFail::Internal {
        detail: format!("chmod {}: {e}", path.display()),
    })
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<(), BuildFail> {
    Ok(())
}

/// Step 7: `dpkg-source -b`.
pub fn create_source_package(tree: &mut WorkingTree, source_name: &str, version: &str) -> Result<(), BuildFail> {
    let parent = tree.pkg_dir.parent().unwrap_or(&tree.pkg_dir).to_path_buf();
    let pkg_dir_str = tree.pkg_dir.to_string_lossy().into_owned();
    run_dpkg_source(&["-b", &pkg_dir_str], &parent)
        .and_then(|r| r.ok().map(|_| ()))
        .map_err(|e| to_fail("dpkg-source", e))?;
    tree.dsc_path = Some(parent.join(format!("{source_name}_{version}.dsc")));
    Ok(())
}

/// Step 8: `sbuild --dist <dist> --keyid <keyid> --maintainer <maintainer>
/// <dsc>`.
pub fn run_build(ctx: &BuildContext, tree: &WorkingTree) -> Result<(), BuildFail> {
    let dsc = tree.dsc_path.as_ref().ok_or_else(|| BuildFail::Internal {
        detail: "create_source_package must run before run_build".to_string(),
    })?;
    let keyid_flag = format!("--keyid={}", ctx.keyid);
    let maintainer_flag = format!("--maintainer={}", ctx.maintainer);
    let dist_flag = format!("--dist={}", ctx.chroot_dist);
    let dsc_str = dsc.to_string_lossy().to_string();
    let args = [dist_flag.as_str(), keyid_flag.as_str(), maintainer_flag.as_str(), dsc_str.as_str()];
    let result = run_sbuild(&args, tree.pkg_dir.parent().unwrap_or(&tree.pkg_dir)).map_err(|e| to_fail("sbuild", e))?;
    let sanitized_stderr = ctx.secrets.sanitize(&result.stderr);
    result.ok().map(|_| ()).map_err(|_| BuildFail::ToolChain {
        tool: "sbuild".to_string(),
        detail: sanitized_stderr,
    })
}

/// Step 9: upload built binaries to the configured per-package target
/// (a thin wrapper around whatever upload tool the operator points at;
/// debler does not implement a package-upload protocol itself).
pub fn upload(ctx: &BuildContext, tree: &WorkingTree, command: &str, args: &[&str]) -> Result<(), BuildFail> {
    let pkg_dir_str = tree.pkg_dir.to_string_lossy().into_owned();
    let mut full_args: Vec<&str> = vec![&pkg_dir_str];
    full_args.extend_from_slice(args);
    let result = run_command_in_dir(command, &full_args, &ctx.work_dir).map_err(|e| to_fail(command, e))?;
    let sanitized_stderr = ctx.secrets.sanitize(&result.stderr);
    result.ok().map(|_| ()).map_err(|_| BuildFail::ToolChain {
        tool: command.to_string(),
        detail: sanitized_stderr,
    })
}

/// Republish the repository index: `apt-ftparchive packages`/`release`,
/// then clearsign `Release` into `InRelease` and detach-sign into
/// `Release.gpg`, both written via a `.new` temp file and renamed into
/// place so a reader never observes a half-written release file.
pub fn publish(repo_dir: &Path, keyid: &str) -> Result<(), BuildFail> {
    run_apt_ftparchive(&["packages", "."], repo_dir)
        .and_then(|r| r.ok().map(|_| ()))
        .map_err(|e| to_fail("apt-ftparchive packages", e))?;
    run_apt_ftparchive(&["release", "."], repo_dir)
        .and_then(|r| r.ok().map(|_| ()))
        .map_err(|e| to_fail("apt-ftparchive release", e))?;

    let release = repo_dir.join("Release");
    let inrelease_new = repo_dir.join("InRelease.new");
    let release_gpg_new = repo_dir.join("Release.gpg.new");
    run_gpg_clearsign(keyid, &release, &inrelease_new)
        .and_then(|r| r.ok().map(|_| ()))
        .map_err(|e| to_fail("gpg --clearsign", e))?;
    run_command_in_dir("gpg", &["--default-key", keyid, "-abs", "-o", "Release.gpg.new", "Release"], repo_dir)
        .and_then(|r| r.ok().map(|_| ()))
        .map_err(|e| to_fail("gpg -abs", e))?;

    fs::rename(&inrelease_new, repo_dir.join("InRelease")).map_err(|e| BuildFail::Internal {
        detail: format!("renaming InRelease.new: {e}"),
    })?;
    fs::rename(&release_gpg_new, repo_dir.join("Release.gpg")).map_err(|e| BuildFail::Internal {
        detail: format!("renaming Release.gpg.new: {e}"),
    })?;
    Ok(())
}

//! Orchestration: the behavior behind every command in the CLI surface
//! (`build`, `gem`/`pkg`, `pkgapp`, `rebuild`, `publish`, `info`,
//! `serve`). [`Engine`] owns the catalog and config and composes the
//! scheduler, builder, app integrators, and webhook intake — the CLI
//! itself only parses arguments and calls a method here.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;

use debler_app::{AppIntegrator, AppSpec};
use debler_build_failure::BuildFail;
use debler_builder::emitter::DebianTree;
use debler_builder::{changelog, pipeline, DebBuilder, GemGenerator, NpmGenerator};
use debler_catalog::{Catalog, ChangelogEntry, Id, NewPackageSpec, PackageInfo};
use debler_config::Config;
use debler_environment::builder_identity;
use debler_events::{events_path, EventLog, RevisionEvent, RevisionEventKind};
use debler_output_sanitizer::SecretSet;
use debler_process::{run_dpkg_source, run_sbuild};
use debler_scheduler::{run_build_loop, SchedulerConfig, SelectionMode};
use debler_state::{append_receipt, BuildReceipt};
use debler_types::{Distribution, PackageConfig};
use debler_webhook::{
    run_hook_command, substitute_placeholders, validate_request, DispatchOutcome,
    PackagerWebhookConfig, ReleaseNotification, ReleaseScheduler, MAX_BODY_BYTES,
};

/// Knobs for one [`Engine::build`] invocation, matching the `build`
/// command's flags.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub fail_fast: bool,
    pub cancel: bool,
    pub incognito: bool,
    pub limit: Option<usize>,
}

/// What happened in [`Engine::pkgapp`], distinguishing the early-return
/// paths (`--parse-only`, `--schedule-dep-builds-only`) from a full build.
#[derive(Debug)]
pub enum PkgAppOutcome {
    ParsedOnly,
    DepsScheduled(Vec<Id>),
    Built,
}

/// Flags controlling how far [`Engine::pkgapp`] carries an app build.
#[derive(Debug, Clone, Default)]
pub struct PkgAppOptions {
    pub parse_only: bool,
    pub schedule_dep_builds_only: bool,
}

/// The running debler instance: an open catalog plus its configuration.
/// One process opens exactly one `Engine`; the catalog file's own
/// locking (via `debler-store`) is what makes concurrent CLI
/// invocations against the same `$DEBLER_HOME` safe.
pub struct Engine {
    pub catalog: Catalog,
    pub config: Config,
    state_dir: PathBuf,
}

impl Engine {
    /// Open the catalog rooted at `config.database`'s parent directory.
    pub fn open(config: Config) -> Result<Self> {
        let state_dir = config
            .database
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let catalog = Catalog::open(&state_dir).context("opening catalog")?;
        for packager in ["bundler", "yarn"] {
            if catalog.get_packager(packager).is_none() {
                catalog.register_packager(packager, serde_json::json!({}), true)?;
            }
        }
        Ok(Engine { catalog, config, state_dir })
    }

    fn record_scheduled(&self, revision_id: Id, reason: &str) -> Result<()> {
        let data = self.catalog.build_data(revision_id)?;
        let mut events = EventLog::new();
        events.record(RevisionEvent {
            timestamp: Utc::now(),
            revision: format!("{}@{}", data.package_os_name, data.revision_version),
            kind: RevisionEventKind::Scheduled { reason: reason.to_string() },
        });
        events.write_to_file(&events_path(&self.state_dir))
    }

    fn repo_dir(&self, kind: &str) -> PathBuf {
        self.state_dir.join("repo").join(kind)
    }

    // ---- build ------------------------------------------------------------

    /// Run the dequeue/claim/finalize loop over `mode`, recording every
    /// transition to the event log and appending a receipt.
    pub fn build(&self, mode: SelectionMode, opts: BuildOptions) -> Result<BuildReceipt> {
        let work_dir = tempfile::tempdir().context("creating build work dir")?;
        let ctx = pipeline::BuildContext {
            maintainer: self.config.maintainer.clone(),
            work_dir: work_dir.path().to_path_buf(),
            keyid: self.config.keyid.clone(),
            chroot_dist: self.config.distribution.to_string(),
            secrets: SecretSet::new(),
        };
        let builder = DebBuilder {
            ctx,
            catalog: &self.catalog,
            gem_generator: GemGenerator { rubies: self.config.rubies.clone() },
            npm_generator: NpmGenerator,
        };
        let scheduler_config = SchedulerConfig {
            host: builder_identity(),
            incognito: opts.incognito,
            fail_fast: opts.fail_fast,
            cancel: opts.cancel,
            limit: opts.limit,
        };

        let mut events = EventLog::new();
        let receipt = run_build_loop(&self.catalog, &builder, mode, &scheduler_config, &mut events)?;
        events.write_to_file(&events_path(&self.state_dir))?;
        append_receipt(&self.state_dir, &receipt)?;
        Ok(receipt)
    }

    // ---- gem / pkg ----------------------------------------------------------

    /// `gem --schedule name:version`: register the package if new, find
    /// or create its slot, and schedule a build — skipping one already
    /// tracked for this exact version.
    pub fn schedule_package_version(
        &self,
        packager: &str,
        name: &str,
        os_name: &str,
        version: &str,
    ) -> Result<Option<Id>> {
        let package = self
            .catalog
            .package_info(
                packager,
                name,
                Some(NewPackageSpec { os_name: os_name.to_string(), config: PackageConfig::default() }),
            )?
            .expect("autocreate always yields Some");

        let slot_id = self
            .catalog
            .slot_for_version(package.id, version, true)?
            .expect("create_if_missing always yields Some");

        if self.catalog.version_exists(slot_id, version) {
            return Ok(None);
        }

        let changelog = if self.catalog.slot_has_versions(slot_id) {
            "Update to version used in application"
        } else {
            "Import newly into debler"
        };
        let revision_version = format!("{version}-1");
        let revision_id = self.catalog.schedule_build(
            slot_id,
            version,
            &revision_version,
            changelog,
            self.config.distribution.clone(),
            None,
        )?;
        self.record_scheduled(revision_id, changelog)?;
        Ok(Some(revision_id))
    }

    /// `gem`/`pkg config`: mutate a package's stored configuration and
    /// reschedule the latest revision of every slot it already tracks,
    /// so the config change lands in the next build.
    pub fn configure_package(
        &self,
        packager: &str,
        name: &str,
        message: &str,
        mutate: impl FnOnce(&mut PackageConfig),
    ) -> Result<Vec<Id>> {
        let package_id = self
            .catalog
            .find_package_id(packager, name)
            .ok_or_else(|| anyhow::anyhow!("no {packager} package named {name}"))?;

        let mut config = self
            .catalog
            .get_package_by_id(package_id)
            .expect("just looked up by id")
            .config;
        mutate(&mut config);
        self.catalog.update_package_config(package_id, config)?;

        let info = self.catalog.get_package_by_id(package_id).expect("just updated");
        let mut rescheduled = Vec::new();
        for slot in &info.slots {
            if let Some(revision_id) = self.catalog.latest_revision_for_slot(slot.id) {
                let rebuilt = self.catalog.schedule_rebuild(revision_id, message)?;
                self.record_scheduled(rebuilt, message)?;
                rescheduled.push(rebuilt);
            }
        }
        Ok(rescheduled)
    }

    // ---- pkgapp -------------------------------------------------------------

    /// `pkgapp`: make sure every one of the app's locked dependencies has
    /// a scheduled build, then (unless scoped down by `opts`) generate
    /// and build the app's own `.deb` and publish it.
    pub fn pkgapp(
        &self,
        app: &AppSpec,
        integrator: &dyn AppIntegrator,
        opts: PkgAppOptions,
    ) -> Result<PkgAppOutcome, BuildFail> {
        if opts.parse_only {
            return Ok(PkgAppOutcome::ParsedOnly);
        }

        let scheduled = integrator
            .schedule_dep_builds(&self.catalog, app)
            .map_err(|e| BuildFail::Internal { detail: e.to_string() })?;
        for &revision_id in &scheduled {
            let _ = self.record_scheduled(revision_id, "Update to version used in application");
        }
        if opts.schedule_dep_builds_only {
            return Ok(PkgAppOutcome::DepsScheduled(scheduled));
        }

        self.build_and_publish_app(app, integrator)?;
        Ok(PkgAppOutcome::Built)
    }

    fn build_and_publish_app(&self, app: &AppSpec, integrator: &dyn AppIntegrator) -> Result<(), BuildFail> {
        let to_fail = |tool: &str, err: anyhow::Error| BuildFail::ToolChain {
            tool: tool.to_string(),
            detail: err.to_string(),
        };

        let work_dir = tempfile::tempdir().map_err(|e| BuildFail::Internal { detail: e.to_string() })?;
        let pkg_dir = work_dir.path().join(format!("{}-{}", app.name, app.version));
        let debian_dir = pkg_dir.join("debian");
        fs::create_dir_all(debian_dir.join("source")).map_err(|e| BuildFail::Internal {
            detail: format!("creating package tree at {}: {e}", pkg_dir.display()),
        })?;

        write_app_file(&debian_dir.join("source/format"), "3.0 (quilt)\n")?;
        write_app_file(&debian_dir.join("compat"), "9\n")?;
        write_app_file(
            &debian_dir.join("copyright"),
            &format!(
                "Format: https://www.debian.org/doc/packaging-manuals/copyright-format/1.0/\nUpstream-Name: {}\n",
                app.name
            ),
        )?;

        let entry = ChangelogEntry {
            revision_version: format!("{}-1", app.version),
            changelog: "Application build".to_string(),
            distribution: self.config.distribution.clone(),
            scheduled_at: Utc::now(),
        };
        write_app_file(
            &debian_dir.join("changelog"),
            &changelog::render(&app.name, &self.config.maintainer, &[entry]),
        )?;

        let records = integrator
            .emit(&self.catalog, app)
            .map_err(|e| BuildFail::Internal { detail: e.to_string() })?;
        let tree = DebianTree::materialize(records);

        write_app_file(&debian_dir.join("control"), &tree.format_control(&app.name, &self.config.maintainer))?;
        write_app_file(&debian_dir.join("rules"), &tree.format_rules())?;
        set_app_file_executable(&debian_dir.join("rules"))?;

        for pkg in &tree.packages {
            if let Some(manifest) = tree.format_install_manifest(pkg) {
                write_app_file(&debian_dir.join(format!("{}.install", pkg.name)), &manifest)?;
            }
            if let Some(manifest) = tree.format_links_manifest(pkg) {
                write_app_file(&debian_dir.join(format!("{}.links", pkg.name)), &manifest)?;
            }
            for (name, _dest, content, mode) in &pkg.content_files {
                let path = debian_dir.join(name);
                write_app_file(&path, content)?;
                if *mode & 0o111 != 0 {
                    set_app_file_executable(&path)?;
                }
            }
        }

        let parent = pkg_dir.parent().unwrap_or(&pkg_dir).to_path_buf();
        let pkg_dir_str = pkg_dir.to_string_lossy().into_owned();
        run_dpkg_source(&["-b", &pkg_dir_str], &parent)
            .and_then(|r| r.ok().map(|_| ()))
            .map_err(|e| to_fail("dpkg-source", e))?;

        let dsc = parent.join(format!("{}_{}.dsc", app.name, app.version));
        let keyid_flag = format!("--keyid={}", self.config.keyid);
        let maintainer_flag = format!("--maintainer={}", self.config.maintainer);
        let dist_flag = format!("--dist={}", self.config.distribution);
        let dsc_str = dsc.to_string_lossy().to_string();
        run_sbuild(&[&dist_flag, &keyid_flag, &maintainer_flag, &dsc_str], &parent)
            .and_then(|r| r.ok().map(|_| ()))
            .map_err(|e| to_fail("sbuild", e))?;

        self.publish("app")
    }

    // ---- rebuild ------------------------------------------------------------

    /// `rebuild MESSAGE [ID ...]`: reschedule a fixed list of revisions.
    pub fn rebuild_explicit(&self, revision_ids: &[Id], message: &str) -> Result<Vec<Id>> {
        let mut rescheduled = Vec::with_capacity(revision_ids.len());
        for &id in revision_ids {
            let rebuilt = self.catalog.schedule_rebuild(id, message)?;
            self.record_scheduled(rebuilt, message)?;
            rescheduled.push(rebuilt);
        }
        Ok(rescheduled)
    }

    /// `rebuild --format-sweep MESSAGE`: reschedule every version whose
    /// stored `gem_format` predates the configured one, then mark it
    /// current so a second sweep with the same config is a no-op.
    pub fn rebuild_outdated_format(&self, message: &str) -> Result<Vec<Id>> {
        let mut rescheduled = Vec::new();
        for version_id in self.catalog.outdated_version_ids(self.config.gem_format) {
            if let Some(revision_id) = self.catalog.latest_revision_for_version(version_id) {
                let rebuilt = self.catalog.schedule_rebuild(revision_id, message)?;
                self.record_scheduled(rebuilt, message)?;
                rescheduled.push(rebuilt);
            }
            self.catalog.set_version_gem_format(version_id, self.config.gem_format)?;
        }
        Ok(rescheduled)
    }

    // ---- publish ------------------------------------------------------------

    /// Republish the apt repository for one package kind (`gem`, `app`,
    /// or `npm`), signing the index with the configured key.
    pub fn publish(&self, kind: &str) -> Result<(), BuildFail> {
        let repo_dir = self.repo_dir(kind);
        pipeline::publish(&repo_dir, &self.config.keyid)
    }

    // ---- info ---------------------------------------------------------------

    /// `info packager name`: the package → slot → version → revision
    /// subtree, formatted top to bottom.
    pub fn info(&self, packager: &str, name: &str) -> Result<String> {
        let package: PackageInfo = self
            .catalog
            .package_info(packager, name, None)?
            .ok_or_else(|| anyhow::anyhow!("no {packager} package named {name}"))?;

        let mut out = String::new();
        writeln!(out, "{} ({})", package.name, package.os_name).ok();
        for slot in &package.slots {
            writeln!(out, "  slot {} -> {}", slot.key.join("."), slot.os_name).ok();
            for version in self.catalog.slot_versions(slot.id) {
                let populated = if version.populated { "" } else { " (not yet populated)" };
                writeln!(out, "    version {}{}", version.version, populated).ok();
                for revision in &version.revisions {
                    let status = revision
                        .result
                        .map(|r| r.to_string())
                        .unwrap_or_else(|| "pending".to_string());
                    writeln!(
                        out,
                        "      revision {} [{}] {} - {}",
                        revision.revision_version, revision.distribution, status, revision.changelog
                    )
                    .ok();
                }
            }
        }
        Ok(out)
    }

    // ---- serve --------------------------------------------------------------

    /// `serve`: a blocking HTTP loop dispatching
    /// `POST /debler/updatetrigger/<packager>` against the catalog.
    pub fn serve(&self, host: &str, port: u16, packager_configs: BTreeMap<String, PackagerWebhookConfig>) -> Result<()> {
        let address = format!("{host}:{port}");
        let server = tiny_http::Server::http(&address)
            .map_err(|e| anyhow::anyhow!("binding webhook listener to {address}: {e}"))?;

        for request in server.incoming_requests() {
            if let Err(err) = self.handle_webhook_request(request, &packager_configs) {
                eprintln!("webhook request failed: {err:#}");
            }
        }
        Ok(())
    }

    fn handle_webhook_request(
        &self,
        mut request: tiny_http::Request,
        packager_configs: &BTreeMap<String, PackagerWebhookConfig>,
    ) -> Result<()> {
        let packager = match request.url().strip_prefix("/debler/updatetrigger/") {
            Some(p) => p.to_string(),
            None => return request.respond(tiny_http::Response::empty(404)).map_err(Into::into),
        };

        let config = match packager_configs.get(&packager) {
            Some(c) => c.clone(),
            None => return request.respond(tiny_http::Response::empty(404)).map_err(Into::into),
        };

        let content_type = header_value(request.headers(), "Content-Type");
        let content_length = request
            .body_length()
            .map(|n| n as u64)
            .or_else(|| header_value(request.headers(), "Content-Length").and_then(|v| v.parse().ok()));
        let authorization = header_value(request.headers(), "Authorization");

        let mut body = Vec::new();
        request
            .as_reader()
            .take(MAX_BODY_BYTES + 1)
            .read_to_end(&mut body)
            .context("reading webhook request body")?;

        let notification = match validate_request(
            content_type.as_deref(),
            content_length,
            &body,
            authorization.as_deref(),
            &config,
        ) {
            Ok(n) => n,
            Err(err) => return request.respond(tiny_http::Response::empty(err.status_code())).map_err(Into::into),
        };

        let scheduler = CatalogReleaseScheduler {
            catalog: &self.catalog,
            packager: packager.clone(),
            distribution: self.config.distribution.clone(),
        };
        let outcome = scheduler.dispatch(&notification)?;

        if let (DispatchOutcome::Scheduled { slot }, Some(hook)) = (&outcome, &config.hook_command) {
            let command = substitute_placeholders(hook, &notification.name, slot, &notification.version);
            let _ = run_hook_command(&command);
            let mut events = EventLog::new();
            events.record(RevisionEvent {
                timestamp: Utc::now(),
                revision: format!("{slot}@{}-1", notification.version),
                kind: RevisionEventKind::Scheduled { reason: "New upstream release".to_string() },
            });
            let _ = events.write_to_file(&events_path(&self.state_dir));
        }

        request.respond(tiny_http::Response::empty(204)).map_err(Into::into)
    }
}

fn header_value(headers: &[tiny_http::Header], name: &str) -> Option<String> {
    headers
        .iter()
        .find(|h| h.field.as_str().as_str().eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str().to_string())
}

fn write_app_file(path: &Path, contents: &str) -> Result<(), BuildFail> {
    fs::write(path, contents).map_err(|e| BuildFail::Internal {
        detail: format!("writing {}: {e}", path.display()),
    })
}

#[cfg(unix)]
fn set_app_file_executable(path: &Path) -> Result<(), BuildFail> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)
        .map_err(|e| BuildFail::Internal { detail: format!("stat {}: {e}", path.display()) })?
        .permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)
        .map_err(|e| BuildFail::Internal { detail: format!("chmod {}: {e}", path.display()) })
}

#[cfg(not(unix))]
fn set_app_file_executable(_path: &Path) -> Result<(), BuildFail> {
    Ok(())
}

/// Resolves a webhook notification against one packager's slice of the
/// catalog. Kept decoupled from `debler-webhook` itself (which defines
/// only the trait) so that crate stays unit-testable without a real
/// catalog.
pub struct CatalogReleaseScheduler<'a> {
    pub catalog: &'a Catalog,
    pub packager: String,
    pub distribution: Distribution,
}

impl<'a> ReleaseScheduler for CatalogReleaseScheduler<'a> {
    fn dispatch(&self, notification: &ReleaseNotification) -> anyhow::Result<DispatchOutcome> {
        let Some(package) = self.catalog.package_info(&self.packager, &notification.name, None)? else {
            return Ok(DispatchOutcome::UnknownPackage);
        };

        let Some(slot_id) = self.catalog.slot_for_version(package.id, &notification.version, false)? else {
            return Ok(DispatchOutcome::NoMatchingSlot);
        };

        if self.catalog.version_exists(slot_id, &notification.version) {
            return Ok(DispatchOutcome::AlreadyScheduled);
        }

        let slot = package
            .slots
            .iter()
            .find(|s| s.id == slot_id)
            .expect("slot_for_version just returned this id");

        let changelog = if self.catalog.slot_has_versions(slot_id) {
            "Update to version used in application"
        } else {
            "New upstream release"
        };
        let revision_version = format!("{}-1", notification.version);
        self.catalog.schedule_build(
            slot_id,
            &notification.version,
            &revision_version,
            changelog,
            self.distribution.clone(),
            None,
        )?;

        Ok(DispatchOutcome::Scheduled { slot: slot.os_name.clone() })
    }
}

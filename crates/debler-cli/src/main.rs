use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use debler::app::{AppSpec, BundlerAppIntegrator};
use debler::config::load_config;
use debler::ecosystem::{gem::gem2deb, npm::npm2deb};
use debler::engine::{BuildOptions, Engine, PkgAppOptions, PkgAppOutcome};
use debler::scheduler::SelectionMode;
use debler::webhook::PackagerWebhookConfig;

mod progress;

#[derive(Parser, Debug)]
#[command(name = "debler", version)]
#[command(about = "Repackages RubyGems and npm/yarn packages (and first-party apps on top of them) as native Debian packages")]
struct Cli {
    /// Override `$DEBLER_HOME` (defaults to `~/.debler`).
    #[arg(long, global = true)]
    debler_home: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive the build scheduler over pending (or failed/explicit) revisions.
    #[command(visible_aliases = ["b", "work"])]
    Build {
        #[arg(long, short = 'F')]
        fail_fast: bool,
        /// Select failed revisions instead of pending ones.
        #[arg(long, short = 'R')]
        retry: bool,
        /// Build at most N revisions.
        #[arg(long = "limit", short = 'L', value_name = "N")]
        limit: Option<usize>,
        /// Run the build without touching the catalog (no claim, no finalize).
        #[arg(long)]
        incognito: bool,
        /// Mark the selected revisions canceled instead of building them.
        #[arg(long)]
        cancel: bool,
        /// Print the selected revision ids and exit without building.
        #[arg(long = "list-only")]
        list_only: bool,
        /// Build exactly these revision ids instead of pending/failed ones.
        #[arg(long = "id", value_name = "REVISION_ID")]
        ids: Vec<u64>,
    },
    /// Configure or schedule RubyGems (`bundler` packager) packages.
    Gem(PackageArgs),
    /// Configure or schedule npm/yarn (`yarn` packager) packages.
    Pkg(PackageArgs),
    /// Process an app description, schedule dependency builds, and
    /// optionally build and publish the app itself.
    Pkgapp {
        /// Path to the app's YAML description file.
        app_info: PathBuf,
        /// Only schedule builds for the app's dependencies.
        #[arg(long = "schedule-dep-builds-only", short = 'D')]
        schedule_dep_builds_only: bool,
        /// Only parse the description; do not schedule or build anything.
        #[arg(long = "parse-only", short = 'P')]
        parse_only: bool,
    },
    /// Reschedule revisions: either explicit ids, or every version whose
    /// stored gem format predates the configured one.
    Rebuild {
        /// Changelog message for the rescheduled revision(s).
        message: String,
        /// Explicit revision ids to reschedule. If empty, sweeps every
        /// version with an outdated `gem_format`.
        #[arg(value_name = "REVISION_ID")]
        ids: Vec<u64>,
    },
    /// Emit the signed apt repository indexes for one package kind.
    Publish {
        #[arg(value_enum)]
        kind: PublishKind,
    },
    /// Print a package's full subtree: slots, versions, and revisions.
    #[command(visible_alias = "i")]
    Info {
        /// `packager:name` pairs (e.g. `bundler:rails`).
        #[arg(value_name = "PACKAGER:NAME", required = true)]
        packages: Vec<String>,
    },
    /// Run the HTTP webhook endpoint that schedules builds on new
    /// upstream releases.
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        #[arg(long)]
        port: u16,
        /// Shell command run after a release is scheduled. `{gem}`,
        /// `{slot}`, `{version}` are substituted.
        #[arg(long)]
        hook: Option<String>,
    },
}

#[derive(clap::Args, Debug)]
struct PackageArgs {
    /// Add an extra upstream directory to the package and reschedule.
    #[arg(long = "add-dir", value_name = "DIR")]
    add_dir: Option<String>,
    /// Move built shared objects into this subdirectory and reschedule.
    #[arg(long = "so-subdir", value_name = "DIR")]
    so_subdir: Option<String>,
    /// Schedule `name:version` pairs as new builds instead of
    /// reconfiguring an existing package.
    #[arg(long)]
    schedule: bool,
    /// Package names (`--add-dir`/`--so-subdir`) or `name:version`
    /// pairs (`--schedule`).
    #[arg(required = true)]
    names: Vec<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PublishKind {
    Gems,
    Apps,
    Npm,
}

impl PublishKind {
    fn as_singular(self) -> &'static str {
        match self {
            PublishKind::Gems => "gem",
            PublishKind::Apps => "app",
            PublishKind::Npm => "npm",
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let debler_home = debler::auth::debler_home_path(cli.debler_home.as_deref());
    let config = load_config(&debler_home).context("loading configuration")?;
    let engine = Engine::open(config)?;

    match cli.cmd {
        Commands::Build { fail_fast, retry, limit, incognito, cancel, list_only, ids } => {
            run_build(&engine, fail_fast, retry, limit, incognito, cancel, list_only, ids)
        }
        Commands::Gem(args) => run_package_args(&engine, "bundler", gem2deb, args),
        Commands::Pkg(args) => run_package_args(&engine, "yarn", npm2deb, args),
        Commands::Pkgapp { app_info, schedule_dep_builds_only, parse_only } => {
            run_pkgapp(&engine, &app_info, schedule_dep_builds_only, parse_only)
        }
        Commands::Rebuild { message, ids } => run_rebuild(&engine, &message, &ids),
        Commands::Publish { kind } => run_publish(&engine, kind),
        Commands::Info { packages } => run_info(&engine, &packages),
        Commands::Serve { host, port, hook } => run_serve(&engine, &debler_home, &host, port, hook),
    }
}

fn run_build(
    engine: &Engine,
    fail_fast: bool,
    retry: bool,
    limit: Option<usize>,
    incognito: bool,
    cancel: bool,
    list_only: bool,
    ids: Vec<u64>,
) -> Result<ExitCode> {
    let mode = if !ids.is_empty() {
        SelectionMode::Explicit(ids)
    } else if retry {
        SelectionMode::Failed
    } else {
        SelectionMode::Pending
    };

    if list_only {
        for id in debler::scheduler::list_revisions(&engine.catalog, &mode) {
            println!("{id}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    if cancel {
        let ids = debler::scheduler::list_revisions(&engine.catalog, &mode);
        let canceled = debler::scheduler::cancel_revisions(&engine.catalog, &ids)?;
        println!("Canceled {} revisions", canceled.len());
        return Ok(ExitCode::SUCCESS);
    }

    let opts = BuildOptions { fail_fast, cancel: false, incognito, limit };
    let receipt = engine.build(mode, opts)?;
    banner(&receipt.summary_line(), if receipt.failed.is_empty() { 32 } else { 31 });

    Ok(if receipt.failed.is_empty() { ExitCode::SUCCESS } else { ExitCode::from(1) })
}

fn run_package_args(
    engine: &Engine,
    packager: &str,
    deb_name: fn(&str) -> String,
    args: PackageArgs,
) -> Result<ExitCode> {
    let exclusive = [args.add_dir.is_some(), args.so_subdir.is_some(), args.schedule].iter().filter(|b| **b).count();
    if exclusive != 1 {
        bail!("exactly one of --add-dir, --so-subdir, or --schedule is required");
    }

    if args.schedule {
        for pair in &args.names {
            let (name, version) = pair
                .split_once(':')
                .with_context(|| format!("expected name:version, got {pair}"))?;
            let os_name = deb_name(name);
            match engine.schedule_package_version(packager, name, &os_name, version)? {
                Some(revision_id) => println!("scheduled {name}:{version} as revision {revision_id}"),
                None => println!("{name}:{version} already scheduled"),
            }
        }
        return Ok(ExitCode::SUCCESS);
    }

    for name in &args.names {
        let rescheduled = if let Some(dir) = &args.add_dir {
            let message = format!("rebuild to include \"{dir}\" dir into package");
            let dir = dir.clone();
            engine.configure_package(packager, name, &message, move |config| {
                config.extra_dirs.push(dir);
            })?
        } else {
            let subdir = args.so_subdir.clone().expect("exclusivity checked above");
            let message = format!("rebuild to move so libs into \"{subdir}\" subdir");
            engine.configure_package(packager, name, &message, move |config| {
                config.so_subdir = Some(subdir);
            })?
        };
        println!("{name}: rescheduled {} revision(s)", rescheduled.len());
    }

    Ok(ExitCode::SUCCESS)
}

fn run_pkgapp(
    engine: &Engine,
    app_info: &PathBuf,
    schedule_dep_builds_only: bool,
    parse_only: bool,
) -> Result<ExitCode> {
    let app = AppSpec::from_yaml_file(app_info).context("parsing app description")?;
    let integrator = BundlerAppIntegrator {
        rubies: engine.config.rubies.clone(),
        distribution: engine.config.distribution.clone(),
    };
    let opts = PkgAppOptions { parse_only, schedule_dep_builds_only };

    match engine.pkgapp(&app, &integrator, opts) {
        Ok(PkgAppOutcome::ParsedOnly) => Ok(ExitCode::SUCCESS),
        Ok(PkgAppOutcome::DepsScheduled(ids)) => {
            println!("{} builds are scheduled", ids.len());
            Ok(ExitCode::SUCCESS)
        }
        Ok(PkgAppOutcome::Built) => {
            banner(&format!("built and published {}", app.name), 32);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            banner(&format!("pkgapp failed: {err}"), 31);
            Ok(ExitCode::from(5))
        }
    }
}

fn run_rebuild(engine: &Engine, message: &str, ids: &[u64]) -> Result<ExitCode> {
    let rescheduled = if ids.is_empty() {
        engine.rebuild_outdated_format(message)?
    } else {
        engine.rebuild_explicit(ids, message)?
    };
    println!("rescheduled {} revision(s)", rescheduled.len());
    Ok(ExitCode::SUCCESS)
}

fn run_publish(engine: &Engine, kind: PublishKind) -> Result<ExitCode> {
    match engine.publish(kind.as_singular()) {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            banner(&format!("publish failed: {err}"), 31);
            Ok(ExitCode::from(1))
        }
    }
}

fn run_info(engine: &Engine, packages: &[String]) -> Result<ExitCode> {
    for entry in packages {
        let (packager, name) = entry
            .split_once(':')
            .with_context(|| format!("expected packager:name, got {entry}"))?;
        print!("{}", engine.info(packager, name)?);
    }
    Ok(ExitCode::SUCCESS)
}

fn run_serve(engine: &Engine, debler_home: &std::path::Path, host: &str, port: u16, hook: Option<String>) -> Result<ExitCode> {
    let mut configs = BTreeMap::new();
    for packager in ["bundler", "yarn"] {
        let apikey = debler::auth::resolve_apikey(packager, None, Some(debler_home)).ok();
        configs.insert(
            packager.to_string(),
            PackagerWebhookConfig { apikey, hook_command: hook.clone() },
        );
    }

    engine.serve(host, port, configs)?;
    Ok(ExitCode::SUCCESS)
}

fn banner(message: &str, color: u8) {
    if progress::is_tty() {
        println!("\x1b[1;{color}m{message}\x1b[0m");
    } else {
        println!("{message}");
    }
}

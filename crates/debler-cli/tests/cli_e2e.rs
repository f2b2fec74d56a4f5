use std::path::Path;

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::{tempdir, TempDir};

fn debler_home() -> TempDir {
    let home = tempdir().expect("tempdir");
    write_config(home.path());
    home
}

fn write_config(home: &Path) {
    let yaml = format!(
        r#"
database: {db}
appdir: {app}
gemdir: {gem}
npmdir: {npm}
keyid: "0xDEADBEEF"
maintainer: "Debler Autobuilder <debler@example.org>"
distribution: unstable
"#,
        db = home.join("catalog.json").display(),
        app = home.join("apps").display(),
        gem = home.join("gems").display(),
        npm = home.join("npm").display(),
    );
    std::fs::write(home.join("config.yaml"), yaml).expect("write config.yaml");
}

#[test]
fn bare_invocation_prints_usage_and_fails() {
    Command::cargo_bin("debler-cli")
        .unwrap()
        .assert()
        .failure()
        .stderr(contains("Usage"));
}

#[test]
fn help_lists_every_command() {
    Command::cargo_bin("debler-cli")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("build"))
        .stdout(contains("gem"))
        .stdout(contains("pkg"))
        .stdout(contains("pkgapp"))
        .stdout(contains("rebuild"))
        .stdout(contains("publish"))
        .stdout(contains("info"))
        .stdout(contains("serve"));
}

#[test]
fn version_flag_reports_crate_version() {
    Command::cargo_bin("debler-cli")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn gem_requires_exactly_one_of_its_mode_flags() {
    let home = debler_home();
    Command::cargo_bin("debler-cli")
        .unwrap()
        .env("DEBLER_HOME", home.path())
        .args(["gem", "rails"])
        .assert()
        .failure()
        .stderr(contains("exactly one of"));
}

#[test]
fn gem_schedule_rejects_a_bare_name_without_a_version() {
    let home = debler_home();
    Command::cargo_bin("debler-cli")
        .unwrap()
        .env("DEBLER_HOME", home.path())
        .args(["gem", "--schedule", "rails"])
        .assert()
        .failure()
        .stderr(contains("name:version"));
}

#[test]
fn gem_schedule_then_info_reports_the_new_package() {
    let home = debler_home();
    Command::cargo_bin("debler-cli")
        .unwrap()
        .env("DEBLER_HOME", home.path())
        .args(["gem", "--schedule", "rails:7.0.4"])
        .assert()
        .success()
        .stdout(contains("scheduled rails:7.0.4"));

    Command::cargo_bin("debler-cli")
        .unwrap()
        .env("DEBLER_HOME", home.path())
        .args(["info", "bundler:rails"])
        .assert()
        .success()
        .stdout(contains("version 7.0.4"))
        .stdout(contains("7.0.4-1"));
}

#[test]
fn gem_schedule_is_idempotent_for_the_same_version() {
    let home = debler_home();
    let mut schedule = || {
        Command::cargo_bin("debler-cli")
            .unwrap()
            .env("DEBLER_HOME", home.path())
            .args(["gem", "--schedule", "rails:7.0.4"])
            .output()
            .expect("run debler-cli")
    };
    let first = schedule();
    let second = schedule();
    assert!(String::from_utf8_lossy(&first.stdout).contains("scheduled"));
    assert!(String::from_utf8_lossy(&second.stdout).contains("already scheduled"));
}

#[test]
fn info_requires_packager_colon_name() {
    let home = debler_home();
    Command::cargo_bin("debler-cli")
        .unwrap()
        .env("DEBLER_HOME", home.path())
        .args(["info", "rails"])
        .assert()
        .failure()
        .stderr(contains("packager:name"));
}

#[test]
fn info_reports_an_unknown_package_as_an_error() {
    let home = debler_home();
    Command::cargo_bin("debler-cli")
        .unwrap()
        .env("DEBLER_HOME", home.path())
        .args(["info", "bundler:nonexistent"])
        .assert()
        .failure();
}

#[test]
fn publish_rejects_an_unknown_kind() {
    let home = debler_home();
    Command::cargo_bin("debler-cli")
        .unwrap()
        .env("DEBLER_HOME", home.path())
        .args(["publish", "widgets"])
        .assert()
        .failure();
}

#[test]
fn build_list_only_prints_nothing_against_an_empty_catalog() {
    let home = debler_home();
    Command::cargo_bin("debler-cli")
        .unwrap()
        .env("DEBLER_HOME", home.path())
        .args(["build", "--list-only"])
        .assert()
        .success()
        .stdout("");
}

#[test]
fn rebuild_format_sweep_against_an_empty_catalog_reschedules_nothing() {
    let home = debler_home();
    Command::cargo_bin("debler-cli")
        .unwrap()
        .env("DEBLER_HOME", home.path())
        .args(["rebuild", "sweep for new gem format"])
        .assert()
        .success()
        .stdout(contains("rescheduled 0 revision(s)"));
}

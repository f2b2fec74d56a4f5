//! End-to-end scenario for `serve`: start the webhook listener as a
//! background process, POST a release notification at it, and confirm
//! the catalog picked up a new scheduled revision.

use std::fs;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use assert_cmd::cargo::cargo_bin;
use tempfile::tempdir;

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
    fs::write(home.join("config.yaml"), yaml).expect("write config.yaml");
}

struct ServerGuard(Child);

impl Drop for ServerGuard {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn wait_for_port(port: u16) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if TcpStream::connect(("127.0.0.1", port)).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    panic!("webhook server never started listening on port {port}");
}

fn post_release(port: u16, name: &str, version: &str) -> String {
    let body = format!(r#"{{"name":"{name}","version":"{version}"}}"#);
    let request = format!(
        "POST /debler/updatetrigger/bundler HTTP/1.1\r\n\
         Host: 127.0.0.1\r\n\
         Content-Type: application/json\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {body}",
        body.len()
    );

    let mut stream = TcpStream::connect(("127.0.0.1", port)).expect("connect to webhook server");
    stream.write_all(request.as_bytes()).expect("send request");
    let mut response = String::new();
    stream.read_to_string(&mut response).expect("read response");
    response
}

#[test]
fn serve_schedules_a_build_for_an_already_tracked_package() {
    let home = tempdir().expect("tempdir");
    write_config(home.path());
    let port = 18_787u16;

    // Register the package ahead of time via `gem --schedule`, so the
    // webhook has a slot to match the new release against.
    let status = Command::new(cargo_bin("debler-cli"))
        .env("DEBLER_HOME", home.path())
        .args(["gem", "--schedule", "rails:7.0.4"])
        .status()
        .expect("run gem --schedule");
    assert!(status.success());

    let child = Command::new(cargo_bin("debler-cli"))
        .env("DEBLER_HOME", home.path())
        .args(["serve", "--host", "127.0.0.1", "--port", &port.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn debler-cli serve");
    let _guard = ServerGuard(child);
    wait_for_port(port);

    let response = post_release(port, "rails", "7.1.0");
    assert!(response.starts_with("HTTP/1.1 204"), "unexpected response: {response}");

    let info = Command::new(cargo_bin("debler-cli"))
        .env("DEBLER_HOME", home.path())
        .args(["info", "bundler:rails"])
        .output()
        .expect("run info");
    let stdout = String::from_utf8_lossy(&info.stdout);
    assert!(stdout.contains("version 7.1.0"), "info output was:\n{stdout}");
}

#[test]
fn serve_returns_not_found_for_an_unknown_packager_path() {
    let home = tempdir().expect("tempdir");
    write_config(home.path());
    let port = 18_788u16;

    let child = Command::new(cargo_bin("debler-cli"))
        .env("DEBLER_HOME", home.path())
        .args(["serve", "--host", "127.0.0.1", "--port", &port.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn debler-cli serve");
    let _guard = ServerGuard(child);
    wait_for_port(port);

    let request = "POST /debler/updatetrigger/unknown HTTP/1.1\r\n\
         Host: 127.0.0.1\r\n\
         Content-Type: application/json\r\n\
         Content-Length: 2\r\n\
         Connection: close\r\n\
         \r\n\
         {}";
    let mut stream = TcpStream::connect(("127.0.0.1", port)).expect("connect");
    stream.write_all(request.as_bytes()).expect("send");
    let mut response = String::new();
    stream.read_to_string(&mut response).expect("read");
    assert!(response.starts_with("HTTP/1.1 404"), "unexpected response: {response}");
}

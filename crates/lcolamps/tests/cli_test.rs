#![allow(clippy::unwrap_used)]
// End-to-end CLI tests against the built binary.

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;

const CONFIG: &str = r#"
    [m2]
    host = "127.0.0.1"
    port = 1

    [[lamps]]
    name = "TCS"
    backend = "m2"
    m2_name = "TCS"
    relay = 1
"#;

fn config_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn help_lists_the_subcommands() {
    Command::cargo_bin("lcolamps")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("on"))
        .stdout(predicate::str::contains("off"));
}

#[test]
fn status_with_unreachable_backend_reports_unknown() {
    // Port 1 refuses immediately; refresh degrades to cached states.
    let file = config_file(CONFIG);

    Command::cargo_bin("lcolamps")
        .unwrap()
        .args(["--config", &file.path().display().to_string()])
        .args(["--output", "plain", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("TCS UNKNOWN"));
}

#[test]
fn on_without_lamps_or_all_is_a_usage_error() {
    let file = config_file(CONFIG);

    Command::cargo_bin("lcolamps")
        .unwrap()
        .args(["--config", &file.path().display().to_string(), "on"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn invalid_config_is_rejected_with_a_diagnostic() {
    // Lamp names a backend with no matching section.
    let file = config_file(
        r#"
        [[lamps]]
        name = "TCS"
        backend = "m2"
        m2_name = "TCS"
        relay = 1
        "#,
    );

    Command::cargo_bin("lcolamps")
        .unwrap()
        .args(["--config", &file.path().display().to_string(), "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no [m2] section"));
}

#[test]
fn unknown_lamp_exits_with_not_found() {
    let file = config_file(CONFIG);

    Command::cargo_bin("lcolamps")
        .unwrap()
        .args(["--config", &file.path().display().to_string()])
        .args(["off", "ghost"])
        .assert()
        .failure()
        .code(4)
        .stderr(predicate::str::contains("ghost"));
}

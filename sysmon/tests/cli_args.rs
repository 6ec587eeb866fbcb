//! CLI tests for the sysmon binary.
use assert_cmd::Command;
use std::io::Write;
use tempfile::NamedTempFile;

fn sysmon() -> Command {
    let mut cmd = Command::cargo_bin("sysmon").expect("sysmon binary");
    // keep the user's own config out of the picture
    cmd.env("XDG_CONFIG_HOME", std::env::temp_dir().join("sysmon-cli-tests"));
    cmd
}

fn stdout_of(out: &std::process::Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

#[test]
fn help_lists_subcommands() {
    let out = sysmon().arg("--help").output().expect("run sysmon --help");
    assert!(out.status.success());
    let text = stdout_of(&out);
    for word in ["processes", "network", "sftp", "--config"] {
        assert!(text.contains(word), "help missing {word}\n{text}");
    }
}

#[test]
fn sftp_help_lists_connection_flags() {
    let out = sysmon().args(["sftp", "--help"]).output().unwrap();
    assert!(out.status.success());
    let text = stdout_of(&out);
    for flag in ["--host", "--port", "--user", "--remote-dir"] {
        assert!(text.contains(flag), "sftp help missing {flag}\n{text}");
    }
}

#[test]
fn unknown_subcommand_fails() {
    let out = sysmon().arg("bogus").output().unwrap();
    assert!(!out.status.success());
}

#[test]
fn network_monitor_exits_on_zero() {
    let out = sysmon()
        .arg("network")
        .write_stdin("0\n")
        .timeout(std::time::Duration::from_secs(20))
        .output()
        .unwrap();
    assert!(out.status.success());
    assert!(stdout_of(&out).contains("1: scan port, 2: ping host, 3: traceroute => "));
}

#[test]
fn process_monitor_rejects_bad_selector() {
    let out = sysmon()
        .arg("processes")
        .write_stdin("9\n0\n")
        .timeout(std::time::Duration::from_secs(20))
        .output()
        .unwrap();
    assert!(out.status.success());
    let text = stdout_of(&out);
    assert!(text.contains("Invalid input. Please enter a valid option."));
    assert_eq!(text.matches("4: Find process => ").count(), 2);
}

#[test]
fn end_of_input_exits_the_monitor() {
    let out = sysmon()
        .arg("network")
        .write_stdin("")
        .timeout(std::time::Duration::from_secs(20))
        .output()
        .unwrap();
    assert!(out.status.success());
}

#[test]
fn malformed_config_is_reported() {
    let mut f = NamedTempFile::new().unwrap();
    write!(f, "not json").unwrap();
    let out = sysmon()
        .arg("--config")
        .arg(f.path())
        .arg("network")
        .write_stdin("0\n")
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("parsing config"));
}

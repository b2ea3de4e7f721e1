use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

#[allow(deprecated)]
fn get_grantkeeper_bin() -> PathBuf {
    assert_cmd::cargo::cargo_bin("grantkeeper")
}

#[test]
fn test_completion_command_help() {
    let mut cmd = Command::new(get_grantkeeper_bin());
    cmd.arg("completion").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Generate shell completion scripts"))
        .stdout(predicate::str::contains("SUPPORTED SHELLS"))
        .stdout(predicate::str::contains("~/.bashrc"));
}

#[test]
fn test_completion_bash_generates_script() {
    let mut cmd = Command::new(get_grantkeeper_bin());
    cmd.arg("completion").arg("--shell").arg("bash");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("_grantkeeper()"))
        .stdout(predicate::str::contains("ingest"));
}

#[test]
fn test_completion_zsh_generates_script() {
    let mut cmd = Command::new(get_grantkeeper_bin());
    cmd.arg("completion").arg("--shell").arg("zsh");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("#compdef grantkeeper"));
}

#[test]
fn test_completion_invalid_shell() {
    let mut cmd = Command::new(get_grantkeeper_bin());
    cmd.arg("completion").arg("--shell").arg("invalid-shell");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_write_completions_to_buffer() {
    let mut cmd = clap::Command::new("grantkeeper").subcommand(clap::Command::new("stats"));
    let mut buffer = Vec::new();

    grantkeeper_cli::commands::completion::write_completions(
        clap_complete::Shell::Fish,
        &mut cmd,
        &mut buffer,
    );

    let script = String::from_utf8(buffer).unwrap();
    assert!(script.contains("complete -c grantkeeper"));
}

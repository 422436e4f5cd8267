//! Behavioural smoke tests for the CLI entrypoint.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn cli_without_arguments_prints_help_and_fails() {
    let mut cmd = cargo_bin_cmd!("kiln");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn build_without_credentials_reports_configuration_errors() {
    let scratch = tempfile::tempdir().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let mut cmd = cargo_bin_cmd!("kiln");
    cmd.current_dir(scratch.path())
        .env_remove("KILN_USERNAME")
        .env_remove("KILN_API_KEY")
        .env_remove("KILN_IMAGE_NAME")
        .arg("build");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("configuration error"));
}

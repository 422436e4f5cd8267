//! Tests for configuration resolution and duration parsing.

use std::time::Duration;

use rstest::rstest;

use super::*;
use crate::client::{BaseImage, Sizing};
use crate::comms::{Communicator, CommunicatorKind};

fn valid_config() -> BuildConfig {
    BuildConfig {
        username: Some(String::from("acct")),
        api_key: Some(String::from("key")),
        image_name: Some(String::from("baked-image")),
        base_os_code: Some(String::from("UBUNTU_LATEST")),
        instance_flavor: Some(String::from("B1_2X8X25")),
        ..BuildConfig::default()
    }
}

fn issues_of(err: ConfigError) -> Vec<String> {
    match err {
        ConfigError::Invalid { issues } => issues,
        ConfigError::Load(message) => panic!("unexpected load error: {message}"),
    }
}

#[test]
fn resolve_populates_defaults() {
    let profile = valid_config()
        .resolve()
        .unwrap_or_else(|err| panic!("resolve: {err}"));

    assert_eq!(profile.datacenter_name, "ams01");
    assert_eq!(profile.instance_domain, "defaultdomain.com");
    assert_eq!(profile.network_speed, 10);
    assert_eq!(profile.state_timeout, Duration::from_secs(600));
    assert_eq!(profile.poll_interval, Duration::from_secs(5));
    assert!(profile.instance_name.starts_with("kiln-"));
    assert_eq!(profile.communicator.kind(), CommunicatorKind::Ssh);
    match &profile.communicator {
        Communicator::Ssh(settings) => {
            assert_eq!(settings.username, "root");
            assert_eq!(settings.port, 22);
        }
        Communicator::WinRm(_) => panic!("expected ssh communicator"),
    }
}

#[test]
fn resolve_maps_selectors_into_enums() {
    let profile = valid_config()
        .resolve()
        .unwrap_or_else(|err| panic!("resolve: {err}"));

    assert_eq!(
        profile.base_image,
        BaseImage::OsCode(String::from("UBUNTU_LATEST"))
    );
    assert_eq!(profile.sizing, Sizing::Flavor(String::from("B1_2X8X25")));
}

#[test]
fn resolve_accepts_explicit_sizing_triple() {
    let config = BuildConfig {
        instance_flavor: None,
        instance_cpu: Some(2),
        instance_memory: Some(4096),
        instance_disk_capacity: Some(25),
        ..valid_config()
    };
    let profile = config
        .resolve()
        .unwrap_or_else(|err| panic!("resolve: {err}"));
    assert_eq!(
        profile.sizing,
        Sizing::Custom {
            cpus: 2,
            memory_mb: 4096,
            disk_gb: 25,
        }
    );
}

#[test]
fn flavor_and_explicit_sizing_are_mutually_exclusive() {
    let config = BuildConfig {
        instance_cpu: Some(2),
        instance_memory: Some(4096),
        instance_disk_capacity: Some(25),
        ..valid_config()
    };
    let issues = issues_of(config.resolve().expect_err("conflicting sizing"));
    assert!(
        issues.iter().any(|issue| issue.contains("instance_flavor")),
        "issues: {issues:?}"
    );
}

#[test]
fn partial_explicit_sizing_is_rejected() {
    let config = BuildConfig {
        instance_flavor: None,
        instance_cpu: Some(2),
        ..valid_config()
    };
    let issues = issues_of(config.resolve().expect_err("partial sizing"));
    assert!(
        issues.iter().any(|issue| issue.contains("together")),
        "issues: {issues:?}"
    );
}

#[test]
fn base_image_selectors_are_mutually_exclusive() {
    let config = BuildConfig {
        base_image_id: Some(String::from("img-1")),
        ..valid_config()
    };
    let issues = issues_of(config.resolve().expect_err("conflicting base image"));
    assert!(
        issues
            .iter()
            .any(|issue| issue.contains("only one of base_image_id or base_os_code")),
        "issues: {issues:?}"
    );
}

#[test]
fn missing_base_image_selector_is_rejected() {
    let config = BuildConfig {
        base_os_code: None,
        ..valid_config()
    };
    let issues = issues_of(config.resolve().expect_err("missing base image"));
    assert!(
        issues
            .iter()
            .any(|issue| issue.contains("base_image_id or base_os_code")),
        "issues: {issues:?}"
    );
}

#[test]
fn all_problems_are_reported_at_once() {
    let config = BuildConfig {
        username: None,
        api_key: None,
        image_name: None,
        base_os_code: None,
        instance_flavor: None,
        image_type: Some(String::from("flex")),
        instance_state_timeout: Some(String::from("soon")),
        communicator: Some(String::from("telnet")),
        ..BuildConfig::default()
    };
    let issues = issues_of(config.resolve().expect_err("many problems"));
    assert!(issues.len() >= 6, "expected aggregation, got: {issues:?}");
}

#[test]
fn unknown_image_type_is_rejected() {
    let config = BuildConfig {
        image_type: Some(String::from("flex")),
        ..valid_config()
    };
    let issues = issues_of(config.resolve().expect_err("bad image type"));
    assert!(
        issues.iter().any(|issue| issue.contains("image_type")),
        "issues: {issues:?}"
    );
}

#[test]
fn unsupported_communicator_is_rejected() {
    let config = BuildConfig {
        communicator: Some(String::from("telnet")),
        ..valid_config()
    };
    let issues = issues_of(config.resolve().expect_err("bad communicator"));
    assert!(
        issues
            .iter()
            .any(|issue| issue.contains("unsupported communicator")),
        "issues: {issues:?}"
    );
}

#[test]
fn winrm_requires_password() {
    let config = BuildConfig {
        communicator: Some(String::from("winrm")),
        ..valid_config()
    };
    let issues = issues_of(config.resolve().expect_err("missing password"));
    assert!(
        issues.iter().any(|issue| issue.contains("winrm_password")),
        "issues: {issues:?}"
    );
}

#[test]
fn winrm_defaults_apply() {
    let config = BuildConfig {
        communicator: Some(String::from("winrm")),
        winrm_password: Some(String::from("hunter2")),
        ..valid_config()
    };
    let profile = config
        .resolve()
        .unwrap_or_else(|err| panic!("resolve: {err}"));
    match &profile.communicator {
        Communicator::WinRm(settings) => {
            assert_eq!(settings.username, "Administrator");
            assert_eq!(settings.port, 5985);
        }
        Communicator::Ssh(_) => panic!("expected winrm communicator"),
    }
}

#[test]
fn unparseable_timeout_is_reported() {
    let config = BuildConfig {
        instance_state_timeout: Some(String::from("soon")),
        ..valid_config()
    };
    let issues = issues_of(config.resolve().expect_err("bad timeout"));
    assert!(
        issues
            .iter()
            .any(|issue| issue.contains("instance_state_timeout")),
        "issues: {issues:?}"
    );
}

#[rstest]
#[case("10m", Duration::from_secs(600))]
#[case("90s", Duration::from_secs(90))]
#[case("1h30m", Duration::from_secs(5400))]
#[case("50ms", Duration::from_millis(50))]
#[case("2h", Duration::from_secs(7200))]
#[case(" 5s ", Duration::from_secs(5))]
fn parse_duration_accepts_compound_values(#[case] input: &str, #[case] expected: Duration) {
    let parsed = parse_duration(input).unwrap_or_else(|err| panic!("parse {input}: {err}"));
    assert_eq!(parsed, expected);
}

#[rstest]
#[case("")]
#[case("10")]
#[case("10x")]
#[case("m")]
#[case("0s")]
fn parse_duration_rejects_invalid_values(#[case] input: &str) {
    assert!(parse_duration(input).is_err(), "should reject `{input}`");
}

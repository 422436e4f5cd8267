//! Sequence selection tests.

use crate::build::select_sequence;
use crate::build::step::Step;
use crate::test_support::{ssh_profile, winrm_profile};

fn names(profile: &crate::config::BuildProfile) -> Vec<&'static str> {
    select_sequence(profile)
        .iter()
        .map(|step| step.name())
        .collect()
}

#[test]
fn key_based_path_provisions_credentials_first() {
    assert_eq!(
        names(&ssh_profile()),
        vec![
            "create_ssh_key",
            "create_instance",
            "wait_for_instance",
            "grab_public_ip",
            "connect",
            "provision",
            "capture_image",
        ]
    );
}

#[test]
fn password_based_path_waits_again_after_connecting() {
    assert_eq!(
        names(&winrm_profile()),
        vec![
            "create_instance",
            "wait_for_instance",
            "grab_public_ip",
            "connect",
            "wait_for_instance",
            "provision",
            "capture_image",
        ]
    );
}

//! End-to-end build scenarios driven through the builder façade against a
//! scripted provider client.

use std::sync::Arc;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;

use kiln::test_support::{CountingHook, FakeProviderClient, RecordingUi, noop_hook};
use kiln::{
    BuildError, BuildProfile, Builder, CancelToken, ClientError, Communicator, SshSettings,
};

fn write_key_pair(dir: &tempfile::TempDir) -> Utf8PathBuf {
    let base = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
        .unwrap_or_else(|path| panic!("non-utf8 tempdir: {}", path.display()));
    let private_path = base.join("id_ed25519");
    std::fs::write(private_path.as_std_path(), "private key material")
        .unwrap_or_else(|err| panic!("write private key: {err}"));
    std::fs::write(
        format!("{private_path}.pub"),
        "ssh-ed25519 AAAA kiln-behaviour-test\n",
    )
    .unwrap_or_else(|err| panic!("write public key: {err}"));
    private_path
}

fn ssh_profile_with_key(port: u16, private_key_file: Utf8PathBuf) -> BuildProfile {
    BuildProfile {
        communicator: Communicator::Ssh(SshSettings {
            username: String::from("root"),
            port,
            private_key_file: Some(private_key_file),
        }),
        ..kiln::test_support::ssh_profile()
    }
}

async fn loopback_listener() -> (tokio::net::TcpListener, std::net::SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap_or_else(|err| panic!("bind listener: {err}"));
    let addr = listener
        .local_addr()
        .unwrap_or_else(|err| panic!("listener addr: {err}"));
    (listener, addr)
}

#[tokio::test]
async fn key_based_build_captures_an_image() {
    let (listener, addr) = loopback_listener().await;
    tokio::spawn(async move {
        loop {
            if listener.accept().await.is_err() {
                break;
            }
        }
    });

    let key_dir = tempfile::tempdir().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let private_key = write_key_pair(&key_dir);

    let client = FakeProviderClient::happy_path();
    client.set_public_address(Some(addr.ip()));
    let hook = CountingHook::default();

    let builder = Builder::new(
        ssh_profile_with_key(addr.port(), private_key),
        Arc::new(client.clone()),
        Arc::new(RecordingUi::default()),
        Arc::new(hook.clone()),
    );

    let artifact = builder
        .run(CancelToken::new())
        .await
        .unwrap_or_else(|err| panic!("build should succeed: {err}"));

    assert_eq!(artifact.image_name(), "test-image");
    assert!(!artifact.image_id().as_str().is_empty());
    assert_eq!(artifact.datacenter(), "ams01");

    let counts = client.counts();
    assert_eq!(counts.create_instance, 1);
    assert_eq!(counts.capture_image, 1);
    assert_eq!(counts.register_ssh_key, 1);
    // The temporary key is always deregistered during the unwind.
    assert_eq!(counts.delete_ssh_key, 1);
    // On success the captured image is the artifact; the build instance is
    // left in place.
    assert_eq!(counts.delete_instance, 0);
    assert_eq!(hook.calls(), 1);

    artifact
        .destroy()
        .await
        .unwrap_or_else(|err| panic!("destroy: {err}"));
    assert_eq!(client.counts().delete_image, 1);
}

#[tokio::test]
async fn create_failure_surfaces_the_provider_error() {
    let client = FakeProviderClient::happy_path();
    client.fail_on_create(ClientError::Api {
        status: 400,
        message: String::from("Invalid value provided for 'blockDevices'"),
    });

    let builder = Builder::new(
        kiln::test_support::winrm_profile(),
        Arc::new(client.clone()),
        Arc::new(RecordingUi::default()),
        noop_hook(),
    );

    let err = builder
        .run(CancelToken::new())
        .await
        .expect_err("create failure should fail the build");

    assert!(
        matches!(
            err,
            BuildError::Provider(ClientError::Api { status: 400, .. })
        ),
        "unexpected error: {err}"
    );
    let counts = client.counts();
    assert_eq!(counts.capture_image, 0);
    // No instance id was recorded, so cleanup had nothing to delete.
    assert_eq!(counts.delete_instance, 0);
}

#[tokio::test]
async fn status_timeout_is_classified_and_bounded() {
    let client = FakeProviderClient::default();
    // Always pending: the readiness wait must give up on its own.
    let profile = BuildProfile {
        state_timeout: Duration::from_millis(50),
        poll_interval: Duration::from_millis(1),
        ..kiln::test_support::winrm_profile()
    };

    let builder = Builder::new(
        profile,
        Arc::new(client.clone()),
        Arc::new(RecordingUi::default()),
        noop_hook(),
    );

    let started = Instant::now();
    let err = builder
        .run(CancelToken::new())
        .await
        .expect_err("pending-forever should time out");

    assert!(
        started.elapsed() < Duration::from_secs(5),
        "timed out too slowly: {:?}",
        started.elapsed()
    );
    assert!(
        matches!(err, BuildError::StateTimeout { .. }),
        "unexpected error: {err}"
    );
    let counts = client.counts();
    assert!(counts.instance_status >= 1);
    assert_eq!(counts.capture_image, 0);
    // The failed build deletes the instance it created.
    assert_eq!(counts.delete_instance, 1);
}

#[tokio::test]
async fn cancellation_after_create_skips_the_wait_and_still_cleans_up() {
    let client = FakeProviderClient::happy_path();
    let cancel = CancelToken::new();
    client.cancel_after_create(cancel.clone());

    let builder = Builder::new(
        kiln::test_support::winrm_profile(),
        Arc::new(client.clone()),
        Arc::new(RecordingUi::default()),
        noop_hook(),
    );

    let err = builder
        .run(cancel)
        .await
        .expect_err("cancelled build should not produce an artifact");

    assert!(matches!(err, BuildError::Cancelled), "unexpected: {err}");
    let counts = client.counts();
    assert_eq!(counts.create_instance, 1);
    // Cancellation was observed before the readiness wait started.
    assert_eq!(counts.instance_status, 0);
    assert_eq!(counts.capture_image, 0);
    // CreateInstance's cleanup still deleted the instance.
    assert_eq!(counts.delete_instance, 1);
}

#[tokio::test]
async fn invalid_configuration_never_reaches_the_provider() {
    let client = FakeProviderClient::happy_path();

    let config = kiln::BuildConfig {
        username: Some(String::from("acct")),
        api_key: Some(String::from("key")),
        image_name: Some(String::from("img")),
        instance_flavor: Some(String::from("B1_2X8X25")),
        instance_cpu: Some(2),
        base_image_id: Some(String::from("img-1")),
        base_os_code: Some(String::from("UBUNTU_LATEST")),
        ..kiln::BuildConfig::default()
    };

    let err = config.resolve().expect_err("conflicting selectors");
    match err {
        kiln::ConfigError::Invalid { issues } => {
            assert!(issues.len() >= 2, "expected both conflicts: {issues:?}");
        }
        kiln::ConfigError::Load(message) => panic!("unexpected load error: {message}"),
    }

    assert_eq!(client.counts(), kiln::test_support::CallCounts::default());
}

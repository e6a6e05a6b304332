//! Tests for install orchestration.

use super::*;
use crate::layout::InstallLayout;
use crate::release::{ReleaseReference, ReleaseSources};
use crate::service::MockServiceManager;
use crate::service::exec::{ExecCommand, JoinSettings};
use crate::symlinks::SymlinkPolicy;
use crate::test_utils::{
    ExpectedCall, RecordingServiceManager, StaticTransport, StubExecutor, sha256_hex,
    success_output,
};
use crate::cli::Cli;
use camino::Utf8PathBuf;
use clap::Parser;
use rstest::{fixture, rstest};
use std::fs;

const BINARY_URL: &str = "https://github.com/k3s-io/k3s/releases/download/v1.2.3/k3s";
const MANIFEST_URL: &str =
    "https://github.com/k3s-io/k3s/releases/download/v1.2.3/sha256sum-amd64.txt";
const BINARY: &[u8] = b"k3s v1.2.3";

struct Host {
    _root: tempfile::TempDir,
    config: InstallConfig,
}

#[fixture]
fn host() -> Host {
    let root = tempfile::tempdir().expect("temp dir");
    let base = Utf8PathBuf::from_path_buf(root.path().to_path_buf()).expect("utf8");
    let config = InstallConfig {
        machine: "x86_64".to_owned(),
        release: Some(ReleaseReference::Version("v1.2.3".to_owned())),
        sources: ReleaseSources::default(),
        layout: InstallLayout::new(&base.join("bin"), &base.join("systemd"), "k3s"),
        exec: ExecCommand::resolve(None, &[], &JoinSettings::default()).expect("exec"),
        symlinks: SymlinkPolicy::Auto,
        bin_dir_read_only: false,
        skip_enable: false,
        skip_start: false,
        force_restart: false,
        owner: None,
        uninstall_requires_root: false,
        join_environment: Vec::new(),
    };
    Host {
        _root: root,
        config,
    }
}

fn systemd_present(runs: usize) -> StubExecutor {
    StubExecutor::new(
        (0..runs)
            .map(|_| ExpectedCall {
                cmd: "systemctl",
                args: vec!["--version"],
                result: Ok(success_output()),
            })
            .collect(),
    )
}

fn release_transport() -> StaticTransport {
    StaticTransport::default()
        .with_body(MANIFEST_URL, format!("{}  k3s\n", sha256_hex(BINARY)))
        .with_body(BINARY_URL, BINARY.to_vec())
}

fn ambient() -> Vec<(String, String)> {
    [("K3S_TOKEN", "abc"), ("HOME", "/root"), ("PATH", "")]
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .to_vec()
}

fn run(
    config: &InstallConfig,
    executor: &StubExecutor,
    transport: &StaticTransport,
    services: &dyn ServiceManager,
) -> Result<InstallReport> {
    let mut sink = Vec::new();
    Lifecycle::new(executor, transport, services).run(
        config,
        &ambient(),
        &mut Progress::silent(&mut sink),
    )
}

#[rstest]
fn fresh_install_enables_then_restarts(host: Host) {
    let executor = systemd_present(1);
    let transport = release_transport();
    let mut services = MockServiceManager::new();
    let mut seq = mockall::Sequence::new();
    services
        .expect_exists()
        .withf(|unit| unit == "k3s")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(false));
    services
        .expect_enable()
        .withf(|unit| unit == "k3s")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    services
        .expect_daemon_reload()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(()));
    services
        .expect_restart()
        .withf(|unit| unit == "k3s")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    services.expect_disable().never();

    let report = run(&host.config, &executor, &transport, &services).expect("installs");

    let layout = &host.config.layout;
    assert_eq!(report.version.as_deref(), Some("v1.2.3"));
    assert_eq!(report.changed, Some(true));
    assert!(report.restarted);
    assert_eq!(fs::read(&layout.binary).expect("binary"), BINARY);
    assert_eq!(
        fs::read_to_string(&layout.env_file).expect("env"),
        "K3S_TOKEN=abc\n"
    );
    let unit = fs::read_to_string(&layout.unit_file).expect("unit");
    assert!(unit.contains(&format!("ExecStart={} server", layout.binary)));
    assert!(layout.uninstall_script.is_file());
    assert!(layout.bin_dir.join("kubectl").symlink_metadata().is_ok());
    executor.assert_finished();
}

#[rstest]
fn second_run_is_a_no_op(host: Host) {
    let executor = systemd_present(2);
    let transport = release_transport();
    let services = RecordingServiceManager::default();

    run(&host.config, &executor, &transport, &services).expect("first run");
    let report = run(&host.config, &executor, &transport, &services).expect("second run");

    assert_eq!(report.changed, Some(false));
    assert!(!report.restarted);
    assert!(matches!(
        report.binary,
        Some(InstallOutcome::AlreadyCurrent { .. })
    ));
    assert_eq!(transport.fetch_count(BINARY_URL), 1);
    assert_eq!(services.restart_count(), 1);
}

#[rstest]
fn force_restart_restarts_unchanged_service(mut host: Host) {
    let executor = systemd_present(2);
    let transport = release_transport();
    let services = RecordingServiceManager::default();

    run(&host.config, &executor, &transport, &services).expect("first run");
    host.config.force_restart = true;
    let report = run(&host.config, &executor, &transport, &services).expect("second run");

    assert_eq!(report.changed, Some(false));
    assert!(report.restarted);
    assert_eq!(services.restart_count(), 2);
}

#[rstest]
fn environment_change_alone_triggers_restart(host: Host) {
    let executor = systemd_present(2);
    let transport = release_transport();
    let services = RecordingServiceManager::default();

    run(&host.config, &executor, &transport, &services).expect("first run");
    fs::write(&host.config.layout.env_file, "K3S_TOKEN=stale\n").expect("tamper");
    let report = run(&host.config, &executor, &transport, &services).expect("second run");

    assert_eq!(report.changed, Some(true));
    assert_eq!(services.restart_count(), 2);
}

#[rstest]
fn unsupported_architecture_stops_before_network(mut host: Host) {
    host.config.machine = "riscv64".to_owned();
    let executor = systemd_present(1);
    let transport = release_transport();
    let services = RecordingServiceManager::default();

    let err = run(&host.config, &executor, &transport, &services).expect_err("rejected");

    assert!(matches!(err, InstallerError::UnsupportedPlatform { .. }));
    assert_eq!(transport.total_requests(), 0);
    assert!(services.calls().is_empty());
    assert!(!host.config.layout.uninstall_script.exists());
}

#[rstest]
fn hash_mismatch_aborts_before_service_changes(host: Host) {
    let executor = systemd_present(1);
    let transport = StaticTransport::default()
        .with_body(MANIFEST_URL, format!("{}  k3s\n", sha256_hex(b"genuine")))
        .with_body(BINARY_URL, BINARY.to_vec());
    let services = RecordingServiceManager::default();

    let err = run(&host.config, &executor, &transport, &services).expect_err("hash gate");

    assert!(matches!(err, InstallerError::HashMismatch { .. }));
    assert!(!host.config.layout.binary.exists());
    assert!(!host.config.layout.unit_file.exists());
    assert_eq!(services.restart_count(), 0);
}

#[rstest]
fn skip_enable_writes_files_only(mut host: Host) {
    host.config.skip_enable = true;
    let executor = systemd_present(1);
    let transport = release_transport();
    let services = RecordingServiceManager::default();

    let report = run(&host.config, &executor, &transport, &services).expect("installs");

    assert!(!report.enabled);
    assert!(host.config.layout.unit_file.is_file());
    assert!(services.calls().is_empty());
}

#[rstest]
fn skip_start_enables_without_restart(mut host: Host) {
    host.config.skip_start = true;
    let executor = systemd_present(1);
    let transport = release_transport();
    let services = RecordingServiceManager::default();

    let report = run(&host.config, &executor, &transport, &services).expect("installs");

    assert!(report.enabled);
    assert!(!report.restarted);
    assert_eq!(services.calls(), ["enable k3s", "daemon-reload"]);
}

#[rstest]
fn previous_registration_is_disabled_best_effort(host: Host) {
    let executor = systemd_present(1);
    let transport = release_transport();
    let mut services = MockServiceManager::new();
    services.expect_exists().returning(|_| Ok(true));
    services.expect_disable().times(1).returning(|unit| {
        Err(InstallerError::ServiceManager {
            operation: "disable",
            unit: unit.to_owned(),
            message: "unit is masked".to_owned(),
        })
    });
    services.expect_enable().returning(|_| Ok(()));
    services.expect_daemon_reload().returning(|| Ok(()));
    services.expect_restart().times(1).returning(|_| Ok(()));

    let report = run(&host.config, &executor, &transport, &services).expect("installs");
    assert!(report.restarted);
}

#[rstest]
fn previous_registration_is_disabled_before_enable(host: Host) {
    let executor = systemd_present(1);
    let transport = release_transport();
    let services = RecordingServiceManager::default().with_existing("k3s");

    run(&host.config, &executor, &transport, &services).expect("installs");

    assert_eq!(
        services.calls(),
        ["disable k3s", "enable k3s", "daemon-reload", "restart k3s"]
    );
}

#[rstest]
fn skip_download_requires_installed_binary(mut host: Host) {
    host.config.release = None;
    let executor = systemd_present(1);
    let transport = StaticTransport::default();
    let services = RecordingServiceManager::default();

    let err = run(&host.config, &executor, &transport, &services).expect_err("no binary");
    assert!(err.to_string().contains("not installed"));
    assert_eq!(transport.total_requests(), 0);
}

#[rstest]
fn read_only_bin_dir_uses_existing_binary(mut host: Host) {
    host.config.release = None;
    host.config.bin_dir_read_only = true;
    let layout = &host.config.layout;
    fs::create_dir_all(&layout.bin_dir).expect("mkdir");
    fs::write(&layout.binary, BINARY).expect("seed binary");
    let executor = systemd_present(1);
    let transport = StaticTransport::default();
    let services = RecordingServiceManager::default();

    let report = run(&host.config, &executor, &transport, &services).expect("installs");

    assert!(report.binary.is_none());
    assert!(report.restarted);
    assert!(!layout.uninstall_script.exists());
    assert!(layout.bin_dir.join("kubectl").symlink_metadata().is_err());
}

#[rstest]
fn join_options_are_written_to_environment_file(host: Host) {
    let host_layout = &host.config.layout;
    let systemd_dir = host_layout.unit_file.parent().expect("systemd dir");
    let mut cli = Cli::try_parse_from([
        "k3s-install",
        "--bin-dir",
        host_layout.bin_dir.as_str(),
        "--systemd-dir",
        systemd_dir.as_str(),
        "--k3s-version",
        "v1.2.3",
        "--arch",
        "x86_64",
        "--k3s-url",
        "https://server:6443",
        "--k3s-token",
        "secret",
    ])
    .expect("arguments parse");
    cli.channel = None;
    cli.commit = None;
    cli.pull_request = None;
    cli.k3s_token_file = None;
    cli.name = None;
    cli.exec = None;
    let mut config = InstallConfig::from_cli(&cli, "x86_64").expect("valid configuration");
    config.owner = None;
    config.uninstall_requires_root = false;
    let executor = systemd_present(1);
    let transport = release_transport();
    let services = RecordingServiceManager::default();

    run(&config, &executor, &transport, &services).expect("installs");

    let layout = &config.layout;
    assert_eq!(layout.unit, "k3s-agent");
    assert_eq!(
        fs::read_to_string(&layout.env_file).expect("env"),
        "K3S_TOKEN=secret\nK3S_URL=https://server:6443\n"
    );
    let unit = fs::read_to_string(&layout.unit_file).expect("unit");
    assert!(unit.contains(&format!("ExecStart={} agent", layout.binary)));
}

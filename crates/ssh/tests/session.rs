//! Drives the session code against a fake `ssh` that hands over to a local
//! interactive bash, so the whole prompt protocol runs for real.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use config::{Config, Password};
use ssh::{ErrorClass, PortAllocator, RemoteFile, SessionState, SshDriver, SshError};
use test_support::{
    FAKE_PASSWORD, FAKE_REMOTE_PORT, FakeServer, TempDir, UNRESOLVABLE_HOST, have_bash,
};

fn setup() -> Option<(TempDir, FakeServer, SshDriver)> {
    if !have_bash() {
        eprintln!("skipping: bash is not installed");
        return None;
    }
    let dir = TempDir::new().unwrap();
    let server = FakeServer::install(dir.path()).unwrap();
    let driver = SshDriver::with_programs(server.ssh(), "curl", PortAllocator::fixed());
    Some((dir, server, driver))
}

fn config(password: &str) -> Config {
    Config {
        server: Some("conversion.test".to_owned()),
        password: Password::new(password),
        ..Config::default()
    }
}

#[test]
fn synchronises_with_the_remote_shell() {
    let Some((_dir, server, mut driver)) = setup() else {
        return;
    };

    let mut session = driver
        .start_session(&config(FAKE_PASSWORD), &[], true)
        .unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    let token = session.prompt_token().unwrap().to_owned();
    assert_eq!(token.len(), 8);

    session.run_command("true").unwrap();
    session.exit().unwrap();
    assert_eq!(server.connections(), ["conversion.test"]);
}

#[test]
fn test_connection_reports_version_and_drivers() {
    let Some((_dir, server, mut driver)) = setup() else {
        return;
    };
    server.add_virt_v2v("1.42.0", "exit 0").unwrap();

    let capabilities = driver.test_connection(&config(FAKE_PASSWORD)).unwrap();
    assert_eq!(capabilities.version, "1.42.0");
    assert_eq!(capabilities.input_drivers, ["disk", "libvirt", "libvirtxml"]);
    assert_eq!(capabilities.output_drivers, ["glance", "libvirt", "local"]);
    assert!(capabilities.colours_option);
}

#[test]
fn old_virt_v2v_is_rejected() {
    let Some((_dir, server, mut driver)) = setup() else {
        return;
    };
    server.add_virt_v2v("1.26.3", "exit 0").unwrap();

    let err = driver.test_connection(&config(FAKE_PASSWORD)).unwrap_err();
    assert!(matches!(err, SshError::IncompatibleVersion(_)), "{err}");
    assert_eq!(err.class(), ErrorClass::Protocol);
}

#[test]
fn missing_virt_v2v_is_reported() {
    let Some((_dir, _server, mut driver)) = setup() else {
        return;
    };

    let err = driver.test_connection(&config(FAKE_PASSWORD)).unwrap_err();
    assert!(matches!(err, SshError::V2vNotInstalled), "{err}");
}

#[test]
fn sudo_without_nopasswd_is_a_configuration_error() {
    let Some((_dir, server, mut driver)) = setup() else {
        return;
    };
    server
        .add_remote_command("sudo", "echo 'sudo: a password is required' >&2\nexit 1")
        .unwrap();

    let mut config = config(FAKE_PASSWORD);
    config.sudo = true;
    config.username = "builder".to_owned();
    let err = driver.test_connection(&config).unwrap_err();
    assert!(
        matches!(&err, SshError::SudoPasswordRequired { user } if user == "builder"),
        "{err}"
    );
}

#[test]
fn wrong_password_fails_during_synchronisation() {
    let Some((_dir, _server, mut driver)) = setup() else {
        return;
    };

    let err = driver
        .start_session(&config("not-the-password"), &[], true)
        .unwrap_err();
    assert!(matches!(err, SshError::Authentication(_)), "{err}");
    assert!(err.to_string().contains("password is wrong"));
}

#[test]
fn ssh_diagnostic_becomes_the_error() {
    let Some((_dir, _server, mut driver)) = setup() else {
        return;
    };

    let mut config = config(FAKE_PASSWORD);
    config.server = Some(UNRESOLVABLE_HOST.to_owned());
    let err = driver.start_session(&config, &[], true).unwrap_err();
    assert_eq!(
        err.to_string(),
        format!(
            "ssh: Could not resolve hostname {UNRESOLVABLE_HOST}: Name or service not known"
        )
    );
}

#[test]
fn missing_server_is_refused_before_spawning() {
    let Some((_dir, server, mut driver)) = setup() else {
        return;
    };

    let config = Config::default();
    let err = driver.start_session(&config, &[], true).unwrap_err();
    assert!(matches!(err, SshError::NoServer));
    assert!(server.connections().is_empty());
}

#[test]
fn data_connection_parses_the_remote_port() {
    let Some((_dir, _server, mut driver)) = setup() else {
        return;
    };

    let local_port = driver.next_local_port();
    assert_eq!(local_port, ssh::FIXED_PORT_BASE);
    let connection = driver
        .open_data_connection(&config(FAKE_PASSWORD), local_port)
        .unwrap();
    assert_eq!(connection.local_port(), local_port);
    assert_eq!(connection.remote_port(), FAKE_REMOTE_PORT);

    let pid = connection.pid();
    connection.close().unwrap();
    assert!(!Path::new(&format!("/proc/{pid}")).exists());
}

#[test]
fn data_connection_with_wrong_password_fails_fast() {
    let Some((_dir, _server, mut driver)) = setup() else {
        return;
    };

    let local_port = driver.next_local_port();
    let err = driver
        .open_data_connection(&config("wrong"), local_port)
        .unwrap_err();
    assert!(matches!(&err, SshError::Authentication(text) if text.contains("password is wrong")));
    assert_eq!(err.class(), ErrorClass::Protocol);
}

#[test]
fn remote_connection_uploads_files_byte_for_byte() {
    let Some((dir, _server, mut driver)) = setup() else {
        return;
    };
    let remote_dir = dir.path().join("virt-p2v-20261019-abcd1234");
    let remote_dir = remote_dir.to_str().unwrap();

    let xml = b"<domain type='physical'>\n  <name>it's $HOME `x`</name>\n</domain>";
    let files = [
        RemoteFile::new("name", "guest\n"),
        RemoteFile::new("physical.xml", xml.to_vec()),
        RemoteFile::executable("virt-v2v-wrapper.sh", "#!/bin/bash\nexit 0\n"),
        RemoteFile::new("empty", ""),
    ];

    let session = driver
        .start_remote_connection(&config(FAKE_PASSWORD), remote_dir, &files)
        .unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    session.exit().unwrap();

    let remote = Path::new(remote_dir);
    assert_eq!(fs::read(remote.join("name")).unwrap(), b"guest\n");
    assert_eq!(fs::read(remote.join("physical.xml")).unwrap(), xml);
    assert!(fs::read(remote.join("empty")).unwrap().is_empty());
    assert!(!fs::read(remote.join("time")).unwrap().is_empty());

    let mode = fs::metadata(remote.join("virt-v2v-wrapper.sh"))
        .unwrap()
        .permissions()
        .mode();
    assert_ne!(mode & 0o111, 0);
}

#[test]
fn identity_connections_skip_the_password_prompt() {
    let Some((dir, _server, mut driver)) = setup() else {
        return;
    };
    let key = dir.path().join("id_rsa");
    fs::write(&key, "PRIVATE KEY\n").unwrap();

    let mut config = config("");
    config.identity_url = Some(key.display().to_string());
    let session = driver.start_session(&config, &[], true).unwrap();
    session.exit().unwrap();
}

//! Starts fake `qemu-nbd` and `nbdkit` scripts and checks how they are
//! launched, selected and torn down.

use std::fs;
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use nbd::{NbdError, NbdPrograms, NbdServer, NbdServerKind, select_server};
use test_support::{TempDir, free_tcp_port, write_script};

fn read_when_written(path: &Path) -> String {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if let Ok(text) = fs::read_to_string(path) {
            if text.ends_with('\n') {
                return text;
            }
        }
        assert!(Instant::now() < deadline, "{} never written", path.display());
        thread::sleep(Duration::from_millis(20));
    }
}

fn programs(qemu_nbd: PathBuf, nbdkit: PathBuf) -> NbdPrograms {
    NbdPrograms {
        qemu_nbd: qemu_nbd.into_os_string(),
        nbdkit: nbdkit.into_os_string(),
    }
}

#[test]
fn selection_skips_broken_servers() {
    let dir = TempDir::new().unwrap();
    let qemu = write_script(dir.path(), "qemu-nbd", "exit 1").unwrap();
    let nbdkit = write_script(
        dir.path(),
        "nbdkit",
        r#"[ "$1 $2" = "file --version" ] || exit 1
echo "nbdkit 1.38.0""#,
    )
    .unwrap();

    let programs = programs(qemu, nbdkit);
    let chosen = select_server(&nbd::DEFAULT_SERVERS, &programs).unwrap();
    assert_eq!(chosen, NbdServerKind::Nbdkit);
}

#[test]
fn selection_fails_when_nothing_works() {
    let dir = TempDir::new().unwrap();
    let programs = programs(dir.path().join("missing-qemu"), dir.path().join("missing-nbdkit"));
    let err = select_server(&nbd::DEFAULT_SERVERS, &programs).unwrap_err();
    assert!(matches!(err, NbdError::NoWorkingServer));
}

#[test]
fn listening_server_gets_port_arguments() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("args");
    let qemu = write_script(
        dir.path(),
        "qemu-nbd",
        &format!("echo \"$@\" > '{}'\nexec sleep 60", log.display()),
    )
    .unwrap();
    let programs = programs(qemu, dir.path().join("nbdkit"));
    let port = free_tcp_port().unwrap();

    let server = NbdServer::start(NbdServerKind::QemuNbdNoSa, &programs, port, "/dev/sdz").unwrap();
    assert_eq!(server.port(), port);
    assert_eq!(
        read_when_written(&log),
        format!("-r -t -f raw --cache=unsafe -p {port} -b localhost /dev/sdz\n")
    );

    let pid = server.pid();
    let status = server.stop().unwrap();
    assert!(!status.success());
    assert!(!Path::new(&format!("/proc/{pid}")).exists());
}

#[test]
fn socket_activated_server_receives_listeners() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("activation");
    let nbdkit = write_script(
        dir.path(),
        "nbdkit",
        &format!(
            "fd3=no\n[ -e /proc/self/fd/3 ] && fd3=yes\necho \"$LISTEN_PID $$ $LISTEN_FDS $fd3 $*\" > '{}'\nexec sleep 60",
            log.display()
        ),
    )
    .unwrap();
    let programs = programs(dir.path().join("qemu-nbd"), nbdkit);
    let port = free_tcp_port().unwrap();

    let server = NbdServer::start(NbdServerKind::Nbdkit, &programs, port, "/dev/sdz").unwrap();
    let record = read_when_written(&log);
    let fields: Vec<&str> = record.split_whitespace().collect();
    assert_eq!(fields[0], fields[1], "LISTEN_PID must be the server itself");
    assert_eq!(fields[0], server.pid().to_string());
    assert!(fields[2] == "1" || fields[2] == "2", "LISTEN_FDS={}", fields[2]);
    assert_eq!(fields[3], "yes");
    assert_eq!(&fields[4..], ["-r", "-f", "file", "file=/dev/sdz"]);

    // The port was bound before the server started.
    TcpStream::connect(("127.0.0.1", port)).unwrap();
}

#[test]
fn server_exiting_early_is_reported() {
    let dir = TempDir::new().unwrap();
    let qemu = write_script(
        dir.path(),
        "qemu-nbd",
        "echo 'qemu-nbd: cannot open device' >&2\nexit 1",
    )
    .unwrap();
    let programs = programs(qemu, dir.path().join("nbdkit"));
    let port = free_tcp_port().unwrap();

    let mut server =
        NbdServer::start(NbdServerKind::QemuNbdNoSa, &programs, port, "/dev/sdz").unwrap();
    let err = server.wait_ready(Duration::from_secs(5)).unwrap_err();
    assert!(matches!(err, NbdError::Exited { program: "qemu-nbd", .. }), "{err}");
    assert!(
        err.to_string().starts_with("qemu-nbd exited before accepting connections"),
        "{err}"
    );
}

#[test]
fn dropping_a_server_reaps_it() {
    let dir = TempDir::new().unwrap();
    let qemu = write_script(dir.path(), "qemu-nbd", "exec sleep 60").unwrap();
    let programs = programs(qemu, dir.path().join("nbdkit"));
    let port = free_tcp_port().unwrap();

    let server = NbdServer::start(NbdServerKind::QemuNbd, &programs, port, "/dev/sdz").unwrap();
    let pid = server.pid();
    drop(server);
    assert!(!Path::new(&format!("/proc/{pid}")).exists());
}

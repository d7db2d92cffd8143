//! Runs the `virt-p2v` binary end to end. Kernel command line mode is
//! exercised against a fake conversion server and a fake `qemu-nbd` found
//! through `PATH`.

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Command as StdCommand, Stdio};
use std::sync::OnceLock;
use std::thread;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use test_support::{FAKE_PASSWORD, FakeServer, have_bash, write_script};

/// Local port used for the first disk with `--iso`.
const ISO_DATA_PORT: u16 = 50123;

/// Serves the NBD greeting on the `--iso` data port for the whole test run.
/// False when the port is taken on this machine.
fn iso_greeter() -> bool {
    static GREETER: OnceLock<bool> = OnceLock::new();
    *GREETER.get_or_init(|| {
        let Ok(listener) = TcpListener::bind(("127.0.0.1", ISO_DATA_PORT)) else {
            return false;
        };
        thread::spawn(move || {
            for mut stream in listener.incoming().flatten() {
                let _ = stream.write_all(b"NBDMAGIC");
            }
        });
        true
    })
}

struct Machine {
    dir: TempDir,
    server: FakeServer,
}

impl Machine {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let server = FakeServer::install(&dir.path().join("server")).unwrap();
        let tools = dir.path().join("tools");
        fs::create_dir_all(&tools).unwrap();
        write_script(
            &tools,
            "qemu-nbd",
            &format!(
                "[ \"$1\" = --version ] && {{ echo 'qemu-nbd 8.2.0'; exit 0; }}\n\
                 echo \"$@\" > '{}'\nexec sleep 60",
                dir.path().join("qemu-nbd.args").display(),
            ),
        )
        .unwrap();
        Self { dir, server }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn search_path(&self) -> String {
        format!(
            "{}:{}:{}",
            self.path("server").display(),
            self.path("tools").display(),
            std::env::var("PATH").unwrap_or_default()
        )
    }

    fn cmdline(&self, extra: &str) -> String {
        format!("p2v.server=conversion.test p2v.password={FAKE_PASSWORD} p2v.disks=sda {extra}")
    }

    fn command(&self, cmdline: &str) -> Command {
        let mut command = virt_p2v();
        command
            .env("PATH", self.search_path())
            .env_remove("VIRT_P2V_LOG")
            .arg("--nbd=qemu-nbd-no-sa")
            .arg(format!("--cmdline={cmdline}"));
        command
    }
}

fn virt_p2v() -> Command {
    Command::new(env!("CARGO_BIN_EXE_virt-p2v"))
}

fn touch(path: &Path) -> String {
    format!("\"touch {}\"", path.display())
}

#[test]
fn version_is_printed() {
    virt_p2v()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("virt-p2v "))
        .stderr(predicate::str::is_empty());
}

#[test]
fn help_lists_the_options() {
    virt_p2v()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--test-disk").and(predicate::str::contains("--nbd")));
}

#[test]
fn bad_arguments_exit_with_usage_status() {
    virt_p2v()
        .arg("--frobnicate")
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty());
}

#[test]
fn no_server_is_an_error() {
    virt_p2v()
        .arg("--cmdline=ro quiet")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no conversion server given"));
}

#[test]
fn failed_connection_test_stops_before_converting() {
    if !have_bash() {
        return;
    }
    let machine = Machine::new();
    let pre = machine.path("pre-ran");
    let cmdline = machine.cmdline(&format!("p2v.pre={}", touch(&pre)));

    machine
        .command(&cmdline)
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "virt-p2v: error opening control connection to conversion.test:22: ",
        ));
    assert!(pre.exists());
    assert!(!machine.path("qemu-nbd.args").exists());
}

#[test]
fn failed_conversion_runs_the_failure_hook() {
    if !have_bash() {
        return;
    }
    let machine = Machine::new();
    machine.server.add_virt_v2v("1.42.0", "exit 0").unwrap();
    write_script(
        &machine.path("tools"),
        "qemu-nbd",
        &format!(
            "[ \"$1\" = --version ] && exit 0\necho \"$@\" > '{}'\nexit 1",
            machine.path("qemu-nbd.args").display()
        ),
    )
    .unwrap();
    let fail = machine.path("fail-ran");
    let post = machine.path("post-ran");
    let cmdline = machine.cmdline(&format!(
        "p2v.skip_test_connection p2v.fail={} p2v.post={}",
        touch(&fail),
        touch(&post)
    ));

    machine
        .command(&cmdline)
        .arg("--test-disk=/var/tmp/test-disk.img")
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "virt-p2v: Opening data connection for /var/tmp/test-disk.img ...",
        ))
        .stderr(predicate::str::contains("virt-p2v: error during conversion: "));

    assert!(fail.exists());
    assert!(!post.exists());
    let args = fs::read_to_string(machine.path("qemu-nbd.args")).unwrap();
    assert!(args.ends_with(" /var/tmp/test-disk.img\n"), "{args}");
    assert!(machine.server.connections().is_empty());
}

#[test]
fn successful_conversion_runs_the_post_hook() {
    if !have_bash() || !iso_greeter() {
        return;
    }
    let machine = Machine::new();
    machine
        .server
        .add_virt_v2v("1.42.0", "echo 'Converting physical machine'; exit 0")
        .unwrap();
    let post = machine.path("post-ran");
    let cmdline = machine.cmdline(&format!("p2v.post={}", touch(&post)));

    machine
        .command(&cmdline)
        .arg("--iso")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("virt-p2v: remote log directory location: /tmp/virt-p2v-")
                .and(predicate::str::contains("Converting physical machine\n"))
                .and(predicate::str::contains("Conversion finished successfully.\n\n\n\n")),
        );

    assert!(post.exists());
    let args = fs::read_to_string(machine.path("qemu-nbd.args")).unwrap();
    assert!(args.contains(&format!("-p {ISO_DATA_PORT} ")), "{args}");
}

#[test]
fn sigterm_cancels_the_conversion_without_the_failure_hook() {
    if !have_bash() || !iso_greeter() {
        return;
    }
    let machine = Machine::new();
    machine
        .server
        .add_virt_v2v("1.42.0", "echo 'Copying disk 1/1'; exec sleep 30")
        .unwrap();
    let fail = machine.path("fail-ran");
    let cmdline = machine.cmdline(&format!(
        "p2v.skip_test_connection p2v.fail={}",
        touch(&fail)
    ));

    let mut child = StdCommand::new(env!("CARGO_BIN_EXE_virt-p2v"))
        .env("PATH", machine.search_path())
        .env_remove("VIRT_P2V_LOG")
        .arg("--iso")
        .arg("--nbd=qemu-nbd-no-sa")
        .arg(format!("--cmdline={cmdline}"))
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    let stdout = child.stdout.take().unwrap();
    let mut lines = BufReader::new(stdout).lines();
    for line in lines.by_ref() {
        if line.unwrap().contains("Copying disk") {
            break;
        }
    }
    let status = StdCommand::new("kill")
        .arg("-TERM")
        .arg(child.id().to_string())
        .status()
        .unwrap();
    assert!(status.success());
    let rest: Vec<String> = lines.map(Result::unwrap).collect();

    let output = child.wait_with_output().unwrap();
    assert_eq!(output.status.code(), Some(130));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("virt-p2v: conversion cancelled by user\n"),
        "{stderr}"
    );
    assert!(!stderr.contains("error during conversion"), "{stderr}");
    assert!(
        rest.iter().any(|line| line.contains("Conversion cancelled by user.")),
        "{rest:?}"
    );
    assert!(!fail.exists());
}

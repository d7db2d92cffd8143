#![deny(unsafe_code)]
#![deny(missing_docs)]

//! Shared helpers for tests that stand in for external programs.
//!
//! Session and conversion tests replace `ssh`, `curl`, `qemu-nbd` and
//! friends with small shell scripts written into a scratch directory.
//! [`FakeServer`] plays the conversion server: a fake `ssh` that asks for a
//! password and then hands over to a local interactive bash.

use std::fs;
use std::io;
use std::net::TcpListener;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

pub use tempfile::TempDir;

mod server;

pub use server::{FAKE_PASSWORD, FAKE_REMOTE_PORT, FakeServer, UNRESOLVABLE_HOST};

/// Writes an executable `#!/bin/sh` script named `name` into `dir`.
pub fn write_script(dir: &Path, name: &str, body: &str) -> io::Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n"))?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
    Ok(path)
}

/// Writes an executable `#!/bin/bash` script named `name` into `dir`.
pub fn write_bash_script(dir: &Path, name: &str, body: &str) -> io::Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/bash\n{body}\n"))?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
    Ok(path)
}

/// True when `bash` is installed, which the shell-synchronisation tests need.
pub fn have_bash() -> bool {
    ["/bin/bash", "/usr/bin/bash"]
        .iter()
        .any(|path| Path::new(path).exists())
}

/// A TCP port on 127.0.0.1 that was free a moment ago.
pub fn free_tcp_port() -> io::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

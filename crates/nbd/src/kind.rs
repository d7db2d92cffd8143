use std::ffi::{OsStr, OsString};
use std::fmt;
use std::process::{Command, Stdio};
use std::str::FromStr;

use tracing::debug;

use crate::error::NbdError;

/// A way of exporting a disk over NBD.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NbdServerKind {
    /// `qemu-nbd` with socket activation.
    QemuNbd,
    /// `qemu-nbd` binding its own port.
    QemuNbdNoSa,
    /// `nbdkit` with socket activation.
    Nbdkit,
    /// `nbdkit` binding its own port.
    NbdkitNoSa,
}

/// Candidates tried in order when `--nbd` is not given.
pub const DEFAULT_SERVERS: [NbdServerKind; 4] = [
    NbdServerKind::QemuNbd,
    NbdServerKind::QemuNbdNoSa,
    NbdServerKind::Nbdkit,
    NbdServerKind::NbdkitNoSa,
];

impl NbdServerKind {
    /// Name used by `--nbd`.
    pub const fn name(self) -> &'static str {
        match self {
            Self::QemuNbd => "qemu-nbd",
            Self::QemuNbdNoSa => "qemu-nbd-no-sa",
            Self::Nbdkit => "nbdkit",
            Self::NbdkitNoSa => "nbdkit-no-sa",
        }
    }

    /// Program run for this kind.
    pub const fn program_name(self) -> &'static str {
        match self {
            Self::QemuNbd | Self::QemuNbdNoSa => "qemu-nbd",
            Self::Nbdkit | Self::NbdkitNoSa => "nbdkit",
        }
    }

    /// True when the listening socket is bound here and passed in.
    pub const fn socket_activation(self) -> bool {
        matches!(self, Self::QemuNbd | Self::Nbdkit)
    }

    pub(crate) const fn is_qemu(self) -> bool {
        matches!(self, Self::QemuNbd | Self::QemuNbdNoSa)
    }

    /// Arguments that export `device` read-only, without the program name.
    pub fn args(self, port: u16, device: &str) -> Vec<String> {
        let mut args = Vec::with_capacity(10);
        let listen = !self.socket_activation();
        if self.is_qemu() {
            args.extend(["-r", "-t", "-f", "raw", "--cache=unsafe"].map(str::to_owned));
            if listen {
                args.extend(["-p".to_owned(), port.to_string()]);
                args.extend(["-b", "localhost"].map(str::to_owned));
            }
            args.push(device.to_owned());
        } else {
            args.extend(["-r", "-f"].map(str::to_owned));
            if listen {
                args.extend(["-p".to_owned(), port.to_string()]);
                args.extend(["-i", "localhost"].map(str::to_owned));
            }
            args.push("file".to_owned());
            args.push(format!("file={device}"));
        }
        args
    }
}

impl fmt::Display for NbdServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NbdServerKind {
    type Err = NbdError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "qemu-nbd" | "qemu" => Ok(Self::QemuNbd),
            "qemu-nbd-no-sa" => Ok(Self::QemuNbdNoSa),
            "nbdkit" => Ok(Self::Nbdkit),
            "nbdkit-no-sa" => Ok(Self::NbdkitNoSa),
            other => Err(NbdError::UnknownServer(other.to_owned())),
        }
    }
}

/// Parses the comma-separated `--nbd` list.
pub fn parse_nbd_option(option: &str) -> Result<Vec<NbdServerKind>, NbdError> {
    let kinds = option
        .split(',')
        .filter(|name| !name.is_empty())
        .map(str::parse)
        .collect::<Result<Vec<_>, _>>()?;
    if kinds.is_empty() {
        return Err(NbdError::EmptyOption);
    }
    Ok(kinds)
}

/// Program names for each server family.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NbdPrograms {
    /// `qemu-nbd` executable.
    pub qemu_nbd: OsString,
    /// `nbdkit` executable.
    pub nbdkit: OsString,
}

impl Default for NbdPrograms {
    fn default() -> Self {
        Self {
            qemu_nbd: OsString::from("qemu-nbd"),
            nbdkit: OsString::from("nbdkit"),
        }
    }
}

impl NbdPrograms {
    /// Executable for `kind`.
    pub fn program(&self, kind: NbdServerKind) -> &OsStr {
        if kind.is_qemu() {
            &self.qemu_nbd
        } else {
            &self.nbdkit
        }
    }

    /// True when the program for `kind` runs and reports its version.
    pub fn is_available(&self, kind: NbdServerKind) -> bool {
        let mut command = Command::new(self.program(kind));
        if !kind.is_qemu() {
            command.arg("file");
        }
        command
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|status| status.success())
    }
}

/// First kind in `candidates` whose program works.
pub fn select_server(
    candidates: &[NbdServerKind],
    programs: &NbdPrograms,
) -> Result<NbdServerKind, NbdError> {
    for &kind in candidates {
        if programs.is_available(kind) {
            debug!(server = %kind, "selected NBD server");
            return Ok(kind);
        }
        debug!(server = %kind, "NBD server not available");
    }
    Err(NbdError::NoWorkingServer)
}

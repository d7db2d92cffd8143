use std::fmt;
use std::io::{self, Write};

use zeroize::Zeroizing;

use crate::host;
use crate::network::NetworkMap;

/// Conversion server password. Zeroized on drop, never printed.
#[derive(Clone, Default)]
pub struct Password(Zeroizing<String>);

impl Password {
    /// Wraps `password`.
    pub fn new(password: impl Into<String>) -> Self {
        Self(Zeroizing::new(password.into()))
    }

    /// The password text.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// True when no password was given.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("Password(<empty>)")
        } else {
            f.write_str("Password(<redacted>)")
        }
    }
}

/// Guest CPU features passed through to the converted domain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CpuFlags {
    /// ACPI support.
    pub acpi: bool,
    /// Local APIC.
    pub apic: bool,
    /// Physical address extension.
    pub pae: bool,
}

/// virt-v2v `-oa` setting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputAllocation {
    /// Let virt-v2v choose.
    #[default]
    None,
    /// `-oa sparse`.
    Sparse,
    /// `-oa preallocated`.
    Preallocated,
}

impl OutputAllocation {
    /// Argument for `-oa`, if any.
    pub const fn as_arg(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Sparse => Some("sparse"),
            Self::Preallocated => Some("preallocated"),
        }
    }
}

/// virt-v2v output options (`-o`, `-oa`, `-oc`, `-of`, `-os`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputConfig {
    /// Output driver.
    pub driver: String,
    /// Output allocation mode.
    pub allocation: OutputAllocation,
    /// Output connection URI.
    pub connection: Option<String>,
    /// Output disk format.
    pub format: Option<String>,
    /// Output storage location.
    pub storage: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            driver: "local".to_owned(),
            allocation: OutputAllocation::None,
            connection: None,
            format: None,
            storage: Some("/var/tmp".to_owned()),
        }
    }
}

/// Everything needed to run one conversion.
#[derive(Clone, Debug)]
pub struct Config {
    /// Conversion server host name.
    pub server: Option<String>,
    /// SSH port on the conversion server.
    pub port: u16,
    /// SSH user name.
    pub username: String,
    /// SSH password; empty when an identity is used or none is needed.
    pub password: Password,
    /// SSH private key, as a local path or a URL to fetch.
    pub identity_url: Option<String>,
    /// Run virt-v2v through `sudo -n`.
    pub sudo: bool,
    /// Name of the converted guest.
    pub guestname: String,
    /// Number of virtual CPUs.
    pub vcpus: u32,
    /// Guest memory in bytes.
    pub memory: u64,
    /// CPU features of the guest.
    pub cpu_flags: CpuFlags,
    /// Fixed disks to convert, as names under `/dev` or absolute paths.
    pub disks: Vec<String>,
    /// Removable media devices, presented as empty CD-ROM drives.
    pub removable: Vec<String>,
    /// Disk of the running system, left out of `disks`.
    pub root_disk: Option<String>,
    /// Network interfaces to recreate in the guest.
    pub interfaces: Vec<String>,
    /// Interface to target network mapping.
    pub network_map: NetworkMap,
    /// virt-v2v output options.
    pub output: OutputConfig,
    /// Verbose logging, including virt-v2v debug output.
    pub verbose: bool,
    /// Ask virt-v2v for coloured output and pass colour codes through.
    pub colours: bool,
    /// Upload dmesg, lscpu, lspci, lsscsi and lsusb output with the job.
    pub collect_diagnostics: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: None,
            port: 22,
            username: "root".to_owned(),
            password: Password::default(),
            identity_url: None,
            sudo: false,
            guestname: "localhost".to_owned(),
            vcpus: 1,
            memory: host::MIN_MEMORY,
            cpu_flags: CpuFlags::default(),
            disks: Vec::new(),
            removable: Vec::new(),
            root_disk: None,
            interfaces: Vec::new(),
            network_map: NetworkMap::default(),
            output: OutputConfig::default(),
            verbose: false,
            colours: false,
            collect_diagnostics: true,
        }
    }
}

impl Config {
    /// Defaults filled in from the running machine.
    pub fn detect() -> Self {
        let devices =
            host::discover_block_devices(host::SYS_BLOCK, host::root_device().as_deref());
        Self {
            guestname: host::short_hostname(),
            vcpus: host::online_cpus(),
            memory: host::guest_memory(),
            cpu_flags: host::cpu_flags(),
            disks: devices.disks,
            removable: devices.removable,
            root_disk: devices.root_disk,
            interfaces: host::discover_interfaces(host::SYS_CLASS_NET),
            ..Self::default()
        }
    }

    /// Path of a disk or removable device entry.
    pub fn device_path(device: &str) -> String {
        if device.starts_with('/') {
            device.to_owned()
        } else {
            format!("/dev/{device}")
        }
    }

    /// Writes a human-readable summary, one setting per line.
    pub fn print(&self, out: &mut impl Write) -> io::Result<()> {
        writeln!(out, "Current configuration:")?;
        writeln!(out, "server  . . . . . {}", self.server.as_deref().unwrap_or("none"))?;
        writeln!(out, "port  . . . . . . {}", self.port)?;
        writeln!(out, "username  . . . . {}", self.username)?;
        writeln!(
            out,
            "password  . . . . {}",
            if self.password.is_empty() { "none" } else { "***" }
        )?;
        writeln!(out, "identity  . . . . {}", self.identity_url.as_deref().unwrap_or("none"))?;
        writeln!(out, "sudo  . . . . . . {}", self.sudo)?;
        writeln!(out, "guest name  . . . {}", self.guestname)?;
        writeln!(out, "vcpus . . . . . . {}", self.vcpus)?;
        writeln!(out, "memory  . . . . . {}", self.memory)?;
        write!(out, "flags . . . . . .")?;
        for (set, name) in [
            (self.cpu_flags.acpi, "acpi"),
            (self.cpu_flags.apic, "apic"),
            (self.cpu_flags.pae, "pae"),
        ] {
            if set {
                write!(out, " {name}")?;
            }
        }
        writeln!(out)?;
        writeln!(out, "disks . . . . . . {}", self.disks.join(" "))?;
        writeln!(out, "removable . . . . {}", self.removable.join(" "))?;
        writeln!(out, "root disk . . . . {}", self.root_disk.as_deref().unwrap_or("none"))?;
        writeln!(out, "interfaces  . . . {}", self.interfaces.join(" "))?;
        writeln!(out, "network map . . . {}", self.network_map)?;
        writeln!(out, "output  . . . . . {}", self.output.driver)?;
        writeln!(
            out,
            "output alloc  . . {}",
            self.output.allocation.as_arg().unwrap_or("none")
        )?;
        writeln!(
            out,
            "output conn . . . {}",
            self.output.connection.as_deref().unwrap_or("none")
        )?;
        writeln!(
            out,
            "output format . . {}",
            self.output.format.as_deref().unwrap_or("none")
        )?;
        writeln!(
            out,
            "output storage  . {}",
            self.output.storage.as_deref().unwrap_or("none")
        )?;
        Ok(())
    }
}

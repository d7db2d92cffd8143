//! Facts about the machine being converted.
//!
//! Every probe degrades to a conservative default instead of failing: a
//! conversion can still proceed with one vCPU or without interfaces, and the
//! operator can override anything on the kernel command line.

use std::fs;
use std::path::Path;
use std::thread;

use tracing::debug;

use crate::config::CpuFlags;

/// Block device directory in sysfs.
pub const SYS_BLOCK: &str = "/sys/block";

/// Network interface directory in sysfs.
pub const SYS_CLASS_NET: &str = "/sys/class/net";

/// Smallest memory size offered to the guest.
pub const MIN_MEMORY: u64 = 256 << 20;

/// Host name up to the first dot, or `localhost`.
pub fn short_hostname() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|name| name.into_string().ok())
        .and_then(|name| name.split('.').next().map(str::to_owned))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_owned())
}

/// Number of online CPUs, at least one.
pub fn online_cpus() -> u32 {
    thread::available_parallelism()
        .map(|count| u32::try_from(count.get()).unwrap_or(u32::MAX))
        .unwrap_or(1)
}

/// Physical memory rounded up to a power of two, at least [`MIN_MEMORY`].
pub fn guest_memory() -> u64 {
    let total = fs::read_to_string("/proc/meminfo")
        .ok()
        .and_then(|meminfo| mem_total(&meminfo))
        .unwrap_or(MIN_MEMORY);
    round_memory(total)
}

pub(crate) fn round_memory(bytes: u64) -> u64 {
    bytes.max(MIN_MEMORY).checked_next_power_of_two().unwrap_or(bytes)
}

pub(crate) fn mem_total(meminfo: &str) -> Option<u64> {
    let line = meminfo.lines().find(|line| line.starts_with("MemTotal:"))?;
    let kib: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    kib.checked_mul(1024)
}

/// ACPI, APIC and PAE support of the host CPU.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub fn cpu_flags() -> CpuFlags {
    let cpuid = raw_cpuid::CpuId::new();
    cpuid
        .get_feature_info()
        .map(|info| CpuFlags {
            acpi: info.has_acpi(),
            apic: info.has_apic(),
            pae: info.has_pae(),
        })
        .unwrap_or_default()
}

/// ACPI, APIC and PAE support of the host CPU.
#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
pub fn cpu_flags() -> CpuFlags {
    fs::read_to_string("/proc/cpuinfo")
        .map(|cpuinfo| cpuinfo_flags(&cpuinfo))
        .unwrap_or_default()
}

/// Reads feature flags from `/proc/cpuinfo` text. ACPI is assumed present
/// on any machine that boots this way and reports a flags line.
#[cfg_attr(any(target_arch = "x86", target_arch = "x86_64"), allow(dead_code))]
pub(crate) fn cpuinfo_flags(cpuinfo: &str) -> CpuFlags {
    let Some(line) = cpuinfo
        .lines()
        .find(|line| line.starts_with("flags") || line.starts_with("Features"))
    else {
        return CpuFlags::default();
    };
    let words = line.split_once(':').map_or("", |(_, words)| words);
    let has = |flag: &str| words.split_whitespace().any(|word| word == flag);
    CpuFlags {
        acpi: has("acpi") || !words.is_empty(),
        apic: has("apic"),
        pae: has("pae"),
    }
}

/// Block devices found in sysfs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockDevices {
    /// Fixed disks, sorted by name.
    pub disks: Vec<String>,
    /// Removable media, sorted by name.
    pub removable: Vec<String>,
    /// Disk holding the running root filesystem. It is never in `disks`.
    pub root_disk: Option<String>,
}

/// `major:minor` of the device holding `/`, in the form sysfs `dev` files
/// use.
pub fn root_device() -> Option<String> {
    let dev = nix::sys::stat::stat("/").ok()?.st_dev;
    Some(format!(
        "{}:{}",
        nix::sys::stat::major(dev),
        nix::sys::stat::minor(dev)
    ))
}

/// Splits block devices under `sys_block` into fixed disks and removable
/// media.
///
/// A disk whose own `dev` or one of whose partitions' `dev` equals
/// `root_device` is the running system and goes to
/// [`BlockDevices::root_disk`] instead. `cciss!c0d0` style names are
/// reported as `cciss/c0d0`, their path under `/dev`.
pub fn discover_block_devices(
    sys_block: impl AsRef<Path>,
    root_device: Option<&str>,
) -> BlockDevices {
    let sys_block = sys_block.as_ref();
    let mut devices = BlockDevices::default();

    let Ok(entries) = fs::read_dir(sys_block) else {
        debug!(path = %sys_block.display(), "no block device directory");
        return devices;
    };
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        match classify_block_device(&name) {
            DeviceClass::Ignored => {}
            DeviceClass::Optical => devices.removable.push(name),
            DeviceClass::Disk => {
                let dir = entry.path();
                let flag = fs::read_to_string(dir.join("removable")).unwrap_or_default();
                let device = name.replace('!', "/");
                if flag.trim() == "1" {
                    devices.removable.push(device);
                } else if root_device.is_some_and(|root| holds_device(&dir, &name, root)) {
                    debug!(disk = %device, "skipping the disk holding the root filesystem");
                    devices.root_disk = Some(device);
                } else {
                    devices.disks.push(device);
                }
            }
        }
    }

    devices.disks.sort();
    devices.removable.sort();
    debug!(?devices, "discovered block devices");
    devices
}

/// True when `disk_dir` or one of its partitions has device number `device`.
fn holds_device(disk_dir: &Path, name: &str, device: &str) -> bool {
    let is_device = |dir: &Path| {
        fs::read_to_string(dir.join("dev")).is_ok_and(|dev| dev.trim() == device)
    };
    if is_device(disk_dir) {
        return true;
    }
    fs::read_dir(disk_dir).is_ok_and(|entries| {
        entries.flatten().any(|entry| {
            entry.file_name().to_string_lossy().starts_with(name) && is_device(&entry.path())
        })
    })
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum DeviceClass {
    Disk,
    Optical,
    Ignored,
}

pub(crate) fn classify_block_device(name: &str) -> DeviceClass {
    const DISK_PREFIXES: &[&str] = &["sd", "hd", "vd", "xvd", "ubd", "nvme", "mmcblk", "cciss!"];
    if name.starts_with("sr") {
        DeviceClass::Optical
    } else if name.contains("boot") || name.contains("rpmb") {
        DeviceClass::Ignored
    } else if DISK_PREFIXES.iter().any(|prefix| name.starts_with(prefix)) {
        DeviceClass::Disk
    } else {
        DeviceClass::Ignored
    }
}

/// Physical network interfaces under `sys_class_net`, sorted by name.
///
/// Loopback and interfaces without a backing device are skipped.
pub fn discover_interfaces(sys_class_net: impl AsRef<Path>) -> Vec<String> {
    let Ok(entries) = fs::read_dir(sys_class_net.as_ref()) else {
        return Vec::new();
    };
    let mut interfaces: Vec<String> = entries
        .flatten()
        .filter(|entry| entry.file_name() != "lo" && entry.path().join("device").exists())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    interfaces.sort();
    interfaces
}

/// MAC address of `interface`, if sysfs reports one.
pub fn mac_address(sys_class_net: impl AsRef<Path>, interface: &str) -> Option<String> {
    let raw = fs::read_to_string(sys_class_net.as_ref().join(interface).join("address")).ok()?;
    let mac = raw.trim();
    (!mac.is_empty()).then(|| mac.to_owned())
}

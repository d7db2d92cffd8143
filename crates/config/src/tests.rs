use super::host::{self, DeviceClass};
use super::*;
use std::fs;
use std::path::{Path, PathBuf};

#[test]
fn cmdline_splits_keys_and_values() {
    let cmdline = KernelCmdline::parse("BOOT_IMAGE=/vmlinuz ro quiet p2v.server=10.0.0.5");
    assert_eq!(cmdline.len(), 4);
    assert_eq!(cmdline.get("BOOT_IMAGE"), Some("/vmlinuz"));
    assert_eq!(cmdline.get("p2v.server"), Some("10.0.0.5"));
    assert_eq!(cmdline.get("ro"), Some(""));
    assert!(cmdline.contains("quiet"));
    assert_eq!(cmdline.get("p2v.port"), None);
}

#[test]
fn cmdline_quotes_group_whitespace() {
    let cmdline = KernelCmdline::parse(r#"p2v.pre="echo hello world" p2v.post=poweroff"#);
    assert_eq!(cmdline.get("p2v.pre"), Some("echo hello world"));
    assert_eq!(cmdline.get("p2v.post"), Some("poweroff"));
}

#[test]
fn cmdline_unterminated_quote_runs_to_end() {
    let cmdline = KernelCmdline::parse(r#"a=1 p2v.fail="reboot now"#);
    assert_eq!(cmdline.get("p2v.fail"), Some("reboot now"));
}

#[test]
fn cmdline_first_occurrence_wins() {
    let cmdline: KernelCmdline = "x=1 x=2".parse().unwrap();
    assert_eq!(cmdline.get("x"), Some("1"));
}

#[test]
fn cmdline_empty_quotes_make_empty_value() {
    let cmdline = KernelCmdline::parse(r#"p2v.password="" next"#);
    assert_eq!(cmdline.get("p2v.password"), Some(""));
    assert!(cmdline.contains("next"));
}

#[test]
fn apply_requires_server() {
    let mut config = Config::default();
    let err = apply_kernel_cmdline(&mut config, &KernelCmdline::parse("quiet")).unwrap_err();
    assert!(matches!(err, ConfigError::MissingServer));
}

#[test]
fn apply_sets_connection_and_guest_fields() {
    let cmdline = KernelCmdline::parse(
        "p2v.server=conv p2v.port=2222 p2v.username=admin p2v.password=s3cret \
         p2v.sudo p2v.name=web01 p2v.vcpus=4 p2v.memory=4096M \
         p2v.disks=/dev/sda,sdb p2v.removable=sr0 p2v.interfaces=eth0 \
         p2v.network=eth0:ovirtmgmt,lan p2v.o=libvirt p2v.oa=sparse \
         p2v.oc=qemu:///system p2v.of=qcow2 p2v.os=default p2v.debug",
    );
    let mut config = Config::default();
    apply_kernel_cmdline(&mut config, &cmdline).unwrap();

    assert_eq!(config.server.as_deref(), Some("conv"));
    assert_eq!(config.port, 2222);
    assert_eq!(config.username, "admin");
    assert_eq!(config.password.expose(), "s3cret");
    assert!(config.sudo);
    assert_eq!(config.guestname, "web01");
    assert_eq!(config.vcpus, 4);
    assert_eq!(config.memory, 4096 << 20);
    assert_eq!(config.disks, ["sda", "sdb"]);
    assert_eq!(config.removable, ["sr0"]);
    assert_eq!(config.interfaces, ["eth0"]);
    assert_eq!(config.network_map.network_for("eth0"), "ovirtmgmt");
    assert_eq!(config.network_map.network_for("eth1"), "lan");
    assert_eq!(config.output.driver, "libvirt");
    assert_eq!(config.output.allocation, OutputAllocation::Sparse);
    assert_eq!(config.output.connection.as_deref(), Some("qemu:///system"));
    assert_eq!(config.output.format.as_deref(), Some("qcow2"));
    assert_eq!(config.output.storage.as_deref(), Some("default"));
    assert!(config.verbose);
}

#[test]
fn apply_rejects_bad_values() {
    for bad in [
        "p2v.server=s p2v.port=http",
        "p2v.server=s p2v.vcpus=0",
        "p2v.server=s p2v.memory=12",
        "p2v.server=s p2v.oa=thick",
    ] {
        let mut config = Config::default();
        let err = apply_kernel_cmdline(&mut config, &KernelCmdline::parse(bad)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }), "{bad}: {err}");
    }
}

#[test]
fn memory_sizes() {
    assert_eq!(parse_memory("512M").unwrap(), 512 << 20);
    assert_eq!(parse_memory("2G").unwrap(), 2 << 30);
    assert_eq!(parse_memory("3g").unwrap(), 3 << 30);
    assert!(parse_memory("0M").is_err());
    assert!(parse_memory("G").is_err());
    assert!(parse_memory("1T").is_err());
    assert!(parse_memory("").is_err());
}

#[test]
fn device_lists_strip_dev_prefix() {
    assert_eq!(split_device_list("/dev/sda, sdb,,/dev/nvme0n1"), ["sda", "sdb", "nvme0n1"]);
    assert!(split_device_list("").is_empty());
}

#[test]
fn device_path_keeps_absolute_paths() {
    assert_eq!(Config::device_path("sda"), "/dev/sda");
    assert_eq!(Config::device_path("/tmp/disk.img"), "/tmp/disk.img");
}

#[test]
fn network_map_defaults_and_display() {
    let empty = NetworkMap::default();
    assert!(empty.is_empty());
    assert_eq!(empty.network_for("em1"), DEFAULT_NETWORK);

    let map = NetworkMap::parse("em1:mgmt,em1:other,public");
    assert_eq!(map.network_for("em1"), "mgmt");
    assert_eq!(map.network_for("em2"), "public");
    assert_eq!(map.to_string(), "em1:mgmt,em1:other,public");
}

#[test]
fn explicit_mapping_beats_an_earlier_bare_network() {
    let map = NetworkMap::parse("mynet,eth0:other");
    assert_eq!(map.network_for("eth0"), "other");
    assert_eq!(map.network_for("eth1"), "mynet");
}

#[test]
fn password_is_redacted() {
    let password = Password::new("hunter2");
    assert_eq!(format!("{password:?}"), "Password(<redacted>)");
    assert_eq!(format!("{:?}", Password::default()), "Password(<empty>)");
}

#[test]
fn print_hides_password() {
    let mut config = Config::default();
    config.server = Some("conv".to_owned());
    config.password = Password::new("hunter2");
    config.cpu_flags = CpuFlags { acpi: true, apic: false, pae: true };

    let mut out = Vec::new();
    config.print(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("server  . . . . . conv"));
    assert!(text.contains("flags . . . . . . acpi pae\n"));
    assert!(!text.contains("hunter2"));
    assert!(text.contains("root disk . . . . none\n"));
}

#[test]
fn classifies_block_devices() {
    assert_eq!(host::classify_block_device("sda"), DeviceClass::Disk);
    assert_eq!(host::classify_block_device("nvme0n1"), DeviceClass::Disk);
    assert_eq!(host::classify_block_device("sr0"), DeviceClass::Optical);
    assert_eq!(host::classify_block_device("loop0"), DeviceClass::Ignored);
    assert_eq!(host::classify_block_device("dm-0"), DeviceClass::Ignored);
    assert_eq!(host::classify_block_device("mmcblk0boot0"), DeviceClass::Ignored);
    assert_eq!(host::classify_block_device("cciss!c0d0"), DeviceClass::Disk);
}

#[test]
fn discovers_devices_from_sysfs_tree() {
    let root = tempfile::tempdir().unwrap();
    for (name, removable) in [
        ("sdb", "0"),
        ("sda", "0"),
        ("sdc", "1"),
        ("sr0", "1"),
        ("loop0", "0"),
    ] {
        let dir = root.path().join(name);
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("removable"), format!("{removable}\n")).unwrap();
    }

    let devices = host::discover_block_devices(root.path(), None);
    assert_eq!(devices.disks, ["sda", "sdb"]);
    assert_eq!(devices.removable, ["sdc", "sr0"]);
    assert_eq!(devices.root_disk, None);
}

fn block_device(sys_block: &Path, name: &str, dev: &str) -> PathBuf {
    let dir = sys_block.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("dev"), format!("{dev}\n")).unwrap();
    dir
}

#[test]
fn skips_the_disk_holding_the_root_partition() {
    let root = tempfile::tempdir().unwrap();
    let sda = block_device(root.path(), "sda", "8:0");
    block_device(&sda, "sda1", "8:1");
    block_device(&sda, "sda2", "8:2");
    let sdb = block_device(root.path(), "sdb", "8:16");
    block_device(&sdb, "sdb1", "8:17");

    let devices = host::discover_block_devices(root.path(), Some("8:2"));
    assert_eq!(devices.disks, ["sdb"]);
    assert_eq!(devices.root_disk.as_deref(), Some("sda"));
}

#[test]
fn skips_a_whole_disk_root_filesystem() {
    let root = tempfile::tempdir().unwrap();
    block_device(root.path(), "vda", "252:0");
    block_device(root.path(), "vdb", "252:16");

    let devices = host::discover_block_devices(root.path(), Some("252:16"));
    assert_eq!(devices.disks, ["vda"]);
    assert_eq!(devices.root_disk.as_deref(), Some("vdb"));
}

#[test]
fn root_on_a_non_disk_device_keeps_every_disk() {
    let root = tempfile::tempdir().unwrap();
    let sda = block_device(root.path(), "sda", "8:0");
    block_device(&sda, "sda1", "8:1");

    let devices = host::discover_block_devices(root.path(), Some("0:33"));
    assert_eq!(devices.disks, ["sda"]);
    assert_eq!(devices.root_disk, None);
}

#[test]
fn cciss_disks_use_their_dev_path() {
    let root = tempfile::tempdir().unwrap();
    let cciss = block_device(root.path(), "cciss!c0d0", "104:0");
    block_device(&cciss, "cciss!c0d0p1", "104:1");
    block_device(root.path(), "cciss!c0d1", "104:16");

    let devices = host::discover_block_devices(root.path(), Some("104:1"));
    assert_eq!(devices.disks, ["cciss/c0d1"]);
    assert_eq!(devices.root_disk.as_deref(), Some("cciss/c0d0"));
    assert_eq!(Config::device_path("cciss/c0d1"), "/dev/cciss/c0d1");
}

#[test]
fn discovers_physical_interfaces() {
    let root = tempfile::tempdir().unwrap();
    for name in ["lo", "eth1", "eth0", "virbr0"] {
        fs::create_dir(root.path().join(name)).unwrap();
    }
    for name in ["lo", "eth0", "eth1"] {
        fs::create_dir(root.path().join(name).join("device")).unwrap();
    }
    fs::write(root.path().join("eth0").join("address"), "52:54:00:12:34:56\n").unwrap();

    assert_eq!(host::discover_interfaces(root.path()), ["eth0", "eth1"]);
    assert_eq!(
        host::mac_address(root.path(), "eth0").as_deref(),
        Some("52:54:00:12:34:56")
    );
    assert_eq!(host::mac_address(root.path(), "eth1"), None);
}

#[test]
fn memory_rounding() {
    assert_eq!(host::round_memory(1), host::MIN_MEMORY);
    assert_eq!(host::round_memory(3 << 30), 4 << 30);
    assert_eq!(host::round_memory(4 << 30), 4 << 30);
    assert_eq!(
        host::mem_total("MemTotal:       16314248 kB\nMemFree: 1 kB\n"),
        Some(16_314_248 * 1024)
    );
    assert_eq!(host::mem_total("garbage"), None);
}

#[test]
fn cpuinfo_flag_parsing() {
    let flags = host::cpuinfo_flags("processor: 0\nflags\t\t: fpu vme pae apic sep\n");
    assert!(flags.pae && flags.apic && flags.acpi);
    assert_eq!(host::cpuinfo_flags("processor: 0\n"), CpuFlags::default());
}

#[test]
fn detect_produces_usable_defaults() {
    let config = Config::detect();
    assert!(config.vcpus >= 1);
    assert!(config.memory >= host::MIN_MEMORY);
    assert!(config.memory.is_power_of_two());
    assert!(!config.guestname.is_empty());
}

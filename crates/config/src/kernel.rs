use tracing::debug;

use crate::cmdline::KernelCmdline;
use crate::config::{Config, OutputAllocation, Password};
use crate::error::ConfigError;
use crate::network::NetworkMap;

/// Applies the `p2v.*` keys of `cmdline` to `config`.
///
/// Mode keys (`p2v.pre`, `p2v.post`, `p2v.fail`,
/// `p2v.skip_test_connection`) are left for the caller to read.
pub fn apply_kernel_cmdline(
    config: &mut Config,
    cmdline: &KernelCmdline,
) -> Result<(), ConfigError> {
    let server = cmdline
        .get("p2v.server")
        .filter(|server| !server.is_empty())
        .ok_or(ConfigError::MissingServer)?;
    config.server = Some(server.to_owned());

    if let Some(port) = cmdline.get("p2v.port") {
        config.port = port
            .parse()
            .map_err(|_| ConfigError::invalid("p2v.port", port, "not a TCP port number"))?;
    }
    if let Some(username) = cmdline.get("p2v.username") {
        config.username = username.to_owned();
    }
    if let Some(password) = cmdline.get("p2v.password") {
        config.password = Password::new(password);
    }
    if let Some(identity) = cmdline.get("p2v.identity") {
        config.identity_url = Some(identity.to_owned());
    }
    if cmdline.contains("p2v.sudo") {
        config.sudo = true;
    }
    if let Some(name) = cmdline.get("p2v.name") {
        config.guestname = name.to_owned();
    }
    if let Some(vcpus) = cmdline.get("p2v.vcpus") {
        config.vcpus = vcpus
            .parse()
            .ok()
            .filter(|&count| count > 0)
            .ok_or_else(|| ConfigError::invalid("p2v.vcpus", vcpus, "not a positive integer"))?;
    }
    if let Some(memory) = cmdline.get("p2v.memory") {
        config.memory = parse_memory(memory)?;
    }
    if let Some(disks) = cmdline.get("p2v.disks") {
        config.disks = split_device_list(disks);
    }
    if let Some(removable) = cmdline.get("p2v.removable") {
        config.removable = split_device_list(removable);
    }
    if let Some(interfaces) = cmdline.get("p2v.interfaces") {
        config.interfaces = split_device_list(interfaces);
    }
    if let Some(network) = cmdline.get("p2v.network") {
        config.network_map = NetworkMap::parse(network);
    }

    if let Some(driver) = cmdline.get("p2v.o") {
        config.output.driver = driver.to_owned();
    }
    if let Some(allocation) = cmdline.get("p2v.oa") {
        config.output.allocation = match allocation {
            "sparse" => OutputAllocation::Sparse,
            "preallocated" => OutputAllocation::Preallocated,
            _ => {
                return Err(ConfigError::invalid(
                    "p2v.oa",
                    allocation,
                    "expected sparse or preallocated",
                ));
            }
        };
    }
    if let Some(connection) = cmdline.get("p2v.oc") {
        config.output.connection = Some(connection.to_owned());
    }
    if let Some(format) = cmdline.get("p2v.of") {
        config.output.format = Some(format.to_owned());
    }
    if let Some(storage) = cmdline.get("p2v.os") {
        config.output.storage = Some(storage.to_owned());
    }
    if cmdline.contains("p2v.debug") {
        config.verbose = true;
    }

    debug!(server, port = config.port, disks = ?config.disks, "applied kernel command line");
    Ok(())
}

/// Parses `<n>M` or `<n>G` into bytes.
pub fn parse_memory(value: &str) -> Result<u64, ConfigError> {
    let invalid =
        || ConfigError::invalid("p2v.memory", value, "expected a size such as 1024M or 4G");
    let (digits, shift) = match value.as_bytes().last() {
        Some(b'M' | b'm') => (&value[..value.len() - 1], 20),
        Some(b'G' | b'g') => (&value[..value.len() - 1], 30),
        _ => return Err(invalid()),
    };
    let count: u64 = digits.parse().map_err(|_| invalid())?;
    count
        .checked_mul(1 << shift)
        .filter(|&bytes| bytes > 0)
        .ok_or_else(invalid)
}

/// Splits a comma-separated device list, dropping empty items and any
/// leading `/dev/`.
pub fn split_device_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| item.strip_prefix("/dev/").unwrap_or(item).to_owned())
        .collect()
}

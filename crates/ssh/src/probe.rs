use crate::error::VersionError;

/// Oldest usable virt-v2v 1.x minor version.
pub const MIN_V2V_MINOR: u32 = 28;

const RESERVED_OUTPUT: &str = "vdsm";

/// What the conversion server reported about its virt-v2v.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemoteCapabilities {
    /// Version string as printed, e.g. `1.42.0`.
    pub version: String,
    /// Input drivers (`-i`), in the order listed.
    pub input_drivers: Vec<String>,
    /// Output drivers (`-o`), in the order listed.
    pub output_drivers: Vec<String>,
    /// virt-v2v understands `--colours`.
    pub colours_option: bool,
}

impl RemoteCapabilities {
    pub(crate) fn add_input_driver(&mut self, name: String) {
        self.input_drivers.push(name);
    }

    pub(crate) fn add_output_driver(&mut self, name: String) {
        // vdsm is only driven by its own management system.
        if name != RESERVED_OUTPUT {
            self.output_drivers.push(name);
        }
    }
}

/// Major and minor numbers of a virt-v2v version string.
///
/// Only the leading digits of each component count, so `1.40.2rc1` is
/// `(1, 40)`.
pub fn parse_version(version: &str) -> Result<(u32, u32), VersionError> {
    let unparseable = || VersionError::Unparseable(version.to_owned());
    let mut parts = version.trim().splitn(3, '.');
    let major = parts.next().and_then(leading_number).ok_or_else(unparseable)?;
    let minor = parts.next().and_then(leading_number).ok_or_else(unparseable)?;
    Ok((major, minor))
}

/// Checks that `version` is a 1.x release no older than 1.28.
pub fn compatible_version(version: &str) -> Result<(), VersionError> {
    let (major, minor) = parse_version(version)?;
    if major != 1 {
        return Err(VersionError::MajorMismatch {
            version: version.to_owned(),
        });
    }
    if minor < MIN_V2V_MINOR {
        return Err(VersionError::TooOld {
            version: version.to_owned(),
        });
    }
    Ok(())
}

fn leading_number(component: &str) -> Option<u32> {
    let end = component
        .find(|ch: char| !ch.is_ascii_digit())
        .unwrap_or(component.len());
    component[..end].parse().ok()
}

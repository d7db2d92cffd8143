use std::fmt;

/// Network used when nothing else matches.
pub const DEFAULT_NETWORK: &str = "default";

/// Maps local interface names to target network names.
///
/// Parsed from `if:network` entries; a bare entry without a colon sets the
/// network for every interface that has no explicit mapping.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NetworkMap {
    entries: Vec<(String, String)>,
    fallback: Option<String>,
}

impl NetworkMap {
    /// Parses a comma-separated list such as `em1:ovirtmgmt,em2:management,other`.
    pub fn parse(list: &str) -> Self {
        let mut map = Self::default();
        for item in list.split(',').map(str::trim).filter(|item| !item.is_empty()) {
            match item.split_once(':') {
                Some((interface, network)) => {
                    map.entries.push((interface.to_owned(), network.to_owned()));
                }
                None => map.fallback = Some(item.to_owned()),
            }
        }
        map
    }

    /// Target network for `interface`. The first explicit entry wins.
    pub fn network_for(&self, interface: &str) -> &str {
        self.entries
            .iter()
            .find(|(name, _)| name == interface)
            .map(|(_, network)| network.as_str())
            .or(self.fallback.as_deref())
            .unwrap_or(DEFAULT_NETWORK)
    }

    /// True when no entries were given.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.fallback.is_none()
    }
}

impl fmt::Display for NetworkMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (interface, network) in &self.entries {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{interface}:{network}")?;
            first = false;
        }
        if let Some(fallback) = &self.fallback {
            if !first {
                f.write_str(",")?;
            }
            f.write_str(fallback)?;
        }
        Ok(())
    }
}

use std::fs;
use std::path::Path;
use std::str::FromStr;

use tracing::warn;

use crate::error::ConfigError;

/// Location of the running kernel's command line.
pub const PROC_CMDLINE: &str = "/proc/cmdline";

/// A parsed kernel command line.
///
/// Items are separated by whitespace. Each item is either `key` or
/// `key=value`; double quotes group whitespace into a single item and are
/// removed. An unterminated quote runs to the end of the line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KernelCmdline {
    entries: Vec<(String, Option<String>)>,
}

impl KernelCmdline {
    /// Parses `line`.
    pub fn parse(line: &str) -> Self {
        let mut entries = Vec::new();
        let mut token = String::new();
        let mut in_token = false;
        let mut quoted = false;

        for ch in line.chars() {
            match ch {
                '"' => {
                    quoted = !quoted;
                    in_token = true;
                }
                c if c.is_whitespace() && !quoted => {
                    if in_token {
                        entries.push(split_item(&token));
                        token.clear();
                        in_token = false;
                    }
                }
                c => {
                    token.push(c);
                    in_token = true;
                }
            }
        }
        if quoted {
            warn!(cmdline = line, "unterminated quote on kernel command line");
        }
        if in_token {
            entries.push(split_item(&token));
        }

        Self { entries }
    }

    /// Reads and parses a command line file such as [`PROC_CMDLINE`].
    pub fn read(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&text))
    }

    /// Value of the first occurrence of `key`. A key given without `=`
    /// yields an empty value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_deref().unwrap_or(""))
    }

    /// True when `key` appears at all.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(name, _)| name == key)
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True for an empty command line.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromStr for KernelCmdline {
    type Err = std::convert::Infallible;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(line))
    }
}

fn split_item(item: &str) -> (String, Option<String>) {
    match item.split_once('=') {
        Some((key, value)) => (key.to_owned(), Some(value.to_owned())),
        None => (item.to_owned(), None),
    }
}

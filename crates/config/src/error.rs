use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building a [`Config`](crate::Config).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Kernel command line mode needs a conversion server.
    #[error("p2v.server must be set on the kernel command line")]
    MissingServer,

    /// A key carried a value that cannot be used.
    #[error("{key}: invalid value {value:?}: {reason}")]
    InvalidValue {
        /// Offending key, such as `p2v.port`.
        key: String,
        /// Raw value as given.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Reading host information failed.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        /// File or directory being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, value: &str, reason: &'static str) -> Self {
        Self::InvalidValue {
            key: key.to_owned(),
            value: value.to_owned(),
            reason,
        }
    }
}

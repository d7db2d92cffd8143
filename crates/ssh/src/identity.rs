use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tempfile::NamedTempFile;
use tracing::debug;
use url::Url;

use crate::error::SshError;

const FETCHABLE_SCHEMES: &[&str] = &["http", "https", "ftp", "ftps", "file"];

/// Resolves the configured identity to a local private key file.
///
/// Identities given as URLs are downloaded once with `curl` into a private
/// temporary file and reused for later connections. The file is deleted
/// when the cache is dropped.
#[derive(Debug)]
pub struct IdentityCache {
    fetcher: OsString,
    cached: Option<(String, NamedTempFile)>,
}

impl Default for IdentityCache {
    fn default() -> Self {
        Self::new("curl")
    }
}

impl IdentityCache {
    /// Uses `fetcher` (normally `curl`) for downloads.
    pub fn new(fetcher: impl Into<OsString>) -> Self {
        Self {
            fetcher: fetcher.into(),
            cached: None,
        }
    }

    /// Local path of the identity named by `location`.
    pub fn resolve(&mut self, location: &str) -> Result<PathBuf, SshError> {
        if !is_fetchable(location) {
            return Ok(PathBuf::from(location));
        }
        if let Some((url, file)) = &self.cached {
            if url == location {
                return Ok(file.path().to_path_buf());
            }
        }

        let file = tempfile::Builder::new()
            .prefix("id.")
            .tempfile()
            .map_err(|err| identity_error(location, err.to_string()))?;
        self.fetch(location, file.path())?;
        let path = file.path().to_path_buf();
        self.cached = Some((location.to_owned(), file));
        Ok(path)
    }

    fn fetch(&self, location: &str, target: &Path) -> Result<(), SshError> {
        debug!(url = location, path = %target.display(), "downloading ssh identity");
        let output = Command::new(&self.fetcher)
            .args(["-f", "-s", "-S", "-o"])
            .arg(target)
            .arg(location)
            .stdin(Stdio::null())
            .output()
            .map_err(|err| identity_error(location, err.to_string()))?;
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr.trim();
            Err(identity_error(
                location,
                if reason.is_empty() {
                    format!("download failed ({})", output.status)
                } else {
                    reason.to_owned()
                },
            ))
        }
    }
}

fn is_fetchable(location: &str) -> bool {
    Url::parse(location).is_ok_and(|url| FETCHABLE_SCHEMES.contains(&url.scheme()))
}

fn identity_error(location: &str, reason: String) -> SshError {
    SshError::Identity {
        url: location.to_owned(),
        reason,
    }
}

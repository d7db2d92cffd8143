use std::fmt;

/// Progress reported while a conversion runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    /// A step of the conversion has started.
    Status(String),
    /// Directory on the conversion server holding the logs of this run.
    LogDir(String),
    /// Output from virt-v2v, already filtered for display.
    RemoteMessage(String),
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => f.write_str(status),
            Self::LogDir(dir) => write!(
                f,
                "Log files and other useful information are in {dir} on the conversion server"
            ),
            Self::RemoteMessage(text) => f.write_str(text),
        }
    }
}

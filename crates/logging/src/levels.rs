//! Mapping from the `-v` count to a log level.

use tracing::level_filters::LevelFilter;

/// How much diagnostic output the operator asked for.
///
/// Each `-v` on the command line (or `p2v.debug` on the kernel command line)
/// moves one step down the list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Warnings and errors only.
    #[default]
    Quiet,
    /// Progress of the conversion steps.
    Info,
    /// Commands spawned, ports chosen, prompts matched.
    Debug,
    /// Everything, including raw expect traffic.
    Trace,
}

impl Verbosity {
    /// Maps a repeat count of `-v` to a verbosity. Counts past three
    /// saturate at [`Verbosity::Trace`].
    #[must_use]
    pub const fn from_count(count: u8) -> Self {
        match count {
            0 => Self::Quiet,
            1 => Self::Info,
            2 => Self::Debug,
            _ => Self::Trace,
        }
    }

    /// The most detailed level that is shown.
    #[must_use]
    pub const fn level_filter(self) -> LevelFilter {
        match self {
            Self::Quiet => LevelFilter::WARN,
            Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }

    /// True from [`Verbosity::Info`] on.
    #[must_use]
    pub const fn is_verbose(self) -> bool {
        !matches!(self, Self::Quiet)
    }
}

impl From<u8> for Verbosity {
    fn from(count: u8) -> Self {
        Self::from_count(count)
    }
}

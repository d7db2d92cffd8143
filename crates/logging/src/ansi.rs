//! Coloured markers for messages shown to the operator.
//!
//! Kernel command line mode runs on a bare console; the outcome of the
//! conversion is highlighted so it can be spotted among virt-v2v's output.

use is_terminal::IsTerminal;

const RESET: &str = "\x1b[0m";

/// What a highlighted message reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Marker {
    /// The conversion finished.
    Success,
    /// Something failed.
    Error,
    /// A step started.
    Status,
}

impl Marker {
    const fn code(self) -> &'static str {
        match self {
            Self::Success => "\x1b[0;32m",
            Self::Error => "\x1b[1;31m",
            Self::Status => "\x1b[1;34m",
        }
    }
}

/// Applies [`Marker`] colours when they are wanted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Painter {
    enabled: bool,
}

impl Painter {
    /// A painter that always (`true`) or never (`false`) colours.
    #[must_use]
    pub const fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Colours when `force` is set or `stream` is a terminal.
    #[must_use]
    pub fn detect<S: IsTerminal>(force: bool, stream: S) -> Self {
        Self::new(force || stream.is_terminal())
    }

    /// Whether [`paint`](Self::paint) adds escape sequences.
    #[must_use]
    pub const fn enabled(self) -> bool {
        self.enabled
    }

    /// `text` wrapped in the colour for `marker`, or unchanged.
    #[must_use]
    pub fn paint(self, marker: Marker, text: &str) -> String {
        if self.enabled {
            format!("{}{text}{RESET}", marker.code())
        } else {
            text.to_owned()
        }
    }
}

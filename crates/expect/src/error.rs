use std::io;

use thiserror::Error;

/// Failure to compile or evaluate a [`Pattern`](crate::Pattern).
#[derive(Debug, Error)]
pub enum PatternError {
    /// The pattern is not a valid regular expression.
    #[error("invalid pattern {pattern:?}: {source}")]
    Syntax {
        /// Source text of the rejected pattern.
        pattern: String,
        /// Error reported by the full-match compiler.
        #[source]
        source: regex::Error,
    },

    /// The partial-match automaton could not be built.
    #[error("cannot build partial matcher for {pattern:?}: {source}")]
    Automaton {
        /// Source text of the rejected pattern.
        pattern: String,
        /// Error reported by the automaton builder.
        #[source]
        source: Box<regex_automata::hybrid::BuildError>,
    },

    /// The matcher gave up while scanning the buffer.
    #[error("matching {pattern:?} failed: {reason}")]
    Search {
        /// Source text of the pattern being evaluated.
        pattern: String,
        /// Engine diagnostic.
        reason: String,
    },
}

/// Failure of an [`ExpectHandle`](crate::ExpectHandle) operation.
#[derive(Debug, Error)]
pub enum ExpectError {
    /// The program could not be started on a pseudo-terminal.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        /// Program that was being started.
        program: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Reading from or writing to the pty failed.
    #[error("pty I/O error: {0}")]
    Io(#[from] io::Error),

    /// A pattern in the table could not be evaluated.
    #[error(transparent)]
    Regex(#[from] PatternError),
}

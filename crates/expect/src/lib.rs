#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `expect` runs a child process with its standard streams attached to a
//! pseudo-terminal and offers a blocking "read until one of these patterns
//! matches" primitive over the merged output. It is the engine underneath the
//! SSH session driver: password prompts, shell prompts and progress lines
//! are all recognised by matching regular expressions against a growing
//! buffer of pty output.
//!
//! # Design
//!
//! - [`ExpectHandle`] owns the pty master and the child. It is created by
//!   [`ExpectHandle::spawn`] and consumed by [`ExpectHandle::close`], so a
//!   handle cannot be closed twice. Dropping an unclosed handle hangs up the
//!   terminal and reaps the child.
//! - [`Pattern`] pairs a byte-oriented [`regex`] for full matches with an
//!   anchored lazy DFA from [`regex_automata`] that answers the soft partial
//!   question: "could the tail of this buffer become a match if more bytes
//!   arrived?".
//! - [`ExpectHandle::expect`] takes a table of `(tag, pattern)` pairs. The
//!   first pattern in table order that matches wins. When nothing matches
//!   but some pattern partially matches the tail, the buffer is kept so a
//!   match can straddle several reads; otherwise it is discarded.
//!
//! # Invariants
//!
//! - [`ExpectHandle::next_match`] is either `None` (the buffer is cleared
//!   before the next read) or an offset no larger than the buffer length
//!   marking the first byte after the last successful match.
//! - The timeout of an `expect` call is an overall deadline measured on the
//!   monotonic clock, not a per-read timeout.
//! - `EIO` from the pty master means every slave descriptor is closed and is
//!   reported as end of file.
//!
//! # Errors
//!
//! Pattern compilation fails with [`PatternError`]. Matching and I/O failures
//! surface as [`ExpectError`]; end of file and timeouts are ordinary
//! [`Expected`] outcomes rather than errors.
//!
//! # Examples
//!
//! ```no_run
//! use expect::{Expected, ExpectHandle, Pattern};
//!
//! let prompt = Pattern::new("ready> ")?;
//! let mut handle = ExpectHandle::spawn("sh", ["-c", "printf 'ready> '; read x"])?;
//! match handle.expect(&[(1, &prompt)])? {
//!     Expected::Matched { tag: 1, .. } => handle.send("done\n")?,
//!     other => panic!("unexpected {other:?}"),
//! };
//! let status = handle.close()?;
//! assert!(status.success());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod buffer;
mod error;
mod handle;
mod pattern;

pub use buffer::Captures;
pub use error::{ExpectError, PatternError};
pub use handle::{
    DEFAULT_READ_SIZE, DEFAULT_TIMEOUT, ExpectHandle, Expected, INTERRUPT, ReadOutcome,
};
pub use pattern::Pattern;

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `platform` is the only crate in the workspace that is allowed to contain
//! `unsafe` code. It wraps the handful of operations that have to run in the
//! forked child between `fork` and `exec`, and the descriptor juggling needed
//! to hand pre-opened sockets to a child process.
//!
//! # Design
//!
//! - [`terminal`] attaches the pseudo-terminal slave that a
//!   [`Command`](std::process::Command) uses for stdio as the child's
//!   controlling terminal, and marks descriptors close-on-exec.
//! - [`fds`] implements the socket-activation descriptor layout: listeners are
//!   placed at descriptor 3 onwards in the child and nowhere else.
//! - [`signal`] sends signals to children by process id and wires
//!   termination signals into a shared flag.
//!
//! # Invariants
//!
//! - Closures installed with `pre_exec` only call async-signal-safe functions.
//! - Descriptors handed to children are duplicated above the target range in
//!   the parent first, so placing them in the child never clobbers a source.
//!
//! # Errors
//!
//! All functions report failures as [`std::io::Error`] values carrying the
//! underlying `errno`.

#[cfg(unix)]
pub mod fds;
#[cfg(unix)]
pub mod signal;
#[cfg(unix)]
pub mod terminal;

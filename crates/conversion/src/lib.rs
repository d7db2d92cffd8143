#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `conversion` runs a whole physical-to-virtual conversion: it exports
//! every disk through a local NBD server and an ssh reverse forward,
//! uploads a description of the machine and a wrapper script to a fresh
//! directory on the conversion server, starts virt-v2v there and relays
//! its output until it finishes.
//!
//! # Design
//!
//! - [`ConversionSession`] owns the [`Config`](config::Config) and the
//!   [`SshDriver`](ssh::SshDriver). [`ConversionSession::run`] takes a
//!   [`CancelToken`] and a callback receiving [`Notification`]s, and
//!   returns a typed result instead of setting global state.
//! - [`physical_xml`] writes the libvirt-shaped machine description with
//!   `quick-xml`; [`wrapper_script`] writes the bash wrapper around
//!   `virt-v2v` that records its exit status and log.
//! - [`OutputFilter`] turns terminal output into display text across
//!   chunk boundaries.
//! - Output is read with a one second poll, so a cancellation is noticed
//!   even while virt-v2v is quiet. Cancelling sends `^C` through the
//!   control connection once and waits for the remote side to hang up.
//!
//! # Invariants
//!
//! - One operation per session at a time.
//! - Data connections are closed before their NBD servers are stopped,
//!   on every return path.
//! - The remote directory is never removed.
//!
//! # Errors
//!
//! [`ConversionError::class`] sorts failures the same way as
//! [`SshError::class`](ssh::SshError::class); cancellation is
//! [`ErrorClass::Cancelled`], never an I/O error.

mod cancel;
mod data;
mod diagnostics;
mod error;
mod filter;
mod notify;
mod physical;
mod remote_dir;
mod session;
mod wrapper;

pub use cancel::CancelToken;
pub use diagnostics::{DiagnosticCommand, capture_diagnostics, default_diagnostics};
pub use error::ConversionError;
pub use filter::OutputFilter;
pub use notify::Notification;
pub use physical::{PHYSICAL_XML, physical_xml};
pub use remote_dir::{DEFAULT_REMOTE_TMP, remote_dir_name};
pub use session::{CANCEL_DRAIN_TIMEOUT, ConversionSession, POLL_INTERVAL};
pub use ssh::ErrorClass;
pub use wrapper::{CONVERSION_LOG, FAILURE_TAIL_LINES, WRAPPER_SCRIPT, v2v_command, wrapper_script};

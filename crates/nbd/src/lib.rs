#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `nbd` runs the local NBD servers that export each physical disk,
//! read-only, to the conversion server through an ssh reverse forward.
//! Either `qemu-nbd` or `nbdkit` is used, optionally with socket
//! activation.
//!
//! # Design
//!
//! - [`NbdServerKind`] names a server and whether it is socket activated;
//!   [`parse_nbd_option`] reads the `--nbd` list and [`select_server`]
//!   picks the first kind whose program answers `--version`.
//! - [`NbdServer::start`] spawns one server for one device. With socket
//!   activation the listening sockets are bound here first and passed to
//!   the server at descriptor 3 onwards, so the port can never be taken
//!   between the check and the bind.
//! - [`wait_for_ready`] connects to the port until the server greets with
//!   `NBDMAGIC` or the deadline passes.
//!
//! # Invariants
//!
//! - Servers are always started read-only.
//! - Dropping an [`NbdServer`] sends `SIGTERM` and reaps the process.
//!
//! # Errors
//!
//! Every failure is an [`NbdError`] carrying the port or program involved.

mod error;
mod kind;
mod ready;
mod server;

pub use error::NbdError;
pub use kind::{DEFAULT_SERVERS, NbdPrograms, NbdServerKind, parse_nbd_option, select_server};
pub use ready::{NBD_MAGIC, READY_POLL_INTERVAL, READY_TIMEOUT, wait_for_ready};
pub use server::NbdServer;

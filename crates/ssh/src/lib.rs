#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `ssh` talks to a virt-v2v conversion server by running the system `ssh`
//! client on a pseudo-terminal and reading its output with the
//! [`expect`] engine. Nothing structured crosses the wire: passwords are
//! typed at prompts, the remote shell is recognised by a random prompt
//! token, and results are scraped from command output with regular
//! expressions.
//!
//! # Design
//!
//! - [`SshDriver`] owns what outlives a single connection: the program
//!   names, the cached identity file and the local data port counter.
//! - [`Session`] is one running `ssh` process. Its [`SessionState`] moves
//!   through `Spawned`, `AuthWait`, `ShellSync`, `Ready` and `Closed`;
//!   illegal moves are rejected rather than silently ignored.
//! - [`SshDriver::test_connection`] probes the remote virt-v2v version and
//!   features and returns them as [`RemoteCapabilities`].
//! - [`SshDriver::open_data_connection`] asks ssh for a reverse port forward
//!   and parses the remote port it allocated.
//! - [`SshDriver::start_remote_connection`] creates the remote working
//!   directory and uploads files through quoted heredocs whose delimiter
//!   never occurs in the uploaded bytes.
//!
//! # Invariants
//!
//! - A prompt only counts as synchronised when its token equals the one
//!   most recently sent; stale prompts from shell start-up are skipped.
//! - The prompt markers are split by quotes in the command that sets them,
//!   so the echoed command cannot match the prompt pattern.
//! - Failures are returned, never retried, except for the bounded prompt
//!   resynchronisation loop.
//!
//! # Errors
//!
//! Every failure is an [`SshError`]; [`SshError::class`] sorts it into the
//! I/O, protocol, timeout or internal bucket so callers can phrase advice.

mod command;
mod driver;
mod error;
mod forward;
mod identity;
mod patterns;
mod probe;
pub mod quote;
mod session;
mod state;
mod token;
mod upload;

pub use command::{AuthMethod, SshCommand};
pub use driver::SshDriver;
pub use error::{ErrorClass, SshError, VersionError};
pub use forward::{DataConnection, FIXED_PORT_BASE, PortAllocator};
pub use identity::IdentityCache;
pub use probe::{MIN_V2V_MINOR, RemoteCapabilities, compatible_version, parse_version};
pub use session::{PROMPT_ATTEMPTS, PROMPT_TIMEOUT, Session};
pub use state::SessionState;
pub use token::{heredoc_delimiter, random_token};
pub use upload::{RemoteFile, heredoc_command};

#[cfg(test)]
mod tests;

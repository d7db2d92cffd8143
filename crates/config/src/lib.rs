#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `config` describes what is being converted and where it is sent: the
//! conversion server connection, the guest's shape (name, vCPUs, memory, CPU
//! feature flags), the local disks, removable media and network interfaces,
//! and the virt-v2v output options.
//!
//! # Design
//!
//! - [`Config`] is a plain owned value. [`Config::detect`] fills it from the
//!   running host; [`Config::default`] gives the same defaults without
//!   touching the host, which keeps tests deterministic.
//! - [`KernelCmdline`] parses `key=value` items the way the boot loader
//!   passes them, and [`apply_kernel_cmdline`] maps the `p2v.*` keys onto a
//!   [`Config`].
//! - [`NetworkMap`] resolves a local interface name to the target network.
//! - [`Password`] zeroizes its contents on drop and redacts itself in debug
//!   output.
//!
//! # Errors
//!
//! Parsing and host inspection failures are reported as [`ConfigError`].
//!
//! # Examples
//!
//! ```
//! use config::{Config, KernelCmdline, apply_kernel_cmdline};
//!
//! let cmdline = KernelCmdline::parse("quiet p2v.server=conv.example.com p2v.memory=2G");
//! let mut config = Config::default();
//! apply_kernel_cmdline(&mut config, &cmdline).unwrap();
//! assert_eq!(config.server.as_deref(), Some("conv.example.com"));
//! assert_eq!(config.memory, 2 << 30);
//! ```

mod cmdline;
mod config;
mod error;
pub mod host;
mod kernel;
mod network;

pub use cmdline::{KernelCmdline, PROC_CMDLINE};
pub use config::{Config, CpuFlags, OutputAllocation, OutputConfig, Password};
pub use error::ConfigError;
pub use kernel::{apply_kernel_cmdline, parse_memory, split_device_list};
pub use network::{DEFAULT_NETWORK, NetworkMap};

#[cfg(test)]
mod tests;

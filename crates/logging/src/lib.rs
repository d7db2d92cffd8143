#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `logging` owns the process-wide diagnostic set-up of `virt-p2v`. The
//! library crates emit structured events with the `tracing` macros and never
//! print; this crate installs the subscriber that renders those events and
//! provides the colour markers used for operator-facing outcome messages.
//!
//! # Design
//!
//! - [`Verbosity`] maps the repeat count of `-v` onto a
//!   [`LevelFilter`](tracing::level_filters::LevelFilter): none shows
//!   warnings, one adds progress, two adds debugging detail and three or more
//!   enable tracing.
//! - [`init_tracing`] installs a `tracing-subscriber` `fmt` layer on standard
//!   error behind an `EnvFilter`. The [`LOG_ENV_VAR`] environment variable
//!   overrides the level chosen on the command line.
//! - [`ansi::Painter`] wraps messages in colour escape sequences only when
//!   colour was forced or the output stream is a terminal.
//!
//! # Invariants
//!
//! - Log output goes to standard error; standard output carries only the
//!   relayed conversion output and the final outcome.
//! - The subscriber is installed at most once per process.
//!
//! # Errors
//!
//! [`init_tracing`] returns [`TryInitError`](tracing_subscriber::util::TryInitError)
//! when another global subscriber is already installed.
//!
//! # Examples
//!
//! ```
//! use logging::Verbosity;
//! use logging::ansi::{Marker, Painter};
//! use tracing::level_filters::LevelFilter;
//!
//! assert_eq!(Verbosity::from_count(2).level_filter(), LevelFilter::DEBUG);
//! assert_eq!(Painter::new(false).paint(Marker::Error, "failed"), "failed");
//! ```

pub mod ansi;
mod levels;
mod tracing_bridge;

pub use levels::Verbosity;
pub use tracing_bridge::{LOG_ENV_VAR, build_filter, init_tracing};

//! Subscriber installation for the `virt-p2v` binary.
//!
//! Library crates only emit events through the `tracing` macros; this module
//! decides where they go. Events are written to standard error so that they
//! never interleave with the conversion output relayed on standard output.

use std::env;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

use crate::levels::Verbosity;

/// Environment variable holding `EnvFilter` directives. When set and not
/// empty it replaces the level chosen by `-v`.
pub const LOG_ENV_VAR: &str = "VIRT_P2V_LOG";

/// Builds the filter for `verbosity`, honouring `directives` taken from
/// [`LOG_ENV_VAR`].
///
/// Directives that fail to parse are skipped; if none survive, the level
/// for `verbosity` applies.
#[must_use]
pub fn build_filter(verbosity: Verbosity, directives: Option<&str>) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(verbosity.level_filter().into())
        .parse_lossy(directives.unwrap_or_default())
}

/// Installs the global subscriber for a process run with `verbosity`
/// repetitions of `-v`.
///
/// `colour` enables ANSI styling of level names. Fails if a global
/// subscriber is already installed.
pub fn init_tracing(verbosity: u8, colour: bool) -> Result<(), TryInitError> {
    let directives = env::var(LOG_ENV_VAR).ok();
    let filter = build_filter(Verbosity::from_count(verbosity), directives.as_deref());
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(colour)
        .with_target(verbosity >= 2);

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
}

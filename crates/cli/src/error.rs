use std::io;
use std::process::ExitStatus;

use config::ConfigError;
use conversion::ConversionError;
use nbd::NbdError;
use thiserror::Error;

/// Why `virt-p2v` stopped before finishing a conversion.
#[derive(Debug, Error)]
pub enum CliError {
    /// Neither the kernel command line nor `--cmdline` names a server.
    #[error(
        "no conversion server given: boot with p2v.server=SERVER on the kernel command line \
         or pass --cmdline (the graphical interface is not available)"
    )]
    NoServer,

    /// A `p2v.*` key could not be applied.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// No usable NBD server.
    #[error(transparent)]
    Nbd(#[from] NbdError),

    /// SIGINT and SIGTERM could not be wired to cancellation.
    #[error("cannot install signal handlers: {0}")]
    Signals(#[source] io::Error),

    /// A `p2v.pre`, `p2v.post` or `p2v.fail` command could not be started.
    #[error("{hook}: cannot run {command:?}: {source}")]
    HookSpawn {
        /// Kernel command line key.
        hook: &'static str,
        /// Shell command given.
        command: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// A hook command exited unsuccessfully.
    #[error("{hook}: unexpected failure of external command ({status})")]
    HookFailed {
        /// Kernel command line key.
        hook: &'static str,
        /// How the command exited.
        status: ExitStatus,
    },

    /// Logging in to the conversion server and checking virt-v2v failed.
    #[error("error opening control connection to {server}:{port}: {source}")]
    Connection {
        /// Conversion server.
        server: String,
        /// SSH port.
        port: u16,
        /// Underlying error.
        #[source]
        source: ConversionError,
    },

    /// The conversion itself failed.
    #[error("error during conversion: {0}")]
    Conversion(#[source] ConversionError),

    /// SIGINT or SIGTERM stopped the conversion. Reported as a status, not
    /// as a failure.
    #[error("conversion cancelled by user")]
    Cancelled,
}

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// Failure to choose, start or reach a local NBD server.
#[derive(Debug, Error)]
pub enum NbdError {
    /// `--nbd` was given an empty list.
    #[error("--nbd option cannot be empty")]
    EmptyOption,

    /// `--nbd` named a server this program does not know.
    #[error("--nbd: unknown server: {0}")]
    UnknownServer(String),

    /// None of the candidate servers is installed and working.
    #[error(
        "no working NBD server was found, cannot continue; please check the --nbd option"
    )]
    NoWorkingServer,

    /// The server process could not be started.
    #[error("cannot start {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The server exited before it accepted a connection.
    #[error("{program} exited before accepting connections ({status})")]
    Exited {
        /// Server program.
        program: &'static str,
        /// How it exited.
        status: ExitStatus,
    },

    /// Listening sockets for socket activation could not be created.
    #[error("cannot listen on localhost port {port}: {source}")]
    Listen {
        /// Port being bound.
        port: u16,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Nothing accepted connections on the port in time.
    #[error("timed out after {timeout:?} waiting for NBD server to start on port {port}")]
    NotReady {
        /// Port being probed.
        port: u16,
        /// How long was waited.
        timeout: Duration,
    },

    /// The server accepted the connection but did not greet properly.
    #[error("waiting for NBD server to start: 'NBDMAGIC' was not received from NBD server")]
    BadMagic {
        /// Port being probed.
        port: u16,
    },

    /// Reading the greeting failed.
    #[error("waiting for NBD server to start on port {port}: {source}")]
    Io {
        /// Port being probed.
        port: u16,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

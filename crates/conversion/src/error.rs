use std::io;

use expect::ExpectError;
use nbd::NbdError;
use ssh::{ErrorClass, SshError};
use thiserror::Error;

/// Failure of a conversion run.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// Another run or connection test is using this session.
    #[error("a conversion is already running")]
    AlreadyRunning,

    /// The configuration selects no disks.
    #[error("no disks were selected for conversion")]
    NoDisks,

    /// A connection test failed.
    #[error(transparent)]
    Ssh(#[from] SshError),

    /// The NBD server for a disk could not be started or reached.
    #[error("{disk}: {source}")]
    Nbd {
        /// Disk being exported.
        disk: String,
        /// Underlying error.
        #[source]
        source: NbdError,
    },

    /// The reverse forward for a disk could not be set up.
    #[error("could not open data connection over SSH to the conversion server: {0}")]
    DataConnection(#[source] SshError),

    /// The session running virt-v2v could not be set up.
    #[error("could not open control connection over SSH to the conversion server: {0}")]
    ControlConnection(#[source] SshError),

    /// The physical machine description could not be written.
    #[error("cannot generate libvirt XML: {0}")]
    Xml(#[from] quick_xml::Error),

    /// The remote directory date could not be formatted.
    #[error("cannot format remote directory date: {0}")]
    Date(#[from] time::error::Format),

    /// Reading virt-v2v output failed.
    #[error("reading from the control connection: {0}")]
    Stream(#[source] ExpectError),

    /// Writing to the control connection failed.
    #[error("writing to the control connection: {0}")]
    Send(#[source] io::Error),

    /// Closing the control connection failed.
    #[error("closing the control connection: {0}")]
    Close(#[source] SshError),

    /// virt-v2v ran and failed.
    #[error("virt-v2v exited with status {status}")]
    V2vFailed {
        /// Exit status of the remote wrapper.
        status: i32,
    },

    /// The operator cancelled the conversion.
    #[error("cancelled by user")]
    Cancelled,
}

impl ConversionError {
    /// Category of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Cancelled => ErrorClass::Cancelled,
            Self::Ssh(err)
            | Self::DataConnection(err)
            | Self::ControlConnection(err)
            | Self::Close(err) => err.class(),
            Self::Nbd { source, .. } => match source {
                NbdError::NotReady { .. } => ErrorClass::Timeout,
                NbdError::EmptyOption | NbdError::UnknownServer(_) => ErrorClass::Internal,
                NbdError::BadMagic { .. } => ErrorClass::Protocol,
                _ => ErrorClass::Io,
            },
            Self::Stream(ExpectError::Regex(_))
            | Self::AlreadyRunning
            | Self::Xml(_)
            | Self::Date(_) => ErrorClass::Internal,
            Self::Stream(_) | Self::Send(_) => ErrorClass::Io,
            Self::NoDisks | Self::V2vFailed { .. } => ErrorClass::Protocol,
        }
    }
}

use std::io;
use std::process::ExitStatus;

use expect::ExpectError;
use thiserror::Error;

use crate::state::SessionState;

/// Broad category of a failure, used to choose advice for the operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// A process or system call failed.
    Io,
    /// The remote side answered but not acceptably: bad credentials,
    /// sudo configuration, an incompatible virt-v2v.
    Protocol,
    /// The remote side never reached the expected state.
    Timeout,
    /// Something that should not happen; report it as a bug.
    Internal,
    /// The operator stopped the operation. Not a failure.
    Cancelled,
}

/// Why a virt-v2v version string is unusable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionError {
    /// The string is not `<major>.<minor>...`.
    #[error("cannot parse virt-v2v version string ({0})")]
    Unparseable(String),

    /// Only virt-v2v 1.x speaks this protocol.
    #[error(
        "virt-v2v major version is not 1 (\"{version}\"), this version of virt-p2v is not compatible"
    )]
    MajorMismatch {
        /// Reported version.
        version: String,
    },

    /// virt-v2v before 1.28 lacks the features used here.
    #[error(
        "virt-v2v version is < 1.28 (\"{version}\"), you must upgrade to virt-v2v >= 1.28 on the conversion server"
    )]
    TooOld {
        /// Reported version.
        version: String,
    },
}

/// Failure of an SSH session operation.
#[derive(Debug, Error)]
pub enum SshError {
    /// The configuration names no conversion server.
    #[error("no conversion server was specified")]
    NoServer,

    /// The expect engine failed to spawn ssh or read its output.
    #[error(transparent)]
    Expect(#[from] ExpectError),

    /// Writing to ssh failed.
    #[error("failed to write to ssh: {0}")]
    Send(#[from] io::Error),

    /// The identity could not be fetched.
    #[error("cannot download identity {url}: {reason}")]
    Identity {
        /// Identity location.
        url: String,
        /// What went wrong.
        reason: String,
    },

    /// Authentication failed; the text is ssh's own explanation when it
    /// printed one.
    #[error("{0}")]
    Authentication(String),

    /// The remote side closed the connection early.
    #[error("ssh closed the connection while waiting for {waiting_for}")]
    UnexpectedEof {
        /// Stage being waited for.
        waiting_for: &'static str,
    },

    /// The remote side did not answer in time.
    #[error("timeout waiting for {waiting_for}")]
    Timeout {
        /// Stage being waited for.
        waiting_for: &'static str,
    },

    /// `sudo -n` refused to run without a password.
    #[error(
        "sudo for user \"{user}\" requires a password. Edit /etc/sudoers on the conversion server to ensure the \"NOPASSWD:\" option is set for this user."
    )]
    SudoPasswordRequired {
        /// Remote user.
        user: String,
    },

    /// `virt-v2v --version` printed nothing recognisable.
    #[error(
        "virt-v2v is not installed on the conversion server, or it might be a too old version"
    )]
    V2vNotInstalled,

    /// The remote virt-v2v cannot be used.
    #[error(transparent)]
    IncompatibleVersion(#[from] VersionError),

    /// `virt-v2v --machine-readable` lacked the `libguestfs-rewrite` marker.
    #[error(
        "invalid output of \"virt-v2v --machine-readable\" command; the conversion server virt-v2v is probably too old"
    )]
    MissingRewriteMarker,

    /// ssh printed a remote port that is not a port number.
    #[error("invalid remote port number {0:?} reported by ssh")]
    InvalidRemotePort(String),

    /// ssh exited in a way the protocol does not allow.
    #[error("unexpected close status from ssh subprocess ({0})")]
    UnexpectedExit(ExitStatus),

    /// A built-in pattern failed to compile.
    #[error("built-in pattern is invalid: {0}")]
    BadPattern(String),

    /// An operation was attempted in the wrong session state.
    #[error("ssh session cannot move from {from:?} to {to:?}")]
    IllegalTransition {
        /// Current state.
        from: SessionState,
        /// Requested state.
        to: SessionState,
    },

    /// A command round needs a synchronised prompt.
    #[error("ssh session has no synchronised prompt")]
    NotSynchronised,
}

impl SshError {
    /// Category of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Expect(ExpectError::Regex(_))
            | Self::UnexpectedExit(_)
            | Self::BadPattern(_)
            | Self::IllegalTransition { .. }
            | Self::NotSynchronised
            | Self::IncompatibleVersion(VersionError::Unparseable(_)) => ErrorClass::Internal,
            Self::Expect(_) | Self::Send(_) | Self::Identity { .. } => ErrorClass::Io,
            Self::Timeout { .. } => ErrorClass::Timeout,
            Self::NoServer
            | Self::Authentication(_)
            | Self::UnexpectedEof { .. }
            | Self::SudoPasswordRequired { .. }
            | Self::V2vNotInstalled
            | Self::IncompatibleVersion(_)
            | Self::MissingRewriteMarker
            | Self::InvalidRemotePort(_) => ErrorClass::Protocol,
        }
    }
}

//! Socket-activation descriptor layout.
//!
//! The socket-activation contract expects the listening sockets at
//! descriptors `3..3 + LISTEN_FDS` in the activated process. [`PassedFds`]
//! owns parent-side duplicates of the listeners and installs a `pre_exec`
//! hook that moves them into place.

#![allow(unsafe_code)]

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::process::CommandExt;
use std::process::Command;

use nix::fcntl::{FcntlArg, fcntl};

/// First descriptor number used by socket activation.
pub const LISTEN_FDS_START: RawFd = 3;

/// Listening descriptors prepared for a single child.
///
/// Keep the value alive until [`Command::spawn`] returns; dropping it closes
/// the parent's duplicates.
#[derive(Debug)]
pub struct PassedFds {
    fds: Vec<OwnedFd>,
}

impl PassedFds {
    /// Duplicates `listeners` above the activation range and arranges for
    /// the child to receive them at descriptor 3 onwards.
    pub fn install(command: &mut Command, listeners: &[OwnedFd]) -> io::Result<Self> {
        let floor = LISTEN_FDS_START + listeners.len() as RawFd;
        let mut fds = Vec::with_capacity(listeners.len());
        for listener in listeners {
            let raw = fcntl(listener.as_raw_fd(), FcntlArg::F_DUPFD_CLOEXEC(floor))
                .map_err(io::Error::from)?;
            // SAFETY: F_DUPFD_CLOEXEC returned a fresh descriptor that nothing
            // else owns.
            fds.push(unsafe { OwnedFd::from_raw_fd(raw) });
        }

        let sources: Vec<RawFd> = fds.iter().map(AsRawFd::as_raw_fd).collect();
        // SAFETY: dup2(2) is async-signal-safe and the closure only reads the
        // captured vector, which was allocated before fork.
        unsafe {
            command.pre_exec(move || {
                for (offset, &source) in sources.iter().enumerate() {
                    let target = LISTEN_FDS_START + offset as RawFd;
                    if libc::dup2(source, target) == -1 {
                        return Err(io::Error::last_os_error());
                    }
                }
                Ok(())
            });
        }

        Ok(Self { fds })
    }

    /// Number of descriptors the child receives.
    pub fn len(&self) -> usize {
        self.fds.len()
    }

    /// Reports whether no descriptors are passed.
    pub fn is_empty(&self) -> bool {
        self.fds.is_empty()
    }
}

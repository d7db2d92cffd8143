//! Controlling-terminal setup for pty children.

#![allow(unsafe_code)]

use std::io;
use std::os::fd::{AsRawFd, BorrowedFd};
use std::os::unix::process::CommandExt;
use std::process::Command;

use nix::fcntl::{FcntlArg, FdFlag, fcntl};

/// Makes the child start a new session and adopt its stdin as the
/// controlling terminal.
///
/// The command's stdin must already be configured as the pty slave. Standard
/// library process spawning redirects stdio before running `pre_exec`
/// closures, so by the time this runs descriptor 0 is the slave.
pub fn attach_controlling_terminal(command: &mut Command) {
    // SAFETY: the closure only calls setsid(2) and ioctl(2), both of which
    // are async-signal-safe, and it touches no memory shared with the parent.
    unsafe {
        command.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(io::Error::last_os_error());
            }
            if libc::ioctl(0, libc::TIOCSCTTY as _, 0) == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

/// Sets `FD_CLOEXEC` on a descriptor so spawned children do not inherit it.
pub fn set_cloexec(fd: BorrowedFd<'_>) -> io::Result<()> {
    fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))
        .map(drop)
        .map_err(io::Error::from)
}

/// Reports whether `FD_CLOEXEC` is set on a descriptor.
pub fn is_cloexec(fd: BorrowedFd<'_>) -> io::Result<bool> {
    let flags = fcntl(fd.as_raw_fd(), FcntlArg::F_GETFD).map_err(io::Error::from)?;
    Ok(FdFlag::from_bits_truncate(flags).contains(FdFlag::FD_CLOEXEC))
}

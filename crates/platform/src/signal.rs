//! Signal delivery and termination-signal wiring.

use std::io;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

pub use nix::sys::signal::Signal;
use nix::unistd::Pid;

/// Sends `signal` to the process with id `pid`.
///
/// A process that has already exited but not been reaped still accepts the
/// signal; a process that no longer exists yields `ESRCH`.
pub fn send(pid: u32, signal: Signal) -> io::Result<()> {
    let raw = i32::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "process id out of range"))?;
    nix::sys::signal::kill(Pid::from_raw(raw), signal).map_err(io::Error::from)
}

/// Raises `flag` whenever SIGINT or SIGTERM is delivered to this process.
pub fn register_termination_flag(flag: &Arc<AtomicBool>) -> io::Result<()> {
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(flag))?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(flag))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::process::Command;

    #[test]
    fn send_terminates_child() {
        let mut child = Command::new("sleep").arg("30").spawn().expect("spawn sleep");
        send(child.id(), Signal::SIGTERM).expect("kill");
        let status = child.wait().expect("wait");
        assert_eq!(status.signal(), Some(libc::SIGTERM));
    }

    #[test]
    fn send_rejects_out_of_range_pid() {
        let err = send(u32::MAX, Signal::SIGTERM).expect_err("pid overflow");
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}

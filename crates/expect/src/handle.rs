use std::ffi::OsStr;
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::AsFd;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use nix::pty::openpty;
use nix::sys::termios::{SetArg, cfmakeraw, tcgetattr, tcsetattr};

use crate::buffer::{Captures, MatchBuffer, Scan};
use crate::error::ExpectError;
use crate::pattern::Pattern;

/// Bytes requested from the pty per read.
pub const DEFAULT_READ_SIZE: usize = 1024;

/// Deadline applied to each [`ExpectHandle::expect`] call unless changed.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// The byte a terminal sends for Ctrl-C.
pub const INTERRUPT: u8 = 0x03;

/// Result of a single [`ExpectHandle::expect`] call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expected<T> {
    /// A pattern matched; `tag` identifies which table entry.
    Matched {
        /// Tag of the winning table entry.
        tag: T,
        /// Capture groups of the match.
        captures: Captures,
    },
    /// The child closed the terminal.
    Eof,
    /// The deadline passed with no match.
    Timeout,
}

/// Result of [`ExpectHandle::read_chunk`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    /// This many bytes were stored at the front of the caller's buffer.
    Data(usize),
    /// The child closed the terminal.
    Eof,
    /// Nothing arrived before the timeout.
    Timeout,
}

/// A child process running on a pseudo-terminal.
pub struct ExpectHandle {
    master: Option<File>,
    child: Child,
    reaped: bool,
    read_size: usize,
    timeout: Option<Duration>,
    buffer: MatchBuffer,
}

impl ExpectHandle {
    /// Starts `program` with `args` on a fresh pseudo-terminal.
    ///
    /// The child becomes a session leader with the pty slave as its
    /// controlling terminal and as stdin, stdout and stderr. The slave is put
    /// in raw mode so control characters and line endings pass through
    /// untouched. A program that cannot be executed is reported here rather
    /// than as a later exit status.
    pub fn spawn<P, I, S>(program: P, args: I) -> Result<Self, ExpectError>
    where
        P: AsRef<OsStr>,
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let program = program.as_ref();
        let spawn_error = |source: io::Error| ExpectError::Spawn {
            program: program.to_string_lossy().into_owned(),
            source,
        };

        let pty = openpty(None, None).map_err(|errno| spawn_error(errno.into()))?;
        platform::terminal::set_cloexec(pty.master.as_fd()).map_err(spawn_error)?;
        platform::terminal::set_cloexec(pty.slave.as_fd()).map_err(spawn_error)?;

        let mut termios = tcgetattr(&pty.slave).map_err(|errno| spawn_error(errno.into()))?;
        cfmakeraw(&mut termios);
        tcsetattr(&pty.slave, SetArg::TCSANOW, &termios)
            .map_err(|errno| spawn_error(errno.into()))?;

        let stdin = pty.slave.try_clone().map_err(spawn_error)?;
        let stdout = pty.slave.try_clone().map_err(spawn_error)?;
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::from(stdin))
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(pty.slave));
        platform::terminal::attach_controlling_terminal(&mut command);

        let child = command.spawn().map_err(spawn_error)?;
        // The command still holds the parent's slave copies; release them so
        // the master sees EIO once the child is gone.
        drop(command);

        Ok(Self {
            master: Some(File::from(pty.master)),
            child,
            reaped: false,
            read_size: DEFAULT_READ_SIZE,
            timeout: Some(DEFAULT_TIMEOUT),
            buffer: MatchBuffer::default(),
        })
    }

    /// Process id of the child.
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Current per-call deadline; `None` waits forever.
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Sets the per-call deadline used by [`expect`](Self::expect).
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// Bytes requested per read.
    pub const fn read_size(&self) -> usize {
        self.read_size
    }

    /// Sets the number of bytes requested per read. Zero is treated as one.
    pub fn set_read_size(&mut self, read_size: usize) {
        self.read_size = read_size.max(1);
    }

    /// Bytes currently held in the match buffer.
    pub fn buffer(&self) -> &[u8] {
        self.buffer.as_bytes()
    }

    /// Offset just past the last match, if the buffer is to be resumed.
    pub const fn next_match(&self) -> Option<usize> {
        self.buffer.next_match()
    }

    /// Reads until a pattern in `patterns` matches, the child closes the
    /// terminal, or the deadline passes.
    ///
    /// Bytes left after the previous match are scanned first. Table order
    /// decides between patterns that match the same buffer.
    pub fn expect<T: Copy>(
        &mut self,
        patterns: &[(T, &Pattern)],
    ) -> Result<Expected<T>, ExpectError> {
        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);

        if self.buffer.begin() {
            if let Scan::Matched(tag, captures) = self.buffer.settle(patterns)? {
                return Ok(Expected::Matched { tag, captures });
            }
        }

        loop {
            if !self.wait_readable(deadline)? {
                return Ok(Expected::Timeout);
            }
            if self.fill()? == 0 {
                return Ok(Expected::Eof);
            }
            if let Scan::Matched(tag, captures) = self.buffer.settle(patterns)? {
                return Ok(Expected::Matched { tag, captures });
            }
        }
    }

    /// Reads whatever is available, bypassing the match buffer.
    ///
    /// Used to stream output once pattern matching is no longer needed.
    pub fn read_chunk(
        &mut self,
        buf: &mut [u8],
        timeout: Option<Duration>,
    ) -> Result<ReadOutcome, ExpectError> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        if !self.wait_readable(deadline)? {
            return Ok(ReadOutcome::Timeout);
        }
        match read_pty(self.master_mut()?, buf)? {
            0 => Ok(ReadOutcome::Eof),
            n => Ok(ReadOutcome::Data(n)),
        }
    }

    /// Writes `data` in full to the terminal and returns its length.
    pub fn send(&mut self, data: impl AsRef<[u8]>) -> io::Result<usize> {
        let data = data.as_ref();
        let master = self.master_mut()?;
        master.write_all(data)?;
        master.flush()?;
        Ok(data.len())
    }

    /// Formats `args` and writes the result in full.
    pub fn send_fmt(&mut self, args: fmt::Arguments<'_>) -> io::Result<usize> {
        self.send(fmt::format(args))
    }

    /// Sends Ctrl-C through the terminal.
    pub fn send_interrupt(&mut self) -> io::Result<usize> {
        self.send([INTERRUPT])
    }

    /// Closes the terminal and waits for the child to exit.
    pub fn close(mut self) -> io::Result<ExitStatus> {
        drop(self.master.take());
        let status = self.child.wait();
        self.reaped = true;
        status
    }

    fn master_mut(&mut self) -> io::Result<&mut File> {
        self.master
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "pty already closed"))
    }

    fn wait_readable(&mut self, deadline: Option<Instant>) -> Result<bool, ExpectError> {
        let master = self.master_mut()?;
        loop {
            let timeout = match deadline {
                None => PollTimeout::NONE,
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Ok(false);
                    }
                    poll_timeout(remaining)
                }
            };
            let mut fds = [PollFd::new(master.as_fd(), PollFlags::POLLIN)];
            match poll(&mut fds, timeout) {
                Ok(0) | Err(Errno::EINTR) => {}
                Ok(_) => return Ok(true),
                Err(errno) => return Err(ExpectError::Io(errno.into())),
            }
        }
    }

    fn fill(&mut self) -> Result<usize, ExpectError> {
        let read_size = self.read_size;
        let master = self
            .master
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "pty already closed"))?;
        let spare = self.buffer.spare(read_size);
        let filled = read_pty(master, spare);
        let count = filled.as_ref().map_or(0, |count| *count);
        self.buffer.commit(read_size, count);
        Ok(filled?)
    }
}

/// One read from the master; `EIO` means the slave side is gone.
fn read_pty(master: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match master.read(buf) {
            Ok(n) => return Ok(n),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) if err.raw_os_error() == Some(Errno::EIO as i32) => return Ok(0),
            Err(err) => return Err(err),
        }
    }
}

/// Rounds up to whole milliseconds and clamps to what one poll accepts;
/// the caller loops until the real deadline.
fn poll_timeout(remaining: Duration) -> PollTimeout {
    let millis = remaining.as_micros().div_ceil(1000);
    PollTimeout::from(u16::try_from(millis).unwrap_or(u16::MAX))
}

impl fmt::Debug for ExpectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpectHandle")
            .field("pid", &self.child.id())
            .field("open", &self.master.is_some())
            .field("timeout", &self.timeout)
            .field("buffered", &self.buffer.as_bytes().len())
            .finish_non_exhaustive()
    }
}

impl Drop for ExpectHandle {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        drop(self.master.take());

        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
        }

        let _ = self.child.wait();
    }
}

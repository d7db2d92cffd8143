use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::os::fd::OwnedFd;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;

use platform::fds::PassedFds;
use platform::signal::{self, Signal};
use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info};

use crate::error::NbdError;
use crate::kind::{NbdPrograms, NbdServerKind};
use crate::ready::wait_until_ready;

const LISTEN_BACKLOG: i32 = 128;

// `exec` keeps the shell's process id, so LISTEN_PID names the server.
const ACTIVATION_TRAMPOLINE: &str = r#"export LISTEN_PID=$$ LISTEN_FDS=@N@; exec "$0" "$@""#;

/// A running NBD server exporting one device.
#[derive(Debug)]
pub struct NbdServer {
    child: Child,
    kind: NbdServerKind,
    port: u16,
    reaped: bool,
}

impl NbdServer {
    /// Starts a `kind` server exporting `device` read-only on localhost
    /// `port`.
    ///
    /// The server's stdin is `/dev/null`; its output goes to ours.
    pub fn start(
        kind: NbdServerKind,
        programs: &NbdPrograms,
        port: u16,
        device: &str,
    ) -> Result<Self, NbdError> {
        let program = programs.program(kind);
        let args = kind.args(port, device);
        let spawn_error = |source| NbdError::Spawn {
            program: program.to_string_lossy().into_owned(),
            source,
        };

        let listeners = if kind.socket_activation() {
            bind_listeners(port)?
        } else {
            Vec::new()
        };

        let mut command;
        let passed;
        if listeners.is_empty() {
            command = Command::new(program);
            command.args(&args);
            passed = None;
        } else {
            command = Command::new("sh");
            command
                .arg("-c")
                .arg(ACTIVATION_TRAMPOLINE.replace("@N@", &listeners.len().to_string()))
                .arg(program)
                .args(&args);
            passed = Some(PassedFds::install(&mut command, &listeners).map_err(spawn_error)?);
        }
        command.stdin(Stdio::null());

        debug!(server = %kind, port, device, ?args, "starting NBD server");
        let child = command.spawn().map_err(spawn_error)?;
        drop(passed);
        drop(listeners);
        info!(server = %kind, port, device, pid = child.id(), "NBD server started");

        Ok(Self {
            child,
            kind,
            port,
            reaped: false,
        })
    }

    /// Local port the server listens on.
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Kind of server.
    pub const fn kind(&self) -> NbdServerKind {
        self.kind
    }

    /// Process id of the server.
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Waits for the server to greet on its port, failing early if it
    /// exits.
    pub fn wait_ready(&mut self, timeout: Duration) -> Result<(), NbdError> {
        let port = self.port;
        let kind = self.kind;
        let child = &mut self.child;
        wait_until_ready(port, timeout, || match child.try_wait() {
            Ok(Some(status)) => Err(NbdError::Exited {
                program: kind.program_name(),
                status,
            }),
            _ => Ok(()),
        })
    }

    /// Sends `SIGTERM` and reaps the server.
    pub fn stop(mut self) -> io::Result<ExitStatus> {
        self.terminate()
    }

    fn terminate(&mut self) -> io::Result<ExitStatus> {
        if let Ok(None) = self.child.try_wait() {
            // Already gone is fine; wait reaps either way.
            let _ = signal::send(self.child.id(), Signal::SIGTERM);
        }
        let status = self.child.wait();
        self.reaped = true;
        debug!(port = self.port, ?status, "NBD server stopped");
        status
    }
}

impl Drop for NbdServer {
    fn drop(&mut self) {
        if !self.reaped {
            let _ = self.terminate();
        }
    }
}

/// Listening sockets on the loopback addresses for socket activation.
///
/// IPv4 is required; IPv6 is added when the host supports it.
fn bind_listeners(port: u16) -> Result<Vec<OwnedFd>, NbdError> {
    let mut listeners = Vec::with_capacity(2);
    let ipv4 = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    listeners.push(listen_on(ipv4).map_err(|source| NbdError::Listen { port, source })?);

    let ipv6 = SocketAddr::from((Ipv6Addr::LOCALHOST, port));
    match listen_on(ipv6) {
        Ok(listener) => listeners.push(listener),
        Err(err) => debug!(port, error = %err, "no IPv6 loopback listener"),
    }
    Ok(listeners)
}

fn listen_on(address: SocketAddr) -> io::Result<OwnedFd> {
    let socket = Socket::new(Domain::for_address(address), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    if address.is_ipv6() {
        socket.set_only_v6(true)?;
    }
    socket.bind(&address.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    Ok(socket.into())
}

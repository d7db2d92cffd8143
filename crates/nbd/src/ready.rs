use std::io::{self, Read};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, trace};

use crate::error::NbdError;

/// Greeting every NBD server sends first.
pub const NBD_MAGIC: &[u8; 8] = b"NBDMAGIC";

/// How long a freshly started server gets to accept connections.
pub const READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause between connection attempts.
pub const READY_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Connects to `port` on localhost until the server greets with
/// [`NBD_MAGIC`] or `timeout` passes.
pub fn wait_for_ready(port: u16, timeout: Duration) -> Result<(), NbdError> {
    wait_until_ready(port, timeout, || Ok(()))
}

pub(crate) fn wait_until_ready(
    port: u16,
    timeout: Duration,
    mut still_running: impl FnMut() -> Result<(), NbdError>,
) -> Result<(), NbdError> {
    let deadline = Instant::now() + timeout;
    let mut stream = loop {
        still_running()?;
        match connect_with_source_port(port) {
            Ok(stream) => break stream,
            Err(err) => trace!(port, error = %err, "NBD server not accepting yet"),
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(NbdError::NotReady { port, timeout });
        }
        thread::sleep(READY_POLL_INTERVAL.min(deadline - now));
    };

    let io_error = |source| NbdError::Io { port, source };
    let remaining = deadline
        .saturating_duration_since(Instant::now())
        .max(Duration::from_millis(1));
    stream.set_read_timeout(Some(remaining)).map_err(io_error)?;
    let mut greeting = [0_u8; 8];
    stream.read_exact(&mut greeting).map_err(io_error)?;
    if &greeting != NBD_MAGIC {
        return Err(NbdError::BadMagic { port });
    }
    debug!(port, "NBD server is ready");
    Ok(())
}

/// Connects to localhost `port` from source port `port + 1`.
///
/// Left to itself the kernel may pick `port` as the source port and, with
/// nothing listening yet, connect the socket to itself. When `port + 1` is
/// taken an ephemeral port is used and a self-connection is rejected.
fn connect_with_source_port(port: u16) -> io::Result<TcpStream> {
    let mut last_error =
        io::Error::new(io::ErrorKind::AddrNotAvailable, "localhost did not resolve");
    for target in ("localhost", port).to_socket_addrs()? {
        match connect_from(target, port.checked_add(1)) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_error = err,
        }
    }
    Err(last_error)
}

fn connect_from(target: SocketAddr, source_port: Option<u16>) -> io::Result<TcpStream> {
    let socket = Socket::new(Domain::for_address(target), Type::STREAM, Some(Protocol::TCP))?;
    // A previous probe from the same source port may still be in TIME_WAIT.
    socket.set_reuse_address(true)?;

    let mut source = target;
    source.set_port(source_port.unwrap_or(0));
    if socket.bind(&source.into()).is_err() {
        source.set_port(0);
        socket.bind(&source.into())?;
    }
    socket.connect(&target.into())?;

    let stream = TcpStream::from(socket);
    if stream.local_addr()? == stream.peer_addr()? {
        return Err(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "connected to itself",
        ));
    }
    Ok(stream)
}

use rand::Rng;
use tracing::debug;

use platform::signal::{self, Signal};

use crate::error::SshError;
use crate::session::Session;

/// First local data port on the boot ISO, where every port is free.
pub const FIXED_PORT_BASE: u16 = 50123;

const RANDOM_PORT_RANGE: std::ops::Range<u16> = 50000..60000;

/// Hands out local ports for NBD servers, one per disk, increasing.
#[derive(Clone, Debug)]
pub struct PortAllocator {
    next: u16,
}

impl PortAllocator {
    /// Starts at `port`.
    pub const fn starting_at(port: u16) -> Self {
        Self { next: port }
    }

    /// Starts at [`FIXED_PORT_BASE`].
    pub const fn fixed() -> Self {
        Self::starting_at(FIXED_PORT_BASE)
    }

    /// Starts at a random port, so test runs on a shared machine do not
    /// collide with each other.
    pub fn randomized() -> Self {
        Self::starting_at(rand::thread_rng().gen_range(RANDOM_PORT_RANGE))
    }

    /// The next port; every call returns a higher one until the range wraps.
    pub fn allocate(&mut self) -> u16 {
        let port = self.next;
        self.next = self.next.checked_add(1).unwrap_or(RANDOM_PORT_RANGE.start);
        port
    }
}

impl Default for PortAllocator {
    fn default() -> Self {
        Self::fixed()
    }
}

/// An ssh process holding a reverse forward from `remote_port` on the
/// conversion server to `local_port` here.
#[derive(Debug)]
pub struct DataConnection {
    session: Session,
    local_port: u16,
    remote_port: u16,
}

impl DataConnection {
    pub(crate) fn new(session: Session, local_port: u16, remote_port: u16) -> Self {
        Self {
            session,
            local_port,
            remote_port,
        }
    }

    /// Local port the forward points at.
    pub const fn local_port(&self) -> u16 {
        self.local_port
    }

    /// Port ssh allocated on the conversion server.
    pub const fn remote_port(&self) -> u16 {
        self.remote_port
    }

    /// Process id of the ssh holding the forward.
    pub fn pid(&self) -> u32 {
        self.session.pid()
    }

    /// Hangs up the forward and reaps ssh.
    pub fn close(self) -> Result<(), SshError> {
        debug!(
            local_port = self.local_port,
            remote_port = self.remote_port,
            "closing data connection"
        );
        // Already gone is fine; close reaps either way.
        let _ = signal::send(self.session.pid(), Signal::SIGHUP);
        self.session.close()?;
        Ok(())
    }
}

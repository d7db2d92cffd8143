use nbd::NbdServer;
use ssh::DataConnection;
use tracing::warn;

/// The NBD servers and reverse forwards of one run.
///
/// Dropping it hangs up every forward first and then stops every server,
/// whichever way the run ended.
#[derive(Debug, Default)]
pub(crate) struct DiskExports {
    forwards: Vec<DataConnection>,
    servers: Vec<NbdServer>,
}

impl DiskExports {
    pub(crate) fn add_server(&mut self, server: NbdServer) {
        self.servers.push(server);
    }

    pub(crate) fn add_forward(&mut self, forward: DataConnection) {
        self.forwards.push(forward);
    }

    /// Ports on the conversion server, one per disk, in disk order.
    pub(crate) fn remote_ports(&self) -> Vec<u16> {
        self.forwards.iter().map(DataConnection::remote_port).collect()
    }
}

impl Drop for DiskExports {
    fn drop(&mut self) {
        for forward in self.forwards.drain(..) {
            let remote_port = forward.remote_port();
            if let Err(err) = forward.close() {
                warn!(remote_port, error = %err, "closing data connection failed");
            }
        }
        for server in self.servers.drain(..) {
            let port = server.port();
            if let Err(err) = server.stop() {
                warn!(port, error = %err, "stopping NBD server failed");
            }
        }
    }
}

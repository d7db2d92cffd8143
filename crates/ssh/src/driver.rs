use std::ffi::OsString;

use config::Config;
use expect::Expected;
use tracing::{debug, info};

use crate::command::{AuthMethod, SshCommand};
use crate::error::SshError;
use crate::forward::{DataConnection, PortAllocator};
use crate::identity::IdentityCache;
use crate::patterns::patterns;
use crate::probe::{RemoteCapabilities, compatible_version};
use crate::quote::single_quote;
use crate::session::{Session, UNEXPECTED_PASSWORD};
use crate::upload::RemoteFile;

#[derive(Clone, Copy, Debug)]
enum VersionProbe {
    Version,
    SudoPassword,
    Prompt,
}

#[derive(Clone, Copy, Debug)]
enum Forward {
    Allocated,
    Password,
}

#[derive(Clone, Copy, Debug)]
enum FeatureProbe {
    Rewrite,
    Colours,
    Input,
    Output,
    Prompt,
}

/// Opens ssh connections to the conversion server.
#[derive(Debug)]
pub struct SshDriver {
    ssh_program: OsString,
    identity: IdentityCache,
    ports: PortAllocator,
}

impl SshDriver {
    /// Uses the system `ssh` and `curl`.
    pub fn new(ports: PortAllocator) -> Self {
        Self::with_programs("ssh", "curl", ports)
    }

    /// Uses `ssh_program` in place of `ssh` and `curl_program` to fetch
    /// identities.
    pub fn with_programs(
        ssh_program: impl Into<OsString>,
        curl_program: impl Into<OsString>,
        ports: PortAllocator,
    ) -> Self {
        Self {
            ssh_program: ssh_program.into(),
            identity: IdentityCache::new(curl_program),
            ports,
        }
    }

    /// Reserves the local port for the next NBD server.
    pub fn next_local_port(&mut self) -> u16 {
        self.ports.allocate()
    }

    /// Starts ssh to the configured server with `extra_args` before the
    /// host name.
    pub fn start_session(
        &mut self,
        config: &Config,
        extra_args: &[&str],
        wait_for_prompt: bool,
    ) -> Result<Session, SshError> {
        let server = config.server.as_deref().ok_or(SshError::NoServer)?;
        let mut command = SshCommand::new(server);
        command.set_program(self.ssh_program.clone());
        command.set_port(config.port);
        command.set_user(config.username.clone());

        let password = match config.identity_url.as_deref() {
            Some(identity) => {
                let key = self.identity.resolve(identity)?;
                command.set_auth(AuthMethod::PublicKey(key));
                None
            }
            None => Some(config.password.expose()),
        };
        for arg in extra_args {
            command.push_option(*arg);
        }

        Session::start(command, password, wait_for_prompt)
    }

    /// Logs in, checks the remote virt-v2v and lists its drivers.
    pub fn test_connection(&mut self, config: &Config) -> Result<RemoteCapabilities, SshError> {
        let patterns = patterns()?;
        let mut session = self.start_session(config, &[], true)?;
        let sudo = if config.sudo { "sudo -n " } else { "" };

        session.send_line(&format!("{sudo}virt-v2v --version"))?;
        let mut version = None;
        loop {
            match session.expect(&[
                (VersionProbe::Version, &patterns.version),
                (VersionProbe::SudoPassword, &patterns.sudo_password),
                (VersionProbe::Prompt, &patterns.prompt),
            ])? {
                Expected::Matched {
                    tag: VersionProbe::Version,
                    captures,
                } => version = captures.text(1),
                Expected::Matched {
                    tag: VersionProbe::SudoPassword,
                    ..
                } => {
                    return Err(SshError::SudoPasswordRequired {
                        user: config.username.clone(),
                    });
                }
                Expected::Matched {
                    tag: VersionProbe::Prompt,
                    captures,
                } => {
                    if session.is_own_prompt(&captures) {
                        break;
                    }
                }
                Expected::Eof => {
                    return Err(SshError::UnexpectedEof {
                        waiting_for: "virt-v2v --version output",
                    });
                }
                Expected::Timeout => {
                    return Err(SshError::Timeout {
                        waiting_for: "virt-v2v --version output",
                    });
                }
            }
        }

        let version = version.ok_or(SshError::V2vNotInstalled)?;
        compatible_version(&version)?;
        info!(version = %version, "remote virt-v2v version");

        let mut capabilities = RemoteCapabilities {
            version,
            ..RemoteCapabilities::default()
        };
        let mut rewrite = false;
        session.send_line(&format!("{sudo}virt-v2v --machine-readable"))?;
        loop {
            match session.expect(&[
                (FeatureProbe::Rewrite, &patterns.rewrite),
                (FeatureProbe::Colours, &patterns.colours),
                (FeatureProbe::Input, &patterns.input),
                (FeatureProbe::Output, &patterns.output),
                (FeatureProbe::Prompt, &patterns.prompt),
            ])? {
                Expected::Matched { tag, captures } => match tag {
                    FeatureProbe::Rewrite => rewrite = true,
                    FeatureProbe::Colours => capabilities.colours_option = true,
                    FeatureProbe::Input => {
                        capabilities.add_input_driver(captures.text(1).unwrap_or_default());
                    }
                    FeatureProbe::Output => {
                        capabilities.add_output_driver(captures.text(1).unwrap_or_default());
                    }
                    FeatureProbe::Prompt => {
                        if session.is_own_prompt(&captures) {
                            break;
                        }
                    }
                },
                Expected::Eof => {
                    return Err(SshError::UnexpectedEof {
                        waiting_for: "virt-v2v --machine-readable output",
                    });
                }
                Expected::Timeout => {
                    return Err(SshError::Timeout {
                        waiting_for: "virt-v2v --machine-readable output",
                    });
                }
            }
        }
        if !rewrite {
            return Err(SshError::MissingRewriteMarker);
        }
        debug!(
            inputs = ?capabilities.input_drivers,
            outputs = ?capabilities.output_drivers,
            colours = capabilities.colours_option,
            "remote virt-v2v features"
        );

        session.exit()?;
        Ok(capabilities)
    }

    /// Asks ssh to forward a fresh remote port to `local_port` here.
    pub fn open_data_connection(
        &mut self,
        config: &Config,
        local_port: u16,
    ) -> Result<DataConnection, SshError> {
        let forward = format!("0:localhost:{local_port}");
        let mut session = self.start_session(config, &["-R", forward.as_str(), "-N"], false)?;

        let patterns = patterns()?;
        match session.expect(&[
            (Forward::Allocated, &patterns.port_forward),
            (Forward::Password, &patterns.password),
        ])? {
            Expected::Matched {
                tag: Forward::Allocated,
                captures,
            } => {
                let text = captures.text(1).unwrap_or_default();
                let remote_port = text
                    .parse::<u16>()
                    .ok()
                    .filter(|port| *port != 0)
                    .ok_or(SshError::InvalidRemotePort(text))?;
                debug!(local_port, remote_port, "reverse port forward established");
                Ok(DataConnection::new(session, local_port, remote_port))
            }
            // Asked again: the password just sent was rejected.
            Expected::Matched {
                tag: Forward::Password,
                ..
            } => Err(SshError::Authentication(UNEXPECTED_PASSWORD.to_owned())),
            Expected::Eof => Err(SshError::UnexpectedEof {
                waiting_for: "ssh -R output",
            }),
            Expected::Timeout => Err(SshError::Timeout {
                waiting_for: "ssh -R output",
            }),
        }
    }

    /// Creates `remote_dir` on the server, records the time, uploads
    /// `files` into it and returns the session still at the prompt.
    pub fn start_remote_connection(
        &mut self,
        config: &Config,
        remote_dir: &str,
        files: &[RemoteFile],
    ) -> Result<Session, SshError> {
        let mut session = self.start_session(config, &[], true)?;

        session.run_command(&format!("mkdir -p {}", single_quote(remote_dir)))?;
        session.run_command(&format!(
            "date > {}",
            single_quote(&format!("{remote_dir}/time"))
        ))?;
        for file in files {
            let path = format!("{remote_dir}/{}", file.name);
            session.upload(&path, &file.contents)?;
            if file.executable {
                session.run_command(&format!("chmod +x {}", single_quote(&path)))?;
            }
        }
        info!(remote_dir, files = files.len(), "remote directory prepared");
        Ok(session)
    }
}

use std::ffi::OsString;
use std::path::PathBuf;

/// How ssh is told to authenticate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthMethod {
    /// Keyboard-interactive or password; the password is typed at the prompt.
    Password,
    /// Public key only, using this private key file.
    PublicKey(PathBuf),
}

/// Builder for the `ssh` argument vector.
///
/// Produces `ssh -p PORT -l USER -o StrictHostKeyChecking=no
/// -o PreferredAuthentications=... [-i KEY] [EXTRA...] HOST`.
#[derive(Clone, Debug)]
pub struct SshCommand {
    program: OsString,
    host: String,
    user: Option<String>,
    port: Option<u16>,
    auth: AuthMethod,
    extra: Vec<OsString>,
}

impl SshCommand {
    /// Starts a command for `host` with password authentication.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            program: OsString::from("ssh"),
            host: host.into(),
            user: None,
            port: None,
            auth: AuthMethod::Password,
            extra: Vec::new(),
        }
    }

    /// Runs `program` instead of `ssh`.
    pub fn set_program(&mut self, program: impl Into<OsString>) {
        self.program = program.into();
    }

    /// Remote user name.
    pub fn set_user(&mut self, user: impl Into<String>) {
        self.user = Some(user.into());
    }

    /// Remote port.
    pub fn set_port(&mut self, port: u16) {
        self.port = Some(port);
    }

    /// Authentication method.
    pub fn set_auth(&mut self, auth: AuthMethod) {
        self.auth = auth;
    }

    /// Appends an argument placed after the fixed options, before the host.
    pub fn push_option(&mut self, option: impl Into<OsString>) {
        self.extra.push(option.into());
    }

    /// Program and arguments, ready to spawn.
    pub fn into_parts(self) -> (OsString, Vec<OsString>) {
        let mut args: Vec<OsString> = Vec::with_capacity(12 + self.extra.len());
        if let Some(port) = self.port {
            args.push("-p".into());
            args.push(port.to_string().into());
        }
        if let Some(user) = self.user {
            args.push("-l".into());
            args.push(user.into());
        }
        args.push("-o".into());
        args.push("StrictHostKeyChecking=no".into());
        args.push("-o".into());
        match self.auth {
            AuthMethod::Password => {
                args.push("PreferredAuthentications=keyboard-interactive,password".into());
            }
            AuthMethod::PublicKey(key) => {
                args.push("PreferredAuthentications=publickey".into());
                args.push("-i".into());
                args.push(key.into_os_string());
            }
        }
        args.extend(self.extra);
        args.push(self.host.into());
        (self.program, args)
    }
}

use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::time::Duration;

use expect::{Captures, ExpectHandle, Expected, Pattern};
use platform::signal::Signal;
use tracing::{debug, trace};

use crate::command::SshCommand;
use crate::error::SshError;
use crate::patterns::patterns;
use crate::state::SessionState;
use crate::token::{heredoc_delimiter, random_token};
use crate::upload::heredoc_command;

/// Prompt tokens sent before shell synchronisation gives up.
pub const PROMPT_ATTEMPTS: usize = 30;

/// How long each synchronisation attempt waits for the prompt.
pub const PROMPT_TIMEOUT: Duration = Duration::from_secs(2);

const NO_EXPLANATION: &str = "ssh closed the connection without explanation";
pub(crate) const UNEXPECTED_PASSWORD: &str =
    "password prompt was not expected, most likely the password is wrong";

#[derive(Clone, Copy, Debug)]
enum Auth {
    Password,
    Message,
}

#[derive(Clone, Copy, Debug)]
enum Shell {
    Password,
    Prompt,
}

/// One running `ssh` process and the conversation with it.
#[derive(Debug)]
pub struct Session {
    handle: ExpectHandle,
    state: SessionState,
    prompt: Option<String>,
}

impl Session {
    /// Spawns `command`, answers the password prompt when `password` is
    /// given, and synchronises with the remote shell if `wait_for_prompt`.
    ///
    /// Without `wait_for_prompt` the session is returned right after
    /// authentication, for port forwards and other non-interactive uses.
    pub fn start(
        command: SshCommand,
        password: Option<&str>,
        wait_for_prompt: bool,
    ) -> Result<Self, SshError> {
        let (program, args) = command.into_parts();
        debug!(program = %program.to_string_lossy(), ?args, "starting ssh");
        let handle = ExpectHandle::spawn(&program, &args)?;
        let mut session = Self {
            handle,
            state: SessionState::Spawned,
            prompt: None,
        };

        let password = password.filter(|password| !password.is_empty());
        if let Some(password) = password {
            session.state.advance(SessionState::AuthWait)?;
            session.authenticate(password)?;
        }

        if wait_for_prompt {
            session.state.advance(SessionState::ShellSync)?;
            session.synchronize()?;
        }
        session.state.advance(SessionState::Ready)?;
        Ok(session)
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Token in the synchronised prompt, if the session was synchronised.
    pub fn prompt_token(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    /// Process id of ssh.
    pub fn pid(&self) -> u32 {
        self.handle.pid()
    }

    /// The underlying expect handle, for streaming output.
    pub fn handle_mut(&mut self) -> &mut ExpectHandle {
        &mut self.handle
    }

    /// Sends `line` followed by a newline.
    pub fn send_line(&mut self, line: &str) -> Result<(), SshError> {
        trace!(line, "sending to ssh");
        self.handle.send_fmt(format_args!("{line}\n"))?;
        Ok(())
    }

    /// Waits for one of `patterns` using the handle's current timeout.
    pub fn expect<T: Copy>(
        &mut self,
        patterns: &[(T, &Pattern)],
    ) -> Result<Expected<T>, SshError> {
        Ok(self.handle.expect(patterns)?)
    }

    /// True when `captures` came from the prompt pattern and carry the
    /// token this session set.
    pub fn is_own_prompt(&self, captures: &Captures) -> bool {
        match (&self.prompt, captures.get(1)) {
            (Some(token), Some(seen)) => token.as_bytes() == seen,
            _ => false,
        }
    }

    /// Skips output until the synchronised prompt reappears.
    pub fn wait_prompt(&mut self, waiting_for: &'static str) -> Result<(), SshError> {
        if self.state != SessionState::Ready || self.prompt.is_none() {
            return Err(SshError::NotSynchronised);
        }
        let prompt = &patterns()?.prompt;
        loop {
            match self.handle.expect(&[((), prompt)])? {
                Expected::Matched { captures, .. } => {
                    if self.is_own_prompt(&captures) {
                        return Ok(());
                    }
                }
                Expected::Eof => return Err(SshError::UnexpectedEof { waiting_for }),
                Expected::Timeout => return Err(SshError::Timeout { waiting_for }),
            }
        }
    }

    /// Runs `command` in the remote shell and waits for it to finish.
    pub fn run_command(&mut self, command: &str) -> Result<(), SshError> {
        self.send_line(command)?;
        self.wait_prompt("command prompt")
    }

    /// Writes `contents` to the remote file `path` through a heredoc.
    pub fn upload(&mut self, path: &str, contents: &[u8]) -> Result<(), SshError> {
        let delimiter = heredoc_delimiter(contents);
        debug!(path, bytes = contents.len(), "uploading file");
        self.handle.send(heredoc_command(path, contents, &delimiter))?;
        self.wait_prompt("prompt after upload")
    }

    /// Leaves the remote shell and waits for ssh to exit.
    ///
    /// Exit status 0 and death by `SIGHUP` are both a clean shutdown.
    pub fn exit(mut self) -> Result<(), SshError> {
        self.send_line("exit")?;
        match self.handle.expect::<()>(&[])? {
            Expected::Eof | Expected::Matched { .. } => {}
            Expected::Timeout => {
                return Err(SshError::Timeout {
                    waiting_for: "end of ssh session",
                });
            }
        }
        let status = self.close()?;
        if status.success() || status.signal() == Some(Signal::SIGHUP as i32) {
            Ok(())
        } else {
            Err(SshError::UnexpectedExit(status))
        }
    }

    /// Closes the terminal and reaps ssh.
    pub fn close(mut self) -> Result<ExitStatus, SshError> {
        self.state.advance(SessionState::Closed)?;
        self.handle
            .close()
            .map_err(|err| SshError::Expect(err.into()))
    }

    fn authenticate(&mut self, password: &str) -> Result<(), SshError> {
        let patterns = patterns()?;
        let mut last_message: Option<String> = None;
        loop {
            match self.handle.expect(&[
                (Auth::Password, &patterns.password),
                (Auth::Message, &patterns.ssh_message),
            ])? {
                Expected::Matched {
                    tag: Auth::Password,
                    ..
                } => {
                    self.handle.send(password)?;
                    self.handle.send("\n")?;
                    return Ok(());
                }
                Expected::Matched {
                    tag: Auth::Message,
                    captures,
                } => {
                    let message = captures.text(1).unwrap_or_default();
                    debug!(message = %message, "ssh diagnostic before password prompt");
                    last_message = Some(message);
                }
                Expected::Eof => {
                    return Err(SshError::Authentication(
                        last_message.unwrap_or_else(|| NO_EXPLANATION.to_owned()),
                    ));
                }
                Expected::Timeout => {
                    return Err(SshError::Timeout {
                        waiting_for: "password prompt",
                    });
                }
            }
        }
    }

    fn synchronize(&mut self) -> Result<(), SshError> {
        let saved = self.handle.timeout();
        self.handle.set_timeout(Some(PROMPT_TIMEOUT));
        let result = self.synchronize_prompt();
        self.handle.set_timeout(saved);
        result
    }

    fn synchronize_prompt(&mut self) -> Result<(), SshError> {
        let patterns = patterns()?;
        // Replace the login shell, whose prompt and line editing are unknown.
        self.send_line("exec bash --noediting --noprofile")?;

        for attempt in 0..PROMPT_ATTEMPTS {
            let token = random_token();
            // The quotes split the markers so the echoed command never
            // matches the prompt pattern.
            self.send_line(&format!("export LANG=C PS1='###''{token}''### '"))?;

            loop {
                match self.handle.expect(&[
                    (Shell::Password, &patterns.password),
                    (Shell::Prompt, &patterns.prompt),
                ])? {
                    Expected::Matched {
                        tag: Shell::Password,
                        ..
                    } => return Err(SshError::Authentication(UNEXPECTED_PASSWORD.to_owned())),
                    Expected::Matched {
                        tag: Shell::Prompt,
                        captures,
                    } => {
                        if captures.get(1) == Some(token.as_bytes()) {
                            debug!(attempt, "synchronised with remote shell");
                            self.prompt = Some(token);
                            return Ok(());
                        }
                        trace!(attempt, "skipping stale prompt");
                    }
                    Expected::Eof => {
                        return Err(SshError::UnexpectedEof {
                            waiting_for: "command prompt",
                        });
                    }
                    // ssh may swallow input sent before the remote shell is
                    // ready; try again with a new token.
                    Expected::Timeout => break,
                }
            }
        }

        Err(SshError::Timeout {
            waiting_for: "command prompt",
        })
    }
}

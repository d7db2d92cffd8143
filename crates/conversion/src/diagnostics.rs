use std::ffi::OsString;
use std::process::{Command, Stdio};

use ssh::RemoteFile;
use tracing::debug;

/// A local command whose output is uploaded next to the conversion log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiagnosticCommand {
    /// Name of the file in the remote directory.
    pub file: String,
    /// Program to run.
    pub program: OsString,
    /// Its arguments.
    pub args: Vec<String>,
}

impl DiagnosticCommand {
    /// Runs `program args` and stores its output as `file`.
    pub fn new(file: &str, program: impl Into<OsString>, args: &[&str]) -> Self {
        Self {
            file: file.to_owned(),
            program: program.into(),
            args: args.iter().map(|arg| (*arg).to_owned()).collect(),
        }
    }
}

/// Hardware and kernel information useful when a conversion goes wrong.
pub fn default_diagnostics() -> Vec<DiagnosticCommand> {
    vec![
        DiagnosticCommand::new("dmesg", "dmesg", &[]),
        DiagnosticCommand::new("lscpu", "lscpu", &[]),
        DiagnosticCommand::new("lspci", "lspci", &["-vvv"]),
        DiagnosticCommand::new("lsscsi", "lsscsi", &["-v"]),
        DiagnosticCommand::new("lsusb", "lsusb", &["-v"]),
    ]
}

/// Runs each command and returns the output of those that succeeded.
///
/// A missing or failing tool only loses its own file.
pub fn capture_diagnostics(commands: &[DiagnosticCommand]) -> Vec<RemoteFile> {
    commands
        .iter()
        .filter_map(|command| {
            let output = Command::new(&command.program)
                .args(&command.args)
                .stdin(Stdio::null())
                .stderr(Stdio::null())
                .output();
            match output {
                Ok(output) if output.status.success() => {
                    Some(RemoteFile::new(&command.file, output.stdout))
                }
                Ok(output) => {
                    debug!(
                        file = %command.file,
                        status = %output.status,
                        "diagnostic command failed"
                    );
                    None
                }
                Err(err) => {
                    debug!(file = %command.file, error = %err, "diagnostic command unavailable");
                    None
                }
            }
        })
        .collect()
}

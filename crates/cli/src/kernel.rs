//! Unattended conversion driven by the kernel command line.
//!
//! A boot entry of the conversion ISO carries `p2v.server=...` and the rest
//! of the configuration; this mode converts the machine without asking
//! anything and reports progress on the console.

use std::io::Write;
use std::process::{Command, Stdio};

use config::KernelCmdline;
use conversion::{CancelToken, ConversionSession, ErrorClass, Notification};
use logging::ansi::{Marker, Painter};
use tracing::{info, warn};

use crate::arguments::PROGRAM_NAME;
use crate::error::CliError;

/// Command run after a successful conversion started from the real kernel
/// command line as root.
pub(crate) const DEFAULT_POST: &str = "poweroff";

/// Where the `p2v.*` keys were read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CmdlineSource {
    /// `/proc/cmdline` of the running kernel.
    Proc,
    /// The `--cmdline` option.
    Argument,
}

/// The mode keys of the kernel command line.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Hooks {
    pub(crate) pre: Option<String>,
    pub(crate) post: Option<String>,
    pub(crate) fail: Option<String>,
    pub(crate) skip_test_connection: bool,
}

impl Hooks {
    pub(crate) fn from_cmdline(
        cmdline: &KernelCmdline,
        source: CmdlineSource,
        is_root: bool,
    ) -> Self {
        let hook = |key: &str| {
            cmdline
                .get(key)
                .filter(|command| !command.is_empty())
                .map(str::to_owned)
        };
        let post = hook("p2v.post").or_else(|| {
            (source == CmdlineSource::Proc && is_root).then(|| DEFAULT_POST.to_owned())
        });
        Self {
            pre: hook("p2v.pre"),
            post,
            fail: hook("p2v.fail"),
            skip_test_connection: cmdline.contains("p2v.skip_test_connection"),
        }
    }
}

/// Runs `p2v.pre`, the connection test, the conversion and then `p2v.post`
/// or `p2v.fail`.
///
/// A cancelled conversion runs neither hook and yields
/// [`CliError::Cancelled`].
pub(crate) fn kernel_conversion<Out, Err>(
    session: &ConversionSession,
    hooks: &Hooks,
    cancel: &CancelToken,
    painter: Painter,
    stdout: &mut Out,
    stderr: &mut Err,
) -> Result<(), CliError>
where
    Out: Write,
    Err: Write,
{
    if let Some(pre) = &hooks.pre {
        run_hook("p2v.pre", pre, stdout, stderr)?;
    }

    if hooks.skip_test_connection {
        info!("skipping the connection test");
    } else {
        let config = session.config();
        session
            .test_connection()
            .map_err(|source| CliError::Connection {
                server: config.server.clone().unwrap_or_default(),
                port: config.port,
                source,
            })?;
    }

    if let Err(source) = session.run(cancel, |notification| {
        print_notification(&notification, painter, stdout);
    }) {
        if source.class() == ErrorClass::Cancelled {
            info!("conversion cancelled; not running p2v.fail");
            return Err(CliError::Cancelled);
        }
        if let Some(fail) = &hooks.fail {
            if let Err(err) = run_hook("p2v.fail", fail, stdout, stderr) {
                warn!(%err, "failure hook did not complete");
            }
        }
        return Err(CliError::Conversion(source));
    }

    let _ = write!(
        stdout,
        "{}\n\n\n\n",
        painter.paint(Marker::Success, "Conversion finished successfully.")
    );
    let _ = stdout.flush();

    if let Some(post) = &hooks.post {
        run_hook("p2v.post", post, stdout, stderr)?;
    }
    Ok(())
}

/// Writes one conversion notification to the console.
pub(crate) fn print_notification<Out: Write>(
    notification: &Notification,
    painter: Painter,
    stdout: &mut Out,
) {
    let _ = match notification {
        Notification::Status(status) => writeln!(
            stdout,
            "{}",
            painter.paint(Marker::Status, &format!("{PROGRAM_NAME}: {status}"))
        ),
        Notification::LogDir(dir) => {
            writeln!(stdout, "{PROGRAM_NAME}: remote log directory location: {dir}")
        }
        Notification::RemoteMessage(text) => stdout.write_all(text.as_bytes()),
    };
    let _ = stdout.flush();
}

/// Runs `command` with `/bin/sh`, copying its output to ours.
fn run_hook<Out, Err>(
    hook: &'static str,
    command: &str,
    stdout: &mut Out,
    stderr: &mut Err,
) -> Result<(), CliError>
where
    Out: Write,
    Err: Write,
{
    info!(hook, command, "executing");
    let output = Command::new("/bin/sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .output()
        .map_err(|source| CliError::HookSpawn {
            hook,
            command: command.to_owned(),
            source,
        })?;
    let _ = stdout.write_all(&output.stdout);
    let _ = stderr.write_all(&output.stderr);

    if output.status.success() {
        Ok(())
    } else {
        Err(CliError::HookFailed {
            hook,
            status: output.status,
        })
    }
}

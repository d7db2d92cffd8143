#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `cli` implements the `virt-p2v` command line. The program boots from the
//! conversion ISO, reads its configuration from `p2v.*` keys on the kernel
//! command line and streams the machine's disks to a virt-v2v conversion
//! server without operator input.
//!
//! # Design
//!
//! [`run`] accepts an iterator of arguments together with handles for
//! standard output and error, so tests can drive the whole front end with
//! in-memory buffers. A `clap` command definition recognises `--help`,
//! `--version`, `--verbose`, `--colours`, `--iso`, `--nbd`, `--test-disk`
//! and `--cmdline`. When the command line names a conversion server the
//! kernel mode runs:
//!
//! 1. `p2v.pre`, if given;
//! 2. the connection test, unless `p2v.skip_test_connection`;
//! 3. the conversion, with SIGINT and SIGTERM wired to cancellation;
//! 4. `p2v.fail` on error, otherwise a success marker followed by
//!    `p2v.post` (`poweroff` by default when booted as root). A cancelled
//!    conversion runs neither hook.
//!
//! Without `p2v.server` there is nothing to do: the graphical front end is
//! not part of this program.
//!
//! # Invariants
//!
//! - `run` never panics; failures surface as non-zero exit codes.
//! - Exit code `0` means the conversion finished, `1` that it failed, `2`
//!   that the arguments could not be parsed and `130` that SIGINT or
//!   SIGTERM cancelled it.
//! - Conversion output goes to standard output; diagnostics go to standard
//!   error.
//!
//! # Errors
//!
//! Failures are rendered from [`CliError`] as a single line prefixed with the
//! program name, coloured red when colour is enabled.
//!
//! # Examples
//!
//! ```
//! let mut stdout = Vec::new();
//! let mut stderr = Vec::new();
//! let exit_code = cli::run(["virt-p2v", "--version"], &mut stdout, &mut stderr);
//!
//! assert_eq!(exit_code, 0);
//! assert!(String::from_utf8(stdout).unwrap().starts_with("virt-p2v "));
//! assert!(stderr.is_empty());
//! ```

use std::ffi::OsString;
use std::io::{self, Write};
use std::process::ExitCode;

use config::{Config, KernelCmdline, PROC_CMDLINE, apply_kernel_cmdline};
use conversion::{CancelToken, ConversionSession};
use logging::ansi::{Marker, Painter};
use nbd::{DEFAULT_SERVERS, NbdPrograms, parse_nbd_option, select_server};
use ssh::{PortAllocator, SshDriver};
use tracing::debug;

mod arguments;
mod error;
mod kernel;

pub use error::CliError;

use arguments::{HELP_TEXT, PROGRAM_NAME, ParsedArgs, parse_args};
use kernel::{CmdlineSource, Hooks, kernel_conversion};

/// Exit code for a finished conversion or an informational request.
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code for a failed or cancelled conversion.
pub const EXIT_FAILURE: i32 = 1;

/// Exit code for arguments that could not be parsed.
pub const EXIT_USAGE: i32 = 2;

/// Exit code for a conversion stopped by SIGINT or SIGTERM.
pub const EXIT_CANCELLED: i32 = 130;

/// Maximum exit code representable by a Unix process.
const MAX_EXIT_CODE: i32 = u8::MAX as i32;

/// Runs `virt-p2v` with `arguments`, colouring output only when
/// `--colours` is given.
pub fn run<I, S, Out, Err>(arguments: I, stdout: &mut Out, stderr: &mut Err) -> i32
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
    Out: Write,
    Err: Write,
{
    run_inner(arguments, stdout, stderr, false)
}

/// Entry point for the binary: like [`run`], but also colours output when
/// the process's standard output is a terminal.
pub fn run_with<I, S, Out, Err>(arguments: I, stdout: &mut Out, stderr: &mut Err) -> ExitCode
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
    Out: Write,
    Err: Write,
{
    exit_code_from(run_inner(arguments, stdout, stderr, true))
}

/// Converts a numeric exit code into an [`std::process::ExitCode`].
#[must_use]
pub fn exit_code_from(status: i32) -> ExitCode {
    let clamped = status.clamp(0, MAX_EXIT_CODE);
    ExitCode::from(u8::try_from(clamped).unwrap_or(u8::MAX))
}

fn run_inner<I, S, Out, Err>(
    arguments: I,
    stdout: &mut Out,
    stderr: &mut Err,
    detect_terminal: bool,
) -> i32
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
    Out: Write,
    Err: Write,
{
    let parsed = match parse_args(arguments) {
        Ok(parsed) => parsed,
        Err(error) => {
            let _ = write!(stderr, "{error}");
            return EXIT_USAGE;
        }
    };

    if parsed.show_help {
        let _ = stdout.write_all(HELP_TEXT.as_bytes());
        return EXIT_SUCCESS;
    }
    if parsed.show_version {
        let _ = writeln!(stdout, "{PROGRAM_NAME} {}", env!("CARGO_PKG_VERSION"));
        return EXIT_SUCCESS;
    }

    let painter = if detect_terminal {
        Painter::detect(parsed.colours, io::stdout())
    } else {
        Painter::new(parsed.colours)
    };
    match execute(parsed, painter, stdout, stderr) {
        Ok(()) => EXIT_SUCCESS,
        Err(err) => report(&err, painter, stderr),
    }
}

/// Writes the final line for `err` and picks the exit code.
fn report<Err: Write>(err: &CliError, painter: Painter, stderr: &mut Err) -> i32 {
    let (marker, code) = match err {
        CliError::Cancelled => (Marker::Status, EXIT_CANCELLED),
        _ => (Marker::Error, EXIT_FAILURE),
    };
    let _ = writeln!(
        stderr,
        "{}",
        painter.paint(marker, &format!("{PROGRAM_NAME}: {err}"))
    );
    code
}

fn execute<Out, Err>(
    parsed: ParsedArgs,
    painter: Painter,
    stdout: &mut Out,
    stderr: &mut Err,
) -> Result<(), CliError>
where
    Out: Write,
    Err: Write,
{
    let candidates = match parsed.nbd.as_deref() {
        Some(option) => parse_nbd_option(option)?,
        None => DEFAULT_SERVERS.to_vec(),
    };

    let (cmdline, source) = match parsed.cmdline.as_deref() {
        Some(line) => (KernelCmdline::parse(line), CmdlineSource::Argument),
        None => (read_proc_cmdline(), CmdlineSource::Proc),
    };

    let debug_requested = cmdline.contains("p2v.debug");
    let verbosity = if debug_requested {
        parsed.verbose.max(2)
    } else {
        parsed.verbose
    };
    if let Err(err) = logging::init_tracing(verbosity, painter.enabled()) {
        debug!(%err, "keeping the installed subscriber");
    }

    if cmdline.get("p2v.server").is_none() {
        return Err(CliError::NoServer);
    }

    let mut config = Config::detect();
    apply_kernel_cmdline(&mut config, &cmdline)?;
    if let Some(disk) = parsed.test_disk {
        config.disks = vec![disk];
    }
    config.colours = painter.enabled();
    config.verbose |= parsed.verbose > 0;
    if config.verbose {
        let _ = config.print(stdout);
    }

    let kind = select_server(&candidates, &NbdPrograms::default())?;
    let ports = if parsed.iso {
        PortAllocator::fixed()
    } else {
        PortAllocator::randomized()
    };
    let session = ConversionSession::new(config, SshDriver::new(ports), kind);

    let cancel = CancelToken::new();
    platform::signal::register_termination_flag(cancel.flag()).map_err(CliError::Signals)?;

    let hooks = Hooks::from_cmdline(&cmdline, source, nix::unistd::geteuid().is_root());
    kernel_conversion(&session, &hooks, &cancel, painter, stdout, stderr)
}

fn read_proc_cmdline() -> KernelCmdline {
    KernelCmdline::read(PROC_CMDLINE).unwrap_or_else(|err| {
        debug!(%err, "no kernel command line");
        KernelCmdline::default()
    })
}

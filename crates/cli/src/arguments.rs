//! Command-line definition and parsing.

use std::ffi::OsString;

use clap::{Arg, ArgAction, Command};

/// Program name used in messages.
pub(crate) const PROGRAM_NAME: &str = "virt-p2v";

/// Deterministic help text describing the supported options.
pub(crate) const HELP_TEXT: &str = concat!(
    "virt-p2v: Convert a physical machine to use KVM\n",
    "Usage:\n",
    "  virt-p2v [--options]\n",
    "Options:\n",
    "  -h, --help               Display brief help\n",
    "      --cmdline=CMDLINE    Use CMDLINE instead of /proc/cmdline\n",
    "      --colours            Use ANSI colour sequences even if not tty\n",
    "      --iso                Running in the virt-p2v ISO environment\n",
    "      --nbd=qemu-nbd,nbdkit,...  Search order for NBD servers\n",
    "      --test-disk=DISK.IMG For testing, use disk as /dev/sda\n",
    "  -v, --verbose            Verbose messages\n",
    "  -V, --version            Display version and exit\n",
    "The conversion is configured with p2v.* keys on the kernel command line,\n",
    "starting with p2v.server=SERVER.\n",
);

/// Parsed command-line options.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ParsedArgs {
    pub(crate) show_help: bool,
    pub(crate) show_version: bool,
    pub(crate) verbose: u8,
    pub(crate) colours: bool,
    pub(crate) iso: bool,
    pub(crate) nbd: Option<String>,
    pub(crate) test_disk: Option<String>,
    pub(crate) cmdline: Option<String>,
}

/// Builds the `clap` command used for parsing.
fn clap_command() -> Command {
    Command::new(PROGRAM_NAME)
        .disable_help_flag(true)
        .disable_version_flag(true)
        .arg(
            Arg::new("help")
                .long("help")
                .short('h')
                .help("Display brief help.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("version")
                .long("version")
                .short('V')
                .help("Display version and exit.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Verbose messages; repeat for more detail.")
                .action(ArgAction::Count),
        )
        .arg(
            Arg::new("colours")
                .long("colours")
                .aliases(["colors", "colour", "color"])
                .help("Use ANSI colour sequences even if not a terminal.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("iso")
                .long("iso")
                .help("Running in the virt-p2v ISO environment.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("nbd")
                .long("nbd")
                .value_name("SERVERS")
                .help("Comma-separated search order for NBD servers.")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("test-disk")
                .long("test-disk")
                .value_name("DISK")
                .help("Convert DISK instead of the disks found on this machine.")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("cmdline")
                .long("cmdline")
                .value_name("CMDLINE")
                .help("Read p2v.* keys from CMDLINE instead of /proc/cmdline.")
                .action(ArgAction::Set),
        )
}

/// Parses command-line arguments into a [`ParsedArgs`] structure.
pub(crate) fn parse_args<I, S>(arguments: I) -> Result<ParsedArgs, clap::Error>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    let mut args: Vec<OsString> = arguments.into_iter().map(Into::into).collect();
    if args.is_empty() {
        args.push(OsString::from(PROGRAM_NAME));
    }

    let mut matches = clap_command().try_get_matches_from(args)?;
    Ok(ParsedArgs {
        show_help: matches.get_flag("help"),
        show_version: matches.get_flag("version"),
        verbose: matches.get_count("verbose"),
        colours: matches.get_flag("colours"),
        iso: matches.get_flag("iso"),
        nbd: matches.remove_one::<String>("nbd"),
        test_disk: matches.remove_one::<String>("test-disk"),
        cmdline: matches.remove_one::<String>("cmdline"),
    })
}

//! The shell script that runs virt-v2v on the conversion server.

use std::fmt::Write as _;

use config::Config;
use ssh::quote::{double_quote, single_quote};

use crate::physical::PHYSICAL_XML;

/// Name of the uploaded script.
pub const WRAPPER_SCRIPT: &str = "virt-v2v-wrapper.sh";

/// Name of the full virt-v2v log in the remote directory.
pub const CONVERSION_LOG: &str = "virt-v2v-conversion-log.txt";

/// Log lines sent back when virt-v2v fails.
pub const FAILURE_TAIL_LINES: usize = 50;

/// The virt-v2v invocation for `config`, without redirections.
///
/// `colours` adds `--colours`; pass it only when the remote virt-v2v
/// advertised `colours-option`.
pub fn v2v_command(config: &Config, colours: bool) -> String {
    let mut command = String::new();
    if config.sudo {
        command.push_str("sudo -n ");
    }
    command.push_str("virt-v2v -v -x");
    if colours {
        command.push_str(" --colours");
    }
    command.push_str(" -i libvirtxml");

    let output = &config.output;
    let _ = write!(command, " -o {}", double_quote(&output.driver));
    if let Some(allocation) = output.allocation.as_arg() {
        let _ = write!(command, " -oa {allocation}");
    }
    for (flag, value) in [
        ("-oc", &output.connection),
        ("-of", &output.format),
        ("-os", &output.storage),
    ] {
        if let Some(value) = value {
            let _ = write!(command, " {flag} {}", double_quote(value));
        }
    }
    let _ = write!(command, " --root first {PHYSICAL_XML}");
    command
}

/// The complete wrapper script for a run in `remote_dir`.
///
/// The script leaves `status` holding virt-v2v's exit status (99 if it
/// never ran) and exits with it.
pub fn wrapper_script(config: &Config, remote_dir: &str, colours: bool) -> String {
    let dir = single_quote(remote_dir);
    let sudo = if config.sudo { "sudo -n " } else { "" };
    let v2v = v2v_command(config, colours);
    format!(
        r#"#!/bin/bash -
# Runs virt-v2v for virt-p2v.

cd {dir} || exit 99

v2v ()
{{
  {v2v} </dev/null
  echo $? > status
}}

# Overwritten by v2v once virt-v2v has run.
echo 99 > status

printenv > environment
{sudo}virt-v2v --version > v2v-version 2>&1

log={CONVERSION_LOG}
rm -f $log

# stdout goes back to virt-p2v; stderr only to the log.
v2v 2>>$log | tee -a $log

status=$(< status)
if [ "$status" -ne 0 ]; then
  echo
  echo
  echo -ne '\e[1;31m'
  echo '***' virt-v2v command failed '***'
  echo
  echo The full log is available on the conversion server in:
  echo '   ' {dir}/$log
  echo Only the last {FAILURE_TAIL_LINES} lines are shown below.
  echo -ne '\e[0m'
  echo
  echo
  tail -{FAILURE_TAIL_LINES} $log
fi
exit $status
"#
    )
}

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::{write_bash_script, write_script};

/// Password the fake ssh accepts.
pub const FAKE_PASSWORD: &str = "secret";

/// Remote port the fake ssh claims to have allocated for `-R`.
pub const FAKE_REMOTE_PORT: u16 = 41234;

/// Host name for which the fake ssh fails name resolution.
pub const UNRESOLVABLE_HOST: &str = "nowhere.invalid";

const FAKE_SSH: &str = r#"
export HOME="@DIR@"
export PATH="@DIR@/bin:$PATH"
host= forward= key=
while [ $# -gt 0 ]; do
  case "$1" in
    -R) forward=$2; shift 2 ;;
    -i) key=$2; shift 2 ;;
    -p|-l|-o) shift 2 ;;
    -N) shift ;;
    *) host=$1; shift ;;
  esac
done
echo "$host" >> "@DIR@/connections"
if [ "$host" = "@UNRESOLVABLE@" ]; then
  printf 'ssh: Could not resolve hostname %s: Name or service not known\r\n' "$host"
  exit 255
fi
if [ -z "$key" ]; then
  while :; do
    printf "root@%s's password: " "$host"
    IFS= read -r password || exit 255
    [ "$password" = "@PASSWORD@" ] && break
    printf 'Permission denied, please try again.\r\n'
  done
fi
if [ -n "$forward" ]; then
  printf 'Allocated port @PORT@ for remote forward to %s\r\n' "${forward#0:}"
  exec sleep 60
fi
printf 'Last login: Mon Oct 19 10:00:00 2026\r\n'
# A remote terminal turns ^C into SIGINT.
stty isig 2>/dev/null
exec bash --norc --noediting -i
"#;

/// A conversion server simulated on the local machine.
///
/// `ssh` is a bash script that asks for [`FAKE_PASSWORD`] unless given an
/// identity, then runs an interactive bash with `bin/` first on `PATH`.
/// `-R` connections print the allocation message and sleep instead.
#[derive(Debug)]
pub struct FakeServer {
    root: PathBuf,
    ssh: PathBuf,
}

impl FakeServer {
    /// Installs the fake `ssh` into `dir`.
    pub fn install(dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(dir.join("bin"))?;
        let script = FAKE_SSH
            .replace("@DIR@", &dir.display().to_string())
            .replace("@UNRESOLVABLE@", UNRESOLVABLE_HOST)
            .replace("@PASSWORD@", FAKE_PASSWORD)
            .replace("@PORT@", &FAKE_REMOTE_PORT.to_string());
        let ssh = write_bash_script(dir, "ssh", &script)?;
        Ok(Self {
            root: dir.to_path_buf(),
            ssh,
        })
    }

    /// Path of the fake `ssh`.
    pub fn ssh(&self) -> &Path {
        &self.ssh
    }

    /// Installs a remote command named `name` with a `#!/bin/sh` body.
    pub fn add_remote_command(&self, name: &str, body: &str) -> io::Result<PathBuf> {
        write_script(&self.root.join("bin"), name, body)
    }

    /// Installs a `virt-v2v` that reports `version` and the usual
    /// machine-readable feature list, and runs `conversion` for anything
    /// else.
    pub fn add_virt_v2v(&self, version: &str, conversion: &str) -> io::Result<PathBuf> {
        let body = format!(
            r#"case "$1" in
  --version) echo "virt-v2v {version}" ;;
  --machine-readable)
    printf 'virt-v2v\nlibguestfs-rewrite\ncolours-option\n'
    printf 'input:disk\ninput:libvirt\ninput:libvirtxml\n'
    printf 'output:glance\noutput:libvirt\noutput:local\noutput:vdsm\n' ;;
  *)
{conversion}
    ;;
esac"#
        );
        self.add_remote_command("virt-v2v", &body)
    }

    /// Host names the fake ssh was asked to connect to, in order.
    pub fn connections(&self) -> Vec<String> {
        fs::read_to_string(self.root.join("connections"))
            .map(|log| log.lines().map(str::to_owned).collect())
            .unwrap_or_default()
    }
}

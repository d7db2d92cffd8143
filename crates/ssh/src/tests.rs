use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;

use proptest::prelude::*;

use crate::command::{AuthMethod, SshCommand};
use crate::error::{ErrorClass, SshError, VersionError};
use crate::forward::{FIXED_PORT_BASE, PortAllocator};
use crate::identity::IdentityCache;
use crate::patterns::patterns;
use crate::probe::{RemoteCapabilities, compatible_version, parse_version};
use crate::quote::{double_quote, single_quote};
use crate::state::SessionState;
use crate::token::{TOKEN_LEN, heredoc_delimiter, heredoc_delimiter_with, random_token};
use crate::upload::{RemoteFile, heredoc_command};

fn strings(args: &[OsString]) -> Vec<String> {
    args.iter()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect()
}

#[test]
fn password_command_line() {
    let mut command = SshCommand::new("conversion.example.com");
    command.set_user("root");
    command.set_port(2222);

    let (program, args) = command.into_parts();
    assert_eq!(program, "ssh");
    assert_eq!(
        strings(&args),
        [
            "-p",
            "2222",
            "-l",
            "root",
            "-o",
            "StrictHostKeyChecking=no",
            "-o",
            "PreferredAuthentications=keyboard-interactive,password",
            "conversion.example.com",
        ]
    );
}

#[test]
fn public_key_command_line_with_forward() {
    let mut command = SshCommand::new("v2v");
    command.set_program("/usr/local/bin/ssh");
    command.set_user("builder");
    command.set_port(22);
    command.set_auth(AuthMethod::PublicKey(PathBuf::from("/tmp/id.abc")));
    command.push_option("-R");
    command.push_option("0:localhost:50123");
    command.push_option("-N");

    let (program, args) = command.into_parts();
    assert_eq!(program, "/usr/local/bin/ssh");
    assert_eq!(
        strings(&args),
        [
            "-p",
            "22",
            "-l",
            "builder",
            "-o",
            "StrictHostKeyChecking=no",
            "-o",
            "PreferredAuthentications=publickey",
            "-i",
            "/tmp/id.abc",
            "-R",
            "0:localhost:50123",
            "-N",
            "v2v",
        ]
    );
}

#[test]
fn state_machine_accepts_the_documented_paths() {
    use SessionState::*;

    let mut state = Spawned;
    state.advance(AuthWait).unwrap();
    state.advance(ShellSync).unwrap();
    state.advance(Ready).unwrap();
    state.advance(Closed).unwrap();

    assert!(Spawned.can_advance_to(Ready));
    assert!(AuthWait.can_advance_to(Ready));
    assert!(Spawned.can_advance_to(ShellSync));
}

#[test]
fn state_machine_rejects_going_backwards() {
    use SessionState::*;

    assert!(!Ready.can_advance_to(AuthWait));
    assert!(!ShellSync.can_advance_to(AuthWait));
    assert!(!Closed.can_advance_to(Ready));
    assert!(!Closed.can_advance_to(Closed));

    let mut state = Closed;
    let err = state.advance(Ready).unwrap_err();
    assert!(matches!(
        err,
        SshError::IllegalTransition {
            from: Closed,
            to: Ready
        }
    ));
    assert_eq!(err.class(), ErrorClass::Internal);
    assert_eq!(state, Closed);
}

#[test]
fn version_parsing_uses_leading_digits() {
    assert_eq!(parse_version("1.28.0"), Ok((1, 28)));
    assert_eq!(parse_version("1.40.2rc1"), Ok((1, 40)));
    assert_eq!(parse_version("2.0"), Ok((2, 0)));
    assert_eq!(
        parse_version("1"),
        Err(VersionError::Unparseable("1".to_owned()))
    );
    assert!(parse_version("one.two").is_err());
}

#[test]
fn compatible_versions() {
    assert!(compatible_version("1.28.1").is_ok());
    assert!(compatible_version("1.42.0").is_ok());
    assert_eq!(
        compatible_version("1.27.9"),
        Err(VersionError::TooOld {
            version: "1.27.9".to_owned()
        })
    );
    assert_eq!(
        compatible_version("2.2.0"),
        Err(VersionError::MajorMismatch {
            version: "2.2.0".to_owned()
        })
    );
}

#[test]
fn version_error_classes() {
    let unparseable = SshError::from(VersionError::Unparseable("x".to_owned()));
    let too_old = SshError::from(VersionError::TooOld {
        version: "1.20".to_owned(),
    });
    assert_eq!(unparseable.class(), ErrorClass::Internal);
    assert_eq!(too_old.class(), ErrorClass::Protocol);
    assert!(too_old.to_string().contains(">= 1.28"));
}

#[test]
fn error_classes() {
    assert_eq!(SshError::NoServer.class(), ErrorClass::Protocol);
    assert_eq!(
        SshError::Timeout {
            waiting_for: "command prompt"
        }
        .class(),
        ErrorClass::Timeout
    );
    assert_eq!(
        SshError::SudoPasswordRequired {
            user: "v2v".to_owned()
        }
        .class(),
        ErrorClass::Protocol
    );
    assert_eq!(
        SshError::Send(std::io::Error::other("broken pipe")).class(),
        ErrorClass::Io
    );
    assert_eq!(SshError::MissingRewriteMarker.class(), ErrorClass::Protocol);
}

#[test]
fn sudo_error_names_the_user_and_sudoers() {
    let message = SshError::SudoPasswordRequired {
        user: "builder".to_owned(),
    }
    .to_string();
    assert!(message.contains("\"builder\""));
    assert!(message.contains("NOPASSWD:"));
}

#[test]
fn vdsm_output_is_hidden() {
    let mut capabilities = RemoteCapabilities::default();
    capabilities.add_output_driver("libvirt".to_owned());
    capabilities.add_output_driver("vdsm".to_owned());
    capabilities.add_output_driver("local".to_owned());
    capabilities.add_input_driver("libvirtxml".to_owned());
    assert_eq!(capabilities.output_drivers, ["libvirt", "local"]);
    assert_eq!(capabilities.input_drivers, ["libvirtxml"]);
}

#[test]
fn tokens_are_lowercase_alphanumeric() {
    for _ in 0..100 {
        let token = random_token();
        assert_eq!(token.len(), TOKEN_LEN);
        assert!(
            token
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        );
    }
}

#[test]
fn delimiter_skips_colliding_tokens() {
    let contents = b"line one\n__aaaaaaaa__\n";
    let mut candidates = ["aaaaaaaa", "bbbbbbbb"].into_iter();
    let delimiter = heredoc_delimiter_with(contents, || {
        candidates.next().unwrap_or("cccccccc").to_owned()
    });
    assert_eq!(delimiter, "__bbbbbbbb__");
}

proptest! {
    #[test]
    fn delimiter_never_occurs_in_contents(
        prefix in proptest::collection::vec(any::<u8>(), 0..256),
        suffix in "[a-z0-9_\n]{0,64}",
    ) {
        let mut contents = prefix;
        contents.extend_from_slice(suffix.as_bytes());
        let delimiter = heredoc_delimiter(&contents);
        prop_assert!(delimiter.starts_with("__") && delimiter.ends_with("__"));
        prop_assert!(!contents
            .windows(delimiter.len())
            .any(|window| window == delimiter.as_bytes()));
    }
}

#[test]
fn heredoc_with_trailing_newline() {
    let command = heredoc_command("/tmp/dir/name", b"guest\n", "__k3x9q2m1__");
    assert_eq!(
        command,
        b"cat > '/tmp/dir/name' << '__k3x9q2m1__'\nguest\n__k3x9q2m1__\n"
    );
}

#[test]
fn heredoc_without_trailing_newline_truncates() {
    let command = heredoc_command("/tmp/x", b"<domain/>", "__d__");
    assert_eq!(
        command,
        b"cat > '/tmp/x' << '__d__' && truncate -s -1 '/tmp/x'\n<domain/>\n__d__\n"
    );
}

#[test]
fn heredoc_of_empty_file() {
    assert_eq!(
        heredoc_command("/tmp/empty", b"", "__e__"),
        b"cat > '/tmp/empty' << '__e__'\n__e__\n"
    );
}

#[test]
fn remote_file_constructors() {
    let script = RemoteFile::executable("virt-v2v-wrapper.sh", "#!/bin/bash\n");
    assert!(script.executable);
    let name = RemoteFile::new("name", "guest\n");
    assert!(!name.executable);
    assert_eq!(name.contents, b"guest\n");
}

#[test]
fn quoting() {
    assert_eq!(single_quote("plain"), "'plain'");
    assert_eq!(single_quote("it's"), "'it'\\''s'");
    assert_eq!(double_quote("a $HOME `x` \\ \""), "\"a \\$HOME \\`x\\` \\\\ \\\"\"");
}

#[test]
fn ports_increase_from_the_fixed_base() {
    let mut ports = PortAllocator::fixed();
    assert_eq!(ports.allocate(), FIXED_PORT_BASE);
    assert_eq!(ports.allocate(), FIXED_PORT_BASE + 1);
    assert_eq!(ports.allocate(), FIXED_PORT_BASE + 2);
}

#[test]
fn randomized_ports_stay_in_range() {
    for _ in 0..20 {
        let mut ports = PortAllocator::randomized();
        let first = ports.allocate();
        assert!((50000..60000).contains(&first));
        assert_eq!(ports.allocate(), first + 1);
    }
}

#[test]
fn line_patterns_need_the_line_ending() {
    let patterns = patterns().unwrap();
    assert!(!patterns.version.is_match(b"virt-v2v 1.4"));
    assert!(patterns.version.is_match(b"virt-v2v 1.42.0\r\n"));
    assert!(!patterns.version.is_match(b"virt-v2v --version\r\n"));
    assert!(!patterns.input.is_match(b"input:libvi"));
    assert!(patterns.output.is_match(b"output:local\n"));
    assert!(
        patterns
            .ssh_message
            .is_match(b"ssh: connect to host x port 22: Connection refused\r\n")
    );
}

#[test]
fn prompt_pattern_ignores_the_echoed_command() {
    let patterns = patterns().unwrap();
    assert!(!patterns.prompt.is_match(b"export LANG=C PS1='###''abcd1234''### '\r\n"));
    assert!(patterns.prompt.is_match(b"###abcd1234### "));
    assert!(patterns.password.is_match(b"root@host's Password: "));
    assert!(
        patterns
            .port_forward
            .is_match(b"Allocated port 41234 for remote forward to localhost:50123\r\n")
    );
}

#[test]
fn local_identity_is_used_in_place() {
    let mut cache = IdentityCache::default();
    assert_eq!(
        cache.resolve("/root/.ssh/id_rsa").unwrap(),
        PathBuf::from("/root/.ssh/id_rsa")
    );
}

#[test]
fn url_identity_is_downloaded_once() {
    let dir = test_support::TempDir::new().unwrap();
    let calls = dir.path().join("calls");
    let curl = test_support::write_script(
        dir.path(),
        "curl",
        &format!(
            "echo \"$@\" >> '{}'\nprintf 'PRIVATE KEY\\n' > \"$5\"",
            calls.display()
        ),
    )
    .unwrap();

    let mut cache = IdentityCache::new(curl);
    let first = cache.resolve("https://example.com/id_rsa").unwrap();
    let second = cache.resolve("https://example.com/id_rsa").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read(&first).unwrap(), b"PRIVATE KEY\n");

    let log = fs::read_to_string(&calls).unwrap();
    assert_eq!(log.lines().count(), 1);
    assert!(log.starts_with("-f -s -S -o "));
    assert!(log.trim_end().ends_with("https://example.com/id_rsa"));

    drop(cache);
    assert!(!first.exists());
}

#[test]
fn failed_download_reports_curl_stderr() {
    let dir = test_support::TempDir::new().unwrap();
    let curl = test_support::write_script(
        dir.path(),
        "curl",
        "echo 'curl: (22) The requested URL returned error: 404' >&2\nexit 22",
    )
    .unwrap();

    let mut cache = IdentityCache::new(curl);
    let err = cache.resolve("http://example.com/missing").unwrap_err();
    assert!(matches!(err, SshError::Identity { .. }));
    assert!(err.to_string().contains("404"));
    assert_eq!(err.class(), ErrorClass::Io);
}

use std::sync::LazyLock;

use expect::{Pattern, PatternError};

use crate::error::SshError;

/// Every pattern the driver recognises in ssh output.
pub(crate) struct Patterns {
    pub(crate) password: Pattern,
    pub(crate) ssh_message: Pattern,
    pub(crate) sudo_password: Pattern,
    pub(crate) prompt: Pattern,
    pub(crate) version: Pattern,
    pub(crate) rewrite: Pattern,
    pub(crate) colours: Pattern,
    pub(crate) input: Pattern,
    pub(crate) output: Pattern,
    pub(crate) port_forward: Pattern,
}

impl Patterns {
    fn compile() -> Result<Self, PatternError> {
        Ok(Self {
            password: Pattern::new("(?i)password:")?,
            // Line-terminated so the message is never cut at a read boundary.
            ssh_message: Pattern::new(r"(ssh: [^\r\n]*)\r?\n")?,
            sudo_password: Pattern::new("sudo: a password is required")?,
            prompt: Pattern::new("###([0-9a-z]{8})### ")?,
            version: Pattern::new(r"virt-v2v ([1-9][^\r\n]*)\r?\n")?,
            rewrite: Pattern::new("libguestfs-rewrite")?,
            colours: Pattern::new("colours-option")?,
            input: Pattern::new(r"input:(\w*)\r?\n")?,
            output: Pattern::new(r"output:(\w*)\r?\n")?,
            port_forward: Pattern::new(r"Allocated port (\d+) for remote forward")?,
        })
    }
}

static PATTERNS: LazyLock<Result<Patterns, PatternError>> = LazyLock::new(Patterns::compile);

pub(crate) fn patterns() -> Result<&'static Patterns, SshError> {
    PATTERNS
        .as_ref()
        .map_err(|err| SshError::BadPattern(err.to_string()))
}

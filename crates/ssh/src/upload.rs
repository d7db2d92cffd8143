use crate::quote::single_quote;

/// A file to create in the remote working directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteFile {
    /// File name relative to the remote directory.
    pub name: String,
    /// Exact bytes to store.
    pub contents: Vec<u8>,
    /// Mark the file executable after upload.
    pub executable: bool,
}

impl RemoteFile {
    /// A plain data file.
    pub fn new(name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
            executable: false,
        }
    }

    /// An executable script.
    pub fn executable(name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            executable: true,
            ..Self::new(name, contents)
        }
    }
}

/// Shell input that writes `contents` to `path` through a quoted heredoc.
///
/// A heredoc always ends its body with a newline, so content without one
/// gets a newline for transport and loses it again with `truncate`.
/// `delimiter` must not occur in `contents`.
pub fn heredoc_command(path: &str, contents: &[u8], delimiter: &str) -> Vec<u8> {
    let path = single_quote(path);
    let trailing_newline = contents.is_empty() || contents.ends_with(b"\n");

    let mut command =
        Vec::with_capacity(contents.len() + 2 * delimiter.len() + 2 * path.len() + 48);
    command.extend_from_slice(format!("cat > {path} << '{delimiter}'").as_bytes());
    if !trailing_newline {
        command.extend_from_slice(format!(" && truncate -s -1 {path}").as_bytes());
    }
    command.push(b'\n');
    command.extend_from_slice(contents);
    if !trailing_newline {
        command.push(b'\n');
    }
    command.extend_from_slice(delimiter.as_bytes());
    command.push(b'\n');
    command
}

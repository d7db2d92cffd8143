use rand::Rng;

const TOKEN_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Length of prompt tokens and of the random part of heredoc delimiters.
pub const TOKEN_LEN: usize = 8;

/// Eight random characters from `[a-z0-9]`.
pub fn random_token() -> String {
    let mut rng = rand::thread_rng();
    (0..TOKEN_LEN)
        .map(|_| char::from(TOKEN_CHARS[rng.gen_range(0..TOKEN_CHARS.len())]))
        .collect()
}

/// A heredoc delimiter `__<token>__` that does not occur in `contents`.
///
/// A collision is astronomically unlikely, but a fresh token is drawn until
/// there is none.
pub fn heredoc_delimiter(contents: &[u8]) -> String {
    heredoc_delimiter_with(contents, random_token)
}

pub(crate) fn heredoc_delimiter_with(
    contents: &[u8],
    mut next_token: impl FnMut() -> String,
) -> String {
    loop {
        let delimiter = format!("__{}__", next_token());
        if !contains(contents, delimiter.as_bytes()) {
            return delimiter;
        }
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

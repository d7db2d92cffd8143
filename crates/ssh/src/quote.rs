//! Shell quoting for commands and scripts sent to the conversion server.

/// Quotes `value` with single quotes, escaping embedded single quotes.
///
/// The result is a single shell word with no expansion at all.
pub fn single_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(ch);
        }
    }
    quoted.push('\'');
    quoted
}

/// Quotes `value` with double quotes, escaping `$`, backquote, backslash
/// and double quote.
pub fn double_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        if matches!(ch, '$' | '`' | '\\' | '"') {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

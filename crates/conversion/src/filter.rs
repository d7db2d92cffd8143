//! Turns raw terminal output from the control connection into text for
//! display.

const ESC: u8 = 0x1b;
const BEL: u8 = 0x07;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Escape {
    None,
    Start,
    Intermediate,
    Csi,
    Osc,
    OscEscape,
}

/// Streaming filter for virt-v2v output.
///
/// Each chunk is filtered as it arrives; state that spans chunk boundaries
/// (a pending `\r`, an unfinished escape sequence, a split UTF-8
/// character) is carried to the next [`push`](Self::push).
#[derive(Debug)]
pub struct OutputFilter {
    keep_colours: bool,
    escape: Escape,
    pending_cr: bool,
    partial: Vec<u8>,
}

impl OutputFilter {
    /// A filter that removes ANSI escape sequences unless `keep_colours`.
    pub fn new(keep_colours: bool) -> Self {
        Self {
            keep_colours,
            escape: Escape::None,
            pending_cr: false,
            partial: Vec::new(),
        }
    }

    /// Filters `chunk` and returns the text that is complete so far.
    pub fn push(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.partial);
        bytes.reserve(chunk.len());
        for &byte in chunk {
            if self.keep_colours || self.visible(byte) {
                self.push_line_ending(byte, &mut bytes);
            }
        }
        self.decode(&bytes)
    }

    /// Flushes whatever is still held back at end of stream.
    pub fn finish(&mut self) -> String {
        let mut bytes = std::mem::take(&mut self.partial);
        if std::mem::take(&mut self.pending_cr) {
            bytes.push(b'\r');
        }
        self.escape = Escape::None;
        String::from_utf8_lossy(&bytes).into_owned()
    }

    // Advances the escape-sequence state; true when `byte` is text.
    fn visible(&mut self, byte: u8) -> bool {
        self.escape = match (self.escape, byte) {
            (Escape::None, ESC) => Escape::Start,
            (Escape::None, _) => return true,
            (Escape::Start, b'[') => Escape::Csi,
            (Escape::Start, b']') => Escape::Osc,
            (Escape::Start | Escape::Intermediate, 0x20..=0x2f) => Escape::Intermediate,
            (Escape::Csi, 0x40..=0x7e) | (Escape::Osc, BEL) | (Escape::OscEscape, b'\\') => {
                Escape::None
            }
            (Escape::Csi, _) => Escape::Csi,
            (Escape::Osc | Escape::OscEscape, ESC) => Escape::OscEscape,
            (Escape::Osc | Escape::OscEscape, _) => Escape::Osc,
            // `ESC 7`, `ESC ( B` and the like end with their final byte.
            (Escape::Start | Escape::Intermediate, _) => Escape::None,
        };
        false
    }

    fn push_line_ending(&mut self, byte: u8, out: &mut Vec<u8>) {
        if std::mem::take(&mut self.pending_cr) && byte != b'\n' {
            out.push(b'\r');
        }
        if byte == b'\r' {
            self.pending_cr = true;
        } else {
            out.push(byte);
        }
    }

    // Decodes `bytes`, keeping an unfinished trailing character for later
    // and replacing invalid sequences.
    fn decode(&mut self, mut bytes: &[u8]) -> String {
        let mut text = String::with_capacity(bytes.len());
        loop {
            match std::str::from_utf8(bytes) {
                Ok(valid) => {
                    text.push_str(valid);
                    return text;
                }
                Err(err) => {
                    let (valid, rest) = bytes.split_at(err.valid_up_to());
                    text.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        None => {
                            self.partial = rest.to_vec();
                            return text;
                        }
                        Some(len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            bytes = &rest[len..];
                        }
                    }
                }
            }
        }
    }
}

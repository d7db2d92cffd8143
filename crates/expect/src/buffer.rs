use crate::error::PatternError;
use crate::pattern::Pattern;

/// Capture groups of a successful match, copied out of the read buffer.
///
/// Group 0 is the whole match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Captures {
    groups: Vec<Option<Vec<u8>>>,
}

impl Captures {
    /// Returns the bytes of group `index`, if it participated in the match.
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.groups.get(index).and_then(|group| group.as_deref())
    }

    /// Returns group `index` as text, replacing invalid UTF-8.
    pub fn text(&self, index: usize) -> Option<String> {
        self.get(index)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Number of groups, including group 0.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Always false: a match has at least group 0.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Outcome of scanning the buffer against a pattern table.
#[derive(Debug)]
pub(crate) enum Scan<T> {
    Matched(T, Captures),
    Partial,
    Nothing,
}

/// Accumulated pty output plus the resume boundary left by the last match.
#[derive(Debug, Default)]
pub(crate) struct MatchBuffer {
    data: Vec<u8>,
    next_match: Option<usize>,
}

impl MatchBuffer {
    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub(crate) const fn next_match(&self) -> Option<usize> {
        self.next_match
    }

    /// Prepares for a new expect call. Returns true when bytes left over
    /// from the previous match must be scanned before reading.
    pub(crate) fn begin(&mut self) -> bool {
        match self.next_match.take() {
            Some(boundary) => {
                self.data.drain(..boundary);
                true
            }
            None => {
                self.data.clear();
                false
            }
        }
    }

    /// Grows the buffer by `len` zeroed bytes and returns the new tail for a
    /// read to fill. Follow with [`commit`](Self::commit).
    pub(crate) fn spare(&mut self, len: usize) -> &mut [u8] {
        let start = self.data.len();
        self.data.resize(start + len, 0);
        &mut self.data[start..]
    }

    /// Keeps `filled` bytes of the last [`spare`](Self::spare) region.
    pub(crate) fn commit(&mut self, spare_len: usize, filled: usize) {
        let len = self.data.len() - spare_len + filled;
        self.data.truncate(len);
    }

    #[cfg(test)]
    pub(crate) fn extend(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Runs the table against the whole buffer.
    ///
    /// On a match the boundary moves past it. When nothing matches, even
    /// partially, the buffer is emptied since none of it can contribute to a
    /// future match.
    pub(crate) fn settle<T: Copy>(
        &mut self,
        patterns: &[(T, &Pattern)],
    ) -> Result<Scan<T>, PatternError> {
        let mut partial = false;
        for &(tag, pattern) in patterns {
            if let Some(found) = pattern.regex().captures(&self.data) {
                let groups = found
                    .iter()
                    .map(|group| group.map(|m| m.as_bytes().to_vec()))
                    .collect();
                self.next_match = found.get(0).map(|whole| whole.end());
                return Ok(Scan::Matched(tag, Captures { groups }));
            }
            if !partial && pattern.is_partial_match(&self.data)? {
                partial = true;
            }
        }

        self.next_match = None;
        if partial {
            Ok(Scan::Partial)
        } else {
            self.data.clear();
            Ok(Scan::Nothing)
        }
    }
}

use std::fmt;

use regex::bytes::{Regex, RegexBuilder};
use regex_automata::hybrid::dfa::{Cache, DFA};
use regex_automata::nfa::thompson;
use regex_automata::util::syntax;
use regex_automata::{Anchored, Input};

use crate::error::PatternError;

/// A compiled expect pattern.
///
/// Patterns are byte-oriented: Unicode classes are disabled, `.` matches any
/// byte except `\n`, and `\w`/`\d` are ASCII classes. Terminal output is not
/// guaranteed to be valid UTF-8, so nothing here assumes it.
pub struct Pattern {
    source: Box<str>,
    full: Regex,
    partial: DFA,
}

impl Pattern {
    /// Compiles `source` for full and partial matching.
    pub fn new(source: &str) -> Result<Self, PatternError> {
        let full = RegexBuilder::new(source)
            .unicode(false)
            .build()
            .map_err(|source_err| PatternError::Syntax {
                pattern: source.to_owned(),
                source: source_err,
            })?;

        let partial = DFA::builder()
            .syntax(syntax::Config::new().unicode(false).utf8(false))
            .thompson(thompson::Config::new().utf8(false))
            .build(source)
            .map_err(|err| PatternError::Automaton {
                pattern: source.to_owned(),
                source: Box::new(err),
            })?;

        Ok(Self {
            source: source.into(),
            full,
            partial,
        })
    }

    /// Returns the pattern source text.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Reports whether `haystack` contains a full match.
    pub fn is_match(&self, haystack: &[u8]) -> bool {
        self.full.is_match(haystack)
    }

    pub(crate) fn regex(&self) -> &Regex {
        &self.full
    }

    /// Soft partial match: some non-empty suffix of `haystack` is a prefix of
    /// a possible match.
    ///
    /// Callers check for a full match first; a haystack that already contains
    /// a match is never asked about partial matches.
    pub(crate) fn is_partial_match(&self, haystack: &[u8]) -> Result<bool, PatternError> {
        let mut cache = self.partial.create_cache();
        for start in 0..haystack.len() {
            if self.survives_from(&mut cache, haystack, start)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn survives_from(
        &self,
        cache: &mut Cache,
        haystack: &[u8],
        start: usize,
    ) -> Result<bool, PatternError> {
        let input = Input::new(haystack).range(start..).anchored(Anchored::Yes);
        let mut state = self
            .partial
            .start_state_forward(cache, &input)
            .map_err(|err| self.search_error(err))?;
        for &byte in &haystack[start..] {
            state = self
                .partial
                .next_state(cache, state, byte)
                .map_err(|err| self.search_error(err))?;
            if state.is_dead() {
                return Ok(false);
            }
            if state.is_quit() {
                return Err(self.search_error("automaton quit on input byte"));
            }
        }
        Ok(true)
    }

    fn search_error(&self, reason: impl fmt::Display) -> PatternError {
        PatternError::Search {
            pattern: self.source.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.source).finish()
    }
}

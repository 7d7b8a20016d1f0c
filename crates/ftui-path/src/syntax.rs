#![forbid(unsafe_code)]

//! Path splitting, joining, truncation, and path-level matching.
//!
//! # Invariants
//!
//! 1. `split("")` is empty: the empty path addresses the root.
//! 2. `depth(p) == split(p).len()` for every `p`.
//! 3. `cut(longer, shorter)` never returns more segments than `longer` has.
//! 4. `match_path` only matches paths of equal depth; globbing happens per
//!    segment and never spans a delimiter.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use crate::glob;
use crate::params::{self, ParamsInfo};

/// Segments borrowed from a path string.
pub type Segments<'a> = SmallVec<[&'a str; 8]>;

/// Invalid [`PathSyntax`] configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
    #[error("glyph {glyph:?} is configured as both {first} and {second}")]
    DuplicateGlyph {
        glyph: char,
        first: &'static str,
        second: &'static str,
    },
}

/// The glyphs that give a path its structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSyntax {
    /// Separates segments. Default `.`.
    pub delimiter: char,
    /// Matches any key, alone or embedded in a segment. Default `*`.
    pub wildcard: char,
    /// Introduces a named parameter. Default `:`.
    pub param: char,
    /// Suffix that makes a listener path non-recursive. Default `;`.
    pub not_recursive: char,
}

impl Default for PathSyntax {
    fn default() -> Self {
        Self::new()
    }
}

impl PathSyntax {
    /// The default syntax: `.`, `*`, `:`, `;`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            delimiter: '.',
            wildcard: '*',
            param: ':',
            not_recursive: ';',
        }
    }

    #[must_use]
    pub const fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    #[must_use]
    pub const fn with_wildcard(mut self, wildcard: char) -> Self {
        self.wildcard = wildcard;
        self
    }

    #[must_use]
    pub const fn with_param(mut self, param: char) -> Self {
        self.param = param;
        self
    }

    #[must_use]
    pub const fn with_not_recursive(mut self, not_recursive: char) -> Self {
        self.not_recursive = not_recursive;
        self
    }

    /// Reject configurations where one glyph plays two roles.
    pub fn validate(&self) -> Result<(), SyntaxError> {
        let glyphs = [
            ("delimiter", self.delimiter),
            ("wildcard", self.wildcard),
            ("param", self.param),
            ("not_recursive", self.not_recursive),
        ];
        for (index, (first, a)) in glyphs.iter().enumerate() {
            for (second, b) in &glyphs[index + 1..] {
                if a == b {
                    return Err(SyntaxError::DuplicateGlyph {
                        glyph: *a,
                        first: *first,
                        second: *second,
                    });
                }
            }
        }
        Ok(())
    }

    /// Split a path into its segments.
    #[must_use]
    pub fn split<'a>(&self, path: &'a str) -> Segments<'a> {
        if path.is_empty() {
            return Segments::new();
        }
        path.split(self.delimiter).collect()
    }

    /// Join segments with the delimiter.
    #[must_use]
    pub fn join<'a, I>(&self, segments: I) -> String
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut out = String::new();
        for (index, segment) in segments.into_iter().enumerate() {
            if index > 0 {
                out.push(self.delimiter);
            }
            out.push_str(segment);
        }
        out
    }

    /// Append a relative path to `base`, treating empty strings as the root.
    #[must_use]
    pub fn child(&self, base: &str, rest: &str) -> String {
        match (base.is_empty(), rest.is_empty()) {
            (true, _) => rest.to_owned(),
            (false, true) => base.to_owned(),
            (false, false) => {
                let mut out = String::with_capacity(base.len() + rest.len() + 1);
                out.push_str(base);
                out.push(self.delimiter);
                out.push_str(rest);
                out
            }
        }
    }

    /// Number of segments in `path`.
    #[must_use]
    pub fn depth(&self, path: &str) -> usize {
        if path.is_empty() {
            0
        } else {
            path.matches(self.delimiter).count() + 1
        }
    }

    /// True if any segment is, or embeds, the wildcard glyph.
    #[must_use]
    pub fn is_wildcard(&self, path: &str) -> bool {
        path.contains(self.wildcard)
    }

    /// True if any segment carries a well-formed parameter token.
    #[must_use]
    pub fn has_params(&self, path: &str) -> bool {
        path.contains(self.param)
            && self
                .split(path)
                .iter()
                .any(|segment| params::param_span(segment, self).is_some())
    }

    /// True if the path ends with the non-recursive suffix.
    #[must_use]
    pub fn is_not_recursive(&self, path: &str) -> bool {
        path.ends_with(self.not_recursive)
    }

    /// Strip the non-recursive suffix, if present.
    #[must_use]
    pub fn clean_not_recursive<'a>(&self, path: &'a str) -> &'a str {
        path.strip_suffix(self.not_recursive).unwrap_or(path)
    }

    /// Truncate `longer` to the segment depth of `shorter`.
    ///
    /// Both paths lose their non-recursive suffix first. If `longer` is not
    /// deeper than `shorter` it is returned whole.
    #[must_use]
    pub fn cut<'a>(&self, longer: &'a str, shorter: &str) -> &'a str {
        let longer = self.clean_not_recursive(longer);
        let depth = self.depth(self.clean_not_recursive(shorter));
        if depth == 0 {
            return "";
        }
        match longer.match_indices(self.delimiter).nth(depth - 1) {
            Some((index, _)) => &longer[..index],
            None => longer,
        }
    }

    /// Segment-level glob match.
    #[must_use]
    pub fn match_segment(&self, pattern: &str, candidate: &str) -> bool {
        glob::segment_matches(pattern, candidate, self.wildcard)
    }

    /// Whole-path match: equal depth and every segment pair matches.
    #[must_use]
    pub fn match_path(&self, pattern: &str, path: &str) -> bool {
        if pattern == path {
            return true;
        }
        if !self.is_wildcard(pattern) && !self.is_wildcard(path) {
            return false;
        }
        let pattern = self.split(pattern);
        let path = self.split(path);
        pattern.len() == path.len()
            && pattern
                .iter()
                .zip(path.iter())
                .all(|(p, c)| self.match_segment(p, c))
    }

    /// Parameter layout of `path`, or `None` if it has no parameters.
    #[must_use]
    pub fn params_info(&self, path: &str) -> Option<ParamsInfo> {
        ParamsInfo::parse(path, self)
    }

    /// The form listeners are registered under: parameters rewritten to the
    /// wildcard glyph and the non-recursive suffix removed.
    #[must_use]
    pub fn canonical(&self, path: &str) -> String {
        let clean = self.clean_not_recursive(path);
        match self.params_info(clean) {
            Some(info) => info.replaced,
            None => clean.to_owned(),
        }
    }
}

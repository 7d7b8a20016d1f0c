#![forbid(unsafe_code)]

//! Segment-level glob matching.
//!
//! A single path segment may embed the wildcard glyph anywhere (`row-*`,
//! `*-cell`, `a*b*c`). Matching splits the pattern into the literal runs
//! between glyphs and consumes them right to left against the candidate:
//!
//! 1. The last run must be a suffix of the candidate.
//! 2. Every run between two glyphs is located with a reverse search inside the
//!    part of the candidate not consumed yet.
//! 3. The first run must be a prefix of what remains.
//!
//! Each glyph matches any (possibly empty) substring. The work done is linear
//! in the candidate length for each run.

use smallvec::SmallVec;

/// Whether two segments match.
///
/// Equal segments always match, and a segment that is exactly the wildcard
/// glyph matches anything on the other side. Otherwise whichever side embeds
/// the glyph is treated as the pattern.
#[must_use]
pub fn segment_matches(first: &str, second: &str, wildcard: char) -> bool {
    if first == second || is_glyph(first, wildcard) || is_glyph(second, wildcard) {
        return true;
    }
    if first.contains(wildcard) {
        glob_match(first, second, wildcard)
    } else if second.contains(wildcard) {
        glob_match(second, first, wildcard)
    } else {
        false
    }
}

/// Match `candidate` against a pattern that may embed `wildcard`.
#[must_use]
pub fn glob_match(pattern: &str, candidate: &str, wildcard: char) -> bool {
    let runs: SmallVec<[&str; 4]> = pattern.split(wildcard).collect();
    let stars = runs.len() - 1;
    if stars == 0 {
        return pattern == candidate;
    }

    let min_len = pattern.len() - stars * wildcard.len_utf8();
    if candidate.len() < min_len {
        return false;
    }

    let last = runs.len() - 1;
    let mut cursor = candidate.len();
    for (index, run) in runs.iter().enumerate().rev() {
        let window = &candidate[..cursor];
        if index == last {
            if !window.ends_with(run) {
                return false;
            }
            cursor -= run.len();
        } else if index == 0 {
            return window.starts_with(run);
        } else {
            match window.rfind(run) {
                Some(found) => cursor = found,
                None => return false,
            }
        }
    }
    true
}

fn is_glyph(segment: &str, wildcard: char) -> bool {
    let mut chars = segment.chars();
    chars.next() == Some(wildcard) && chars.next().is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(pattern: &str, candidate: &str) -> bool {
        segment_matches(pattern, candidate, '*')
    }

    #[test]
    fn exact_segments_match() {
        assert!(m("rows", "rows"));
        assert!(!m("rows", "cols"));
    }

    #[test]
    fn bare_wildcard_matches_anything() {
        assert!(m("*", "anything"));
        assert!(m("*", ""));
        assert!(m("whatever", "*"));
    }

    #[test]
    fn trailing_glob() {
        assert!(m("row-*", "row-42"));
        assert!(m("row-*", "row-"));
        assert!(!m("row-*", "col-42"));
        assert!(!m("row-*", "row"));
    }

    #[test]
    fn leading_glob() {
        assert!(m("*-cell", "grid-cell"));
        assert!(!m("*-cell", "grid-cells"));
        assert!(!m("*-cell", "cell"));
    }

    #[test]
    fn inner_glob() {
        assert!(m("a*z", "abcz"));
        assert!(m("a*z", "az"));
        assert!(!m("a*z", "abc"));
        assert!(!m("a*z", "bz"));
    }

    #[test]
    fn several_globs() {
        assert!(m("a*b*c", "a-b-c"));
        assert!(m("a*b*c", "abbbc"));
        assert!(m("a*b*c", "abc"));
        assert!(!m("a*b*c", "acb"));
        assert!(m("*x*", "x"));
        assert!(m("*x*", "axb"));
        assert!(!m("*x*", "ab"));
    }

    #[test]
    fn overlapping_anchors_do_not_share_characters() {
        assert!(!m("a*a", "a"));
        assert!(m("a*a", "aa"));
        assert!(!m("ab*ba", "aba"));
        assert!(m("ab*ba", "abba"));
    }

    #[test]
    fn repeated_glyphs_behave_like_one() {
        assert!(m("a**b", "ab"));
        assert!(m("a**b", "a--b"));
    }

    #[test]
    fn glob_on_either_side() {
        assert!(m("row-42", "row-*"));
        assert!(!m("col-42", "row-*"));
    }

    #[test]
    fn multibyte_glyph_and_text() {
        assert!(!segment_matches("zé§", "za-anything", '§'));
        assert!(segment_matches("zé§", "zéxyz", '§'));
        assert!(segment_matches("§ü", "büü", '§'));
    }
}

#![forbid(unsafe_code)]

//! Property-based invariant tests for segment globbing and path matching.
//!
//! 1. The right-to-left run matcher agrees with a naive backtracking matcher.
//! 2. A bare wildcard segment matches every candidate.
//! 3. A pattern without glyphs matches only itself.
//! 4. Replacing any substring of a candidate with the glyph yields a pattern
//!    that matches the candidate.
//! 5. `cut` never produces more segments than either input allows.
//! 6. Parameter extraction inverts the canonical wildcard substitution.

use ftui_path::{PathSyntax, glob_match, segment_matches};
use proptest::prelude::*;

// ── Strategies ──────────────────────────────────────────────────────────

/// Short strings over a tiny alphabet so that collisions are frequent.
fn text() -> impl Strategy<Value = String> {
    proptest::collection::vec(prop_oneof![Just('a'), Just('b'), Just('-')], 0..8)
        .prop_map(|chars| chars.into_iter().collect())
}

/// Patterns over the same alphabet plus the wildcard glyph.
fn pattern() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![Just('a'), Just('b'), Just('-'), Just('*')],
        0..8,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

fn segment() -> impl Strategy<Value = String> {
    "[a-z0-9]{1,4}"
}

fn path() -> impl Strategy<Value = String> {
    proptest::collection::vec(segment(), 0..6).prop_map(|parts| parts.join("."))
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn naive(pattern: &[char], candidate: &[char]) -> bool {
    match pattern.split_first() {
        None => candidate.is_empty(),
        Some(('*', rest)) => (0..=candidate.len()).any(|skip| naive(rest, &candidate[skip..])),
        Some((c, rest)) => candidate.first() == Some(c) && naive(rest, &candidate[1..]),
    }
}

fn naive_match(pattern: &str, candidate: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let candidate: Vec<char> = candidate.chars().collect();
    naive(&pattern, &candidate)
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Agreement with the naive matcher
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn glob_agrees_with_naive(pattern in pattern(), candidate in text()) {
        prop_assert_eq!(
            glob_match(&pattern, &candidate, '*'),
            naive_match(&pattern, &candidate),
            "pattern {:?} candidate {:?}", pattern, candidate
        );
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Bare wildcard matches everything
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn bare_wildcard_matches_all(candidate in text()) {
        prop_assert!(segment_matches("*", &candidate, '*'));
        prop_assert!(segment_matches(&candidate, "*", '*'));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Literal patterns match only themselves
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn literal_matches_only_itself(a in text(), b in text()) {
        prop_assert_eq!(segment_matches(&a, &b, '*'), a == b);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Globbing out a substring keeps the match
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn globbed_substring_still_matches(candidate in text(), a in 0usize..8, b in 0usize..8) {
        let len = candidate.len();
        let (start, end) = (a.min(b).min(len), a.max(b).min(len));
        let pattern = format!("{}*{}", &candidate[..start], &candidate[end..]);
        prop_assert!(glob_match(&pattern, &candidate, '*'), "pattern {:?}", pattern);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. cut depth bounds
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn cut_depth_is_min(longer in path(), shorter in path()) {
        let syntax = PathSyntax::new();
        let cut = syntax.cut(&longer, &shorter);
        let expected = syntax.depth(&longer).min(syntax.depth(&shorter));
        prop_assert_eq!(syntax.depth(cut), expected);
        prop_assert!(longer.starts_with(cut));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Parameter extraction
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn params_round_trip(prefix in path(), key in segment(), suffix in segment()) {
        let syntax = PathSyntax::new();
        let listener = syntax.child(&prefix, &format!(":key.{suffix}"));
        let concrete = syntax.child(&prefix, &format!("{key}.{suffix}"));

        let info = syntax.params_info(&listener).expect("listener has a param");
        prop_assert!(syntax.match_path(&info.replaced, &concrete));
        let params = info.params(&concrete, &syntax);
        prop_assert_eq!(params.get("key"), Some(&key));
    }
}

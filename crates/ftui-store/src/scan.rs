#![forbid(unsafe_code)]

//! Expansion of wildcard paths against a tree.
//!
//! Literal segments are looked up directly; globbed segments iterate the
//! keys of a map (in insertion order) or the indices of a list and keep the
//! ones the segment matcher accepts. The result lists every concrete path
//! the pattern resolves to, in tree order.

use ftui_path::PathSyntax;
use serde_json::Value;

use crate::tree;

/// Every `(concrete path, value)` pair `pattern` resolves to inside `tree`.
///
/// The empty pattern resolves to the tree itself under the empty path.
#[must_use]
pub fn scan<'a>(tree: &'a Value, pattern: &str, syntax: &PathSyntax) -> Vec<(String, &'a Value)> {
    let segments = syntax.split(pattern);
    let mut out = Vec::new();
    walk(tree, &segments, String::new(), syntax, &mut out);
    out
}

fn walk<'a>(
    node: &'a Value,
    segments: &[&str],
    resolved: String,
    syntax: &PathSyntax,
    out: &mut Vec<(String, &'a Value)>,
) {
    let Some((head, rest)) = segments.split_first() else {
        out.push((resolved, node));
        return;
    };

    if !syntax.is_wildcard(head) {
        if let Some(next) = tree::child(node, head) {
            walk(next, rest, syntax.child(&resolved, head), syntax, out);
        }
        return;
    }

    match node {
        Value::Object(map) => {
            for (key, next) in map {
                if syntax.match_segment(head, key) {
                    walk(next, rest, syntax.child(&resolved, key), syntax, out);
                }
            }
        }
        Value::Array(items) => {
            for (index, next) in items.iter().enumerate() {
                let key = index.to_string();
                if syntax.match_segment(head, &key) {
                    walk(next, rest, syntax.child(&resolved, &key), syntax, out);
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const S: PathSyntax = PathSyntax::new();

    fn paths(found: &[(String, &Value)]) -> Vec<String> {
        found.iter().map(|(path, _)| path.clone()).collect()
    }

    #[test]
    fn literal_path_resolves_once() {
        let tree = json!({"a": {"b": 1}});
        let found = scan(&tree, "a.b", &S);
        assert_eq!(found, [("a.b".to_owned(), &json!(1))]);
    }

    #[test]
    fn missing_literal_resolves_nothing() {
        let tree = json!({"a": {"b": 1}});
        assert!(scan(&tree, "a.c", &S).is_empty());
        assert!(scan(&tree, "a.b.c", &S).is_empty());
    }

    #[test]
    fn empty_pattern_is_root() {
        let tree = json!({"a": 1});
        let found = scan(&tree, "", &S);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, "");
        assert_eq!(found[0].1, &tree);
    }

    #[test]
    fn wildcard_over_map_keeps_insertion_order() {
        let tree = json!({"rows": {"z": {"h": 1}, "a": {"h": 2}, "m": {"w": 3}}});
        let found = scan(&tree, "rows.*.h", &S);
        assert_eq!(paths(&found), ["rows.z.h", "rows.a.h"]);
        assert_eq!(found[1].1, &json!(2));
    }

    #[test]
    fn wildcard_over_list_uses_indices() {
        let tree = json!({"rows": [{"h": 1}, {"h": 2}]});
        let found = scan(&tree, "rows.*.h", &S);
        assert_eq!(paths(&found), ["rows.0.h", "rows.1.h"]);
    }

    #[test]
    fn partial_glob_filters_keys() {
        let tree = json!({"grid": {"row-1": 1, "row-2": 2, "col-1": 3}});
        let found = scan(&tree, "grid.row-*", &S);
        assert_eq!(paths(&found), ["grid.row-1", "grid.row-2"]);
    }

    #[test]
    fn wildcard_over_scalar_resolves_nothing() {
        let tree = json!({"a": 5});
        assert!(scan(&tree, "a.*", &S).is_empty());
    }

    #[test]
    fn nested_wildcards() {
        let tree = json!({"g": {"r1": {"c1": 1, "c2": 2}, "r2": {"c1": 3}}});
        let found = scan(&tree, "g.*.*", &S);
        assert_eq!(paths(&found), ["g.r1.c1", "g.r1.c2", "g.r2.c1"]);
    }

    #[test]
    fn custom_delimiter() {
        let syntax = PathSyntax::new().with_delimiter('/');
        let tree = json!({"a": {"x": 1, "y": 2}});
        let found = scan(&tree, "a/*", &syntax);
        assert_eq!(paths(&found), ["a/x", "a/y"]);
    }
}

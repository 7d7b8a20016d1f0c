#![forbid(unsafe_code)]

//! Segment-path access into a tree of JSON values.
//!
//! Maps are addressed by key and lists by decimal index. A missing key is
//! reported as `None`, which is distinct from a stored `Value::Null`.

use serde_json::{Map, Value};

/// The child of `node` under `key`.
#[must_use]
pub fn child<'a>(node: &'a Value, key: &str) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|index| items.get(index)),
        _ => None,
    }
}

/// Walk `segments` down from `root`.
#[must_use]
pub fn get<'a>(root: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(root, |node, segment| child(node, segment))
}

/// Whether a value can hold children.
#[must_use]
pub fn is_composite(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

/// Whether storing `new` over `current` leaves the tree as it was.
///
/// Only scalars compare equal; numbers compare by numeric value, so `1`
/// and `1.0` are the same scalar. Maps and lists never compare equal.
#[must_use]
pub fn same_scalar(current: Option<&Value>, new: &Value) -> bool {
    match (current, new) {
        (_, Value::Object(_) | Value::Array(_)) => false,
        (Some(Value::Number(a)), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
        (Some(current), new) => current == new,
        (None, _) => false,
    }
}

/// Write `value` at `segments`.
///
/// With `create`, absent intermediate keys (and intermediate nulls) become
/// empty maps, and a list accepts an index equal to its length as an append.
/// Returns `false` if the path runs through a scalar or an unusable list
/// index; the tree is left untouched in that case.
///
/// An empty path merges the keys of a map `value` into a map root, keeping
/// keys the new value does not mention. Any other root write replaces the
/// root wholesale.
pub fn set(root: &mut Value, segments: &[&str], value: Value, create: bool) -> bool {
    let Some((last, parents)) = segments.split_last() else {
        merge_root(root, value);
        return true;
    };
    if !parents_writable(root, parents, create) {
        return false;
    }

    let mut node = root;
    for segment in parents {
        node = match descend(node, segment, create) {
            Some(next) => next,
            None => return false,
        };
    }

    if create && node.is_null() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => {
            map.insert((*last).to_owned(), value);
            true
        }
        Value::Array(items) => match last.parse::<usize>() {
            Ok(index) if index < items.len() => {
                items[index] = value;
                true
            }
            Ok(index) if index == items.len() => {
                items.push(value);
                true
            }
            _ => false,
        },
        _ => false,
    }
}

fn merge_root(root: &mut Value, value: Value) {
    match (root, value) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, child) in incoming {
                existing.insert(key, child);
            }
        }
        (root, value) => *root = value,
    }
}

/// Dry run of the intermediate walk so a failed write never leaves freshly
/// created empty maps behind.
fn parents_writable(root: &Value, parents: &[&str], create: bool) -> bool {
    let mut node = Some(root);
    for segment in parents {
        match node {
            // Everything below a node that will be created is creatable too.
            None | Some(Value::Null) if create => return true,
            Some(Value::Object(map)) => {
                node = map.get(*segment);
                if node.is_none() && !create {
                    return false;
                }
            }
            Some(Value::Array(items)) => match segment.parse::<usize>() {
                Ok(index) if index < items.len() => node = items.get(index),
                Ok(index) if index == items.len() && create => return true,
                _ => return false,
            },
            _ => return false,
        }
    }
    match node {
        Some(value) => is_composite(value) || (create && value.is_null()),
        None => create,
    }
}

fn descend<'a>(node: &'a mut Value, segment: &str, create: bool) -> Option<&'a mut Value> {
    if create && node.is_null() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => {
            if !map.contains_key(segment) {
                if !create {
                    return None;
                }
                map.insert(segment.to_owned(), Value::Object(Map::new()));
            }
            map.get_mut(segment)
        }
        Value::Array(items) => {
            let index = segment.parse::<usize>().ok()?;
            if index == items.len() && create {
                items.push(Value::Object(Map::new()));
            }
            items.get_mut(index)
        }
        _ => None,
    }
}

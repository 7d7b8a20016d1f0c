#![forbid(unsafe_code)]

//! Named path parameters.
//!
//! A listener path such as `rows.:id.height` behaves like `rows.*.height`
//! and additionally reports which key matched the parameter. The parameter
//! token may be embedded in a literal (`row-:id`), in which case only the
//! text covered by the token is captured.
//!
//! At most one parameter is recognized per segment. A parameter glyph not
//! followed by an identifier character is an ordinary literal.

use std::collections::BTreeMap;

use crate::syntax::PathSyntax;

/// Captured parameter values, keyed by parameter name.
pub type Params = BTreeMap<String, String>;

/// One parameterized segment of a listener path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSegment {
    /// The segment as written, e.g. `row-:id`.
    pub original: String,
    /// The segment with the token rewritten to the wildcard, e.g. `row-*`.
    pub replaced: String,
    /// The parameter name, e.g. `id`.
    pub name: String,
    prefix_len: usize,
    suffix_len: usize,
}

impl ParamSegment {
    /// The part of a concrete segment covered by the parameter token.
    #[must_use]
    pub fn extract<'a>(&self, concrete: &'a str) -> &'a str {
        if concrete.len() < self.prefix_len + self.suffix_len {
            return concrete;
        }
        let end = concrete.len() - self.suffix_len;
        concrete.get(self.prefix_len..end).unwrap_or(concrete)
    }
}

/// Positional parameter layout of a listener path.
///
/// Built once when a listener subscribes; reused for every concrete path
/// delivered to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamsInfo {
    /// Parameterized segments keyed by segment index.
    pub segments: BTreeMap<usize, ParamSegment>,
    /// The full path with every parameter rewritten to the wildcard glyph.
    pub replaced: String,
}

impl ParamsInfo {
    /// Parse `path`; `None` if it contains no well-formed parameter.
    #[must_use]
    pub fn parse(path: &str, syntax: &PathSyntax) -> Option<Self> {
        let mut segments = BTreeMap::new();
        let mut rewritten: Vec<String> = Vec::new();

        for (index, segment) in syntax.split(path).iter().enumerate() {
            let Some((start, end)) = param_span(segment, syntax) else {
                rewritten.push((*segment).to_owned());
                continue;
            };
            let mut replaced = String::with_capacity(segment.len());
            replaced.push_str(&segment[..start]);
            replaced.push(syntax.wildcard);
            replaced.push_str(&segment[end..]);

            segments.insert(
                index,
                ParamSegment {
                    original: (*segment).to_owned(),
                    replaced: replaced.clone(),
                    name: segment[start + syntax.param.len_utf8()..end].to_owned(),
                    prefix_len: start,
                    suffix_len: segment.len() - end,
                },
            );
            rewritten.push(replaced);
        }

        if segments.is_empty() {
            return None;
        }
        Some(Self {
            segments,
            replaced: syntax.join(rewritten.iter().map(String::as_str)),
        })
    }

    /// Extract parameter values from a concrete path.
    ///
    /// Segments missing from `concrete` are skipped.
    #[must_use]
    pub fn params(&self, concrete: &str, syntax: &PathSyntax) -> Params {
        let parts = syntax.split(concrete);
        self.segments
            .iter()
            .filter_map(|(index, segment)| {
                parts
                    .get(*index)
                    .map(|part| (segment.name.clone(), segment.extract(part).to_owned()))
            })
            .collect()
    }

    /// Parameter names in path order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.segments.values().map(|segment| segment.name.as_str())
    }
}

/// Byte range of the parameter token (glyph plus name) inside `segment`.
pub(crate) fn param_span(segment: &str, syntax: &PathSyntax) -> Option<(usize, usize)> {
    let start = segment.find(syntax.param)?;
    let name_start = start + syntax.param.len_utf8();
    let name_len: usize = segment[name_start..]
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .map(char::len_utf8)
        .sum();
    (name_len > 0).then_some((start, name_start + name_len))
}

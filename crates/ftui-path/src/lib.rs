#![forbid(unsafe_code)]

//! Path language for the FrankenTUI state store.
//!
//! Paths are delimited strings (`rows.42.height`) that address a location in
//! a tree of maps and lists. Listener paths may additionally carry:
//!
//! - a **wildcard** glyph, either as a whole segment (`rows.*`) or embedded in
//!   a segment (`row-*`),
//! - **parameters** (`rows.:id.height`) that behave like wildcards and capture
//!   the matched segment by name,
//! - a **non-recursive** suffix (`rows.*;`) restricting a listener to writes at
//!   exactly its own depth.
//!
//! All glyphs are configurable through [`PathSyntax`].

pub mod glob;
pub mod params;
pub mod syntax;

pub use glob::{glob_match, segment_matches};
pub use params::{ParamSegment, Params, ParamsInfo};
pub use syntax::{PathSyntax, Segments, SyntaxError};

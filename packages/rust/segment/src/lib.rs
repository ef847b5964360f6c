//! Lexical segmentation of Python module text.
//!
//! Splits a module into its leading documentation block and its top-level
//! `def` blocks, recording the exact byte range of each inside the original
//! text. This is deliberately not a Python parser: blocks are found with
//! line-level cues only (see [`parse`]).

mod parser;

use std::collections::BTreeMap;
use std::ops::Range;

use serde::Serialize;

pub use parser::parse;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One parsed unit of source text.
///
/// Block ranges are half-open byte ranges into [`Module::source`]. They never
/// overlap, and `&source[range]` is always the block's own `source` text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Module {
    /// The entire original text, unmodified.
    pub source: String,
    /// The first documentation block of the module, if any.
    pub docstring: Option<Docstring>,
    /// Top-level functions keyed by name. A repeated name keeps the last block.
    pub functions: BTreeMap<String, Function>,
}

/// A quoted documentation block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Docstring {
    pub start_index: usize,
    pub end_index: usize,
    /// Exact text including the quote delimiters.
    pub source: String,
    /// `source` with every occurrence of the quote delimiter removed.
    pub content: String,
}

/// A top-level function block: the signature line plus every following
/// blank or indented line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Function {
    pub start_index: usize,
    pub end_index: usize,
    pub name: String,
    pub source: String,
}

impl Module {
    /// A module with no text and no blocks.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Look up a top-level function by name.
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    /// All recorded block ranges, ordered by start offset.
    pub fn spans(&self) -> Vec<Range<usize>> {
        let mut spans: Vec<Range<usize>> = self
            .docstring
            .iter()
            .map(Docstring::range)
            .chain(self.functions.values().map(Function::range))
            .collect();
        spans.sort_by_key(|r| r.start);
        spans
    }
}

impl Docstring {
    pub fn range(&self) -> Range<usize> {
        self.start_index..self.end_index
    }
}

impl Function {
    pub fn range(&self) -> Range<usize> {
        self.start_index..self.end_index
    }
}

//! Line scanner behind [`parse`](crate::parse).
//!
//! The scanner walks the text one line at a time in one of three states:
//! - `Seeking`: a line starting with a quote token opens a documentation
//!   block, a line starting with `def` opens a function block, anything else
//!   is skipped.
//! - `Docstring`: lines are absorbed until one ends with the opening quote.
//! - `Function`: blank or indented lines are absorbed; the first line that is
//!   neither closes the block and is examined again in `Seeking`.
//!
//! Nested `def`s are indented and therefore belong to the enclosing block.

use std::collections::BTreeMap;
use std::ops::Range;

use codeless_shared::{CodelessError, Result};
use tracing::trace;

use crate::{Docstring, Function, Module};

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// Quote tokens that open a documentation block, triple forms first.
const STRING_QUOTES: [&str; 4] = ["'''", "\"\"\"", "'", "\""];

/// Keyword that opens a function block.
const FUNCTION_DEFINITION: &str = "def";

/// Optional modifier before the keyword.
const ASYNC_MODIFIER: &str = "async";

const ARGUMENT_START: char = '(';

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

enum State {
    Seeking,
    Docstring {
        quote: &'static str,
        start: usize,
        /// 1-based line the block opened on, for error reporting.
        line: usize,
    },
    Function {
        name: String,
        start: usize,
    },
}

/// Segment `source` into a [`Module`].
///
/// Fails with [`CodelessError::MalformedSource`] when the text ends inside a
/// documentation block. A function block still open at end of text is closed
/// normally.
pub fn parse(source: &str) -> Result<Module> {
    let lines: Vec<(usize, &str)> = line_spans(source).collect();

    let mut docstring: Option<Docstring> = None;
    let mut functions: BTreeMap<String, Function> = BTreeMap::new();
    let mut state = State::Seeking;
    let mut index = 0;

    while let Some(&(offset, line)) = lines.get(index) {
        let end = offset + line.len();

        let (next, consumed) = match std::mem::replace(&mut state, State::Seeking) {
            State::Seeking => {
                if let Some(quote) = opening_quote(line) {
                    if closes_on_opening_line(line, quote) {
                        record_docstring(&mut docstring, source, offset..end, quote);
                        (State::Seeking, true)
                    } else {
                        let opened = State::Docstring {
                            quote,
                            start: offset,
                            line: index + 1,
                        };
                        (opened, true)
                    }
                } else if let Some(name) = function_name(line) {
                    (State::Function { name, start: offset }, true)
                } else {
                    (State::Seeking, true)
                }
            }
            State::Docstring { quote, start, line: opened_on } => {
                if line.trim_end().ends_with(quote) {
                    record_docstring(&mut docstring, source, start..end, quote);
                    (State::Seeking, true)
                } else {
                    let open = State::Docstring {
                        quote,
                        start,
                        line: opened_on,
                    };
                    (open, true)
                }
            }
            State::Function { name, start } => {
                if is_function_body(line) {
                    (State::Function { name, start }, true)
                } else {
                    // New top-level statement: close and re-examine this line.
                    insert_function(&mut functions, source, name, start..offset);
                    (State::Seeking, false)
                }
            }
        };

        state = next;
        if consumed {
            index += 1;
        }
    }

    match state {
        State::Seeking => {}
        State::Function { name, start } => {
            insert_function(&mut functions, source, name, start..source.len());
        }
        State::Docstring { quote, line, .. } => {
            return Err(CodelessError::malformed(quote, line));
        }
    }

    Ok(Module {
        source: source.to_string(),
        docstring,
        functions,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Lines with their terminators kept, paired with their byte offset.
fn line_spans(source: &str) -> impl Iterator<Item = (usize, &str)> {
    source.split_inclusive('\n').scan(0, |offset, line| {
        let start = *offset;
        *offset += line.len();
        Some((start, line))
    })
}

fn opening_quote(line: &str) -> Option<&'static str> {
    STRING_QUOTES
        .iter()
        .copied()
        .find(|quote| line.starts_with(*quote))
}

/// Single-line forms such as `"""text"""` close on the line that opens them.
fn closes_on_opening_line(line: &str, quote: &str) -> bool {
    let trimmed = line.trim_end();
    trimmed.len() >= quote.len() * 2 && trimmed.ends_with(quote)
}

/// Name of the function a signature line opens, if the line opens one.
fn function_name(line: &str) -> Option<String> {
    let header = line
        .strip_prefix(ASYNC_MODIFIER)
        .filter(|rest| rest.starts_with(char::is_whitespace))
        .map(str::trim_start)
        .unwrap_or(line);

    let rest = header.strip_prefix(FUNCTION_DEFINITION)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let name = match rest.find(ARGUMENT_START) {
        Some(end) => &rest[..end],
        None => rest.trim_end().trim_end_matches(':'),
    };
    let name = name.trim();

    (!name.is_empty()).then(|| name.to_string())
}

/// Blank lines (a bare terminator) and indented lines continue a function body.
fn is_function_body(line: &str) -> bool {
    line.starts_with(char::is_whitespace)
}

fn record_docstring(
    docstring: &mut Option<Docstring>,
    source: &str,
    range: Range<usize>,
    quote: &str,
) {
    if docstring.is_some() {
        trace!(start = range.start, "ignoring additional documentation block");
        return;
    }

    let text = &source[range.clone()];
    *docstring = Some(Docstring {
        start_index: range.start,
        end_index: range.end,
        source: text.to_string(),
        content: text.replace(quote, ""),
    });
}

fn insert_function(
    functions: &mut BTreeMap<String, Function>,
    source: &str,
    name: String,
    range: Range<usize>,
) {
    trace!(%name, start = range.start, end = range.end, "function block closed");
    let function = Function {
        start_index: range.start,
        end_index: range.end,
        name: name.clone(),
        source: source[range].to_string(),
    };
    functions.insert(name, function);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_slices_match(module: &Module) {
        if let Some(doc) = &module.docstring {
            assert_eq!(&module.source[doc.range()], doc.source);
        }
        for function in module.functions.values() {
            assert_eq!(&module.source[function.range()], function.source);
        }
    }

    #[test]
    fn parse_docstring_and_functions() {
        let doc = "\"\"\"\nModule docs.\n\"\"\"\n";
        let f = "def f(x):\n    return x\n\n";
        let g = "def g():\n    pass\n";
        let source = format!("{doc}{f}{g}");

        let module = parse(&source).unwrap();

        let docstring = module.docstring.as_ref().expect("docstring");
        assert_eq!(docstring.source, doc);
        assert_eq!(docstring.content, "\nModule docs.\n\n");
        assert_eq!(docstring.start_index, 0);

        assert_eq!(module.functions.len(), 2);
        assert_eq!(module.functions["f"].source, f);
        assert_eq!(module.functions["g"].source, g);
        assert_eq!(module.functions["g"].end_index, source.len());
        assert_slices_match(&module);
    }

    #[test]
    fn parse_empty_source() {
        let module = parse("").unwrap();
        assert_eq!(module, Module::empty());
    }

    #[test]
    fn inert_lines_are_skipped() {
        let source = "import os\n\ndef f():\n    pass\nx = 1\n";
        let module = parse(source).unwrap();

        assert!(module.docstring.is_none());
        let f = &module.functions["f"];
        assert_eq!(f.start_index, 11);
        assert_eq!(f.end_index, 29);
        assert_eq!(f.source, "def f():\n    pass\n");
    }

    #[test]
    fn closing_line_is_examined_again() {
        let source = "def a():\n    pass\ndef b():\n    pass\n";
        let module = parse(source).unwrap();

        assert_eq!(module.functions.len(), 2);
        assert_eq!(module.functions["a"].source, "def a():\n    pass\n");
        assert_eq!(module.functions["b"].start_index, 18);
    }

    #[test]
    fn nested_function_is_absorbed() {
        let source = "def outer():\n    def inner():\n        pass\n    return inner\n";
        let module = parse(source).unwrap();

        assert_eq!(module.functions.len(), 1);
        assert!(module.functions["outer"].source.contains("def inner"));
        assert!(module.function("inner").is_none());
    }

    #[test]
    fn only_first_docstring_is_kept() {
        let source = "\"\"\"first\"\"\"\n\"\"\"second\"\"\"\ndef f():\n    pass\n";
        let module = parse(source).unwrap();

        let doc = module.docstring.as_ref().unwrap();
        assert_eq!(doc.content, "first\n");
        assert_eq!(doc.end_index, 12);
        assert_eq!(module.functions.len(), 1);
    }

    #[test]
    fn unterminated_docstring_fails() {
        let err = parse("x = 1\n\"\"\"\nnever closed\n").unwrap_err();
        match err {
            CodelessError::MalformedSource { quote, line } => {
                assert_eq!(quote, "\"\"\"");
                assert_eq!(line, 2);
            }
            other => panic!("expected MalformedSource, got {other:?}"),
        }
    }

    #[test]
    fn single_line_docstring_forms() {
        let module = parse("'''doc'''\n").unwrap();
        assert_eq!(module.docstring.unwrap().content, "doc\n");

        let module = parse("\"one line\"\n").unwrap();
        assert_eq!(module.docstring.unwrap().content, "one line\n");
    }

    #[test]
    fn lone_triple_quote_opens_a_block() {
        let source = "'''\ntext\n'''\n";
        let module = parse(source).unwrap();
        let doc = module.docstring.unwrap();
        assert_eq!(doc.source, source);
        assert_eq!(doc.content, "\ntext\n\n");
    }

    #[test]
    fn last_definition_wins() {
        let source = "def f():\n    return 1\ndef f():\n    return 2\n";
        let module = parse(source).unwrap();

        let f = &module.functions["f"];
        assert_eq!(f.source, "def f():\n    return 2\n");
        assert_eq!(f.start_index, 22);
    }

    #[test]
    fn function_at_end_without_newline() {
        let module = parse("def f():\n    return 1").unwrap();
        assert_eq!(module.functions["f"].source, "def f():\n    return 1");
    }

    #[test]
    fn multi_line_signature() {
        let source = "def add(a,\n        b):\n    return a + b\n";
        let module = parse(source).unwrap();
        assert_eq!(module.functions["add"].source, source);
    }

    #[test]
    fn async_and_spaced_names() {
        let module = parse("async def fetch(url):\n    pass\ndef  spaced (x):\n    pass\n").unwrap();
        assert!(module.function("fetch").is_some());
        assert!(module.function("spaced").is_some());
    }

    #[test]
    fn identifiers_starting_with_def_are_not_functions() {
        let module = parse("default = 1\ndefine = 2\n").unwrap();
        assert!(module.functions.is_empty());
    }

    #[test]
    fn crlf_lines_are_preserved() {
        let source = "def f():\r\n    pass\r\n";
        let module = parse(source).unwrap();
        assert_eq!(module.functions["f"].source, source);
    }

    #[test]
    fn docstring_after_inert_lines() {
        let module = parse("import os\n\"\"\"doc\"\"\"\n").unwrap();
        assert_eq!(module.docstring.unwrap().start_index, 10);
    }

    #[test]
    fn recovers_every_generated_block() {
        let doc = "\"\"\"\n{\n    \"f0\": \"abc\"\n}\n\"\"\"\n";
        for count in 0..6 {
            let mut source = String::from(doc);
            source.push_str("\nfrom __codeless_template__ import *\n\n\n");
            for i in 0..count {
                source.push_str(&format!("def f{i}(a, b={i}):\n    \"\"\"Doc {i}.\"\"\"\n\n    return a\n\n\n"));
            }

            let module = parse(&source).unwrap();
            assert_eq!(module.functions.len(), count);
            assert_eq!(
                module.docstring.as_ref().unwrap().content,
                "\n{\n    \"f0\": \"abc\"\n}\n\n"
            );
            for i in 0..count {
                assert!(module.function(&format!("f{i}")).is_some());
            }
            assert_slices_match(&module);
        }
    }

    #[test]
    fn spans_are_disjoint_and_in_bounds() {
        let source = "\"\"\"doc\"\"\"\nimport sys\ndef a():\n    pass\n\nx = 2\ndef b():\n    def c():\n        pass\n    return c\n\"\"\"late\"\"\"\ndef d(): pass";
        let module = parse(source).unwrap();
        let spans = module.spans();

        assert_eq!(spans.len(), 4);
        for window in spans.windows(2) {
            assert!(window[0].end <= window[1].start, "{window:?} overlap");
        }
        for span in &spans {
            assert!(span.start < span.end);
            assert!(span.end <= source.len());
        }
        assert_slices_match(&module);
    }

    #[test]
    fn module_serializes_to_json() {
        let module = parse("def f():\n    pass\n").unwrap();
        let json = serde_json::to_value(&module).unwrap();
        assert_eq!(json["functions"]["f"]["name"], "f");
        assert!(json["docstring"].is_null());
    }
}

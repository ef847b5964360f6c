//! Splicing a freshly generated function into an existing artifact.
//!
//! Artifact layout:
//! ```text
//! """
//! { ...fingerprints... }
//! """
//!
//! from __codeless_template__ import *
//!
//!
//! <surviving text of the previous artifact, if any>
//!
//!
//! <newly generated function>
//! ```

use std::cmp::Reverse;
use std::ops::Range;

use codeless_segment::Module;
use codeless_shared::Result;

use crate::metadata::GenerationMetadata;
use crate::naming::RESERVED_IMPORT;
use crate::template::decorator_start;

/// Build the new artifact text.
///
/// The previous block for `name` (decorators included) and the previous
/// metadata docstring are cut out of `previous`; everything else survives
/// byte for byte (apart from surrounding whitespace and the reserved import
/// line, which is re-emitted exactly once).
pub fn merge_artifact(
    previous: &Module,
    metadata: &GenerationMetadata,
    name: &str,
    generated: &str,
) -> Result<String> {
    let mut cuts: Vec<Range<usize>> = Vec::with_capacity(2);
    if let Some(function) = previous.function(name) {
        // Decorators sit above the `def` and go with it.
        let start = decorator_start(&previous.source, function.start_index);
        cuts.push(start..function.end_index);
    }
    if let Some(docstring) = &previous.docstring {
        cuts.push(docstring.range());
    }
    // Cut back to front so earlier offsets stay valid.
    cuts.sort_by_key(|range| Reverse(range.start));

    let mut remainder = previous.source.clone();
    for range in cuts {
        remainder.replace_range(range, "");
    }
    let remainder = without_reserved_import(remainder.trim());

    let docstring = metadata.encode_docstring()?;
    let mut text = format!("{docstring}\n{RESERVED_IMPORT}\n\n\n");
    if !remainder.is_empty() {
        text.push_str(&remainder);
        text.push_str("\n\n\n");
    }
    text.push_str(generated);
    if !text.ends_with('\n') {
        text.push('\n');
    }

    Ok(text)
}

/// Drop every line that is the reserved import, keeping other bytes as-is.
fn without_reserved_import(text: &str) -> String {
    let kept: String = text
        .split_inclusive('\n')
        .filter(|line| line.trim() != RESERVED_IMPORT)
        .collect();
    kept.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeless_segment::parse;

    fn metadata(entries: &[(&str, &str)]) -> GenerationMetadata {
        let mut metadata = GenerationMetadata::default();
        for (name, fp) in entries {
            metadata.insert(*name, *fp);
        }
        metadata
    }

    #[test]
    fn first_generation_into_empty_artifact() {
        let text = merge_artifact(
            &Module::empty(),
            &metadata(&[("f", "h1")]),
            "f",
            "def f():\n    return 1\n",
        )
        .unwrap();

        assert_eq!(
            text,
            "\"\"\"\n{\n    \"f\": \"h1\"\n}\n\"\"\"\n\nfrom __codeless_template__ import *\n\n\ndef f():\n    return 1\n"
        );
    }

    #[test]
    fn regenerating_replaces_block_and_metadata() {
        let first = merge_artifact(
            &Module::empty(),
            &metadata(&[("f", "h1")]),
            "f",
            "def f():\n    return 1\n",
        )
        .unwrap();

        let previous = parse(&first).unwrap();
        let second = merge_artifact(
            &previous,
            &metadata(&[("f", "h2")]),
            "f",
            "def f():\n    return 2\n",
        )
        .unwrap();

        assert_eq!(
            second,
            "\"\"\"\n{\n    \"f\": \"h2\"\n}\n\"\"\"\n\nfrom __codeless_template__ import *\n\n\ndef f():\n    return 2\n"
        );
    }

    #[test]
    fn unrelated_function_survives() {
        let first = merge_artifact(
            &Module::empty(),
            &metadata(&[("f", "hf")]),
            "f",
            "def f():\n    return 'f'\n",
        )
        .unwrap();
        let with_g = merge_artifact(
            &parse(&first).unwrap(),
            &metadata(&[("f", "hf"), ("g", "hg1")]),
            "g",
            "def g():\n    return 'g1'\n",
        )
        .unwrap();

        let before = parse(&with_g).unwrap();
        let f_before = before.functions["f"].source.clone();

        let regenerated = merge_artifact(
            &before,
            &metadata(&[("f", "hf"), ("g", "hg2")]),
            "g",
            "def g():\n    return 'g2'\n",
        )
        .unwrap();

        let after = parse(&regenerated).unwrap();
        assert_eq!(after.functions["f"].source, f_before);
        assert_eq!(after.functions["g"].source, "def g():\n    return 'g2'\n");
        assert_eq!(regenerated.matches(RESERVED_IMPORT).count(), 1);

        let decoded = GenerationMetadata::decode(&after).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded.get("f"), Some("hf"));
        assert_eq!(decoded.get("g"), Some("hg2"));
    }

    #[test]
    fn surviving_imports_are_kept_once() {
        let previous = parse(
            "\"\"\"\n{\n    \"f\": \"a\"\n}\n\"\"\"\n\nfrom __codeless_template__ import *\n\n\nimport math\n\n\ndef f():\n    return math.pi\n",
        )
        .unwrap();

        let text = merge_artifact(&previous, &metadata(&[("f", "b")]), "f", "def f():\n    return 3\n").unwrap();

        assert_eq!(text.matches(RESERVED_IMPORT).count(), 1);
        assert!(text.contains("\n\n\nimport math\n\n\ndef f():\n    return 3\n"));
    }

    #[test]
    fn decorators_are_cut_with_their_function() {
        let with_f = merge_artifact(
            &Module::empty(),
            &metadata(&[("f", "hf1")]),
            "f",
            "@functools.cache\ndef f():\n    return 1\n",
        )
        .unwrap();
        let with_g = merge_artifact(
            &parse(&with_f).unwrap(),
            &metadata(&[("f", "hf1"), ("g", "hg")]),
            "g",
            "def g():\n    return 'g'\n",
        )
        .unwrap();

        let regenerated = merge_artifact(
            &parse(&with_g).unwrap(),
            &metadata(&[("f", "hf2"), ("g", "hg")]),
            "f",
            "@functools.cache\ndef f():\n    return 2\n",
        )
        .unwrap();

        assert!(!regenerated.contains("@functools.cache\ndef g"));
        assert_eq!(regenerated.matches("@functools.cache").count(), 1);
        assert!(regenerated.ends_with(
            "\n\n\ndef g():\n    return 'g'\n\n\n@functools.cache\ndef f():\n    return 2\n"
        ));
    }

    #[test]
    fn repeated_regeneration_does_not_stack_decorators() {
        let mut text = String::new();
        for round in 0..3 {
            text = merge_artifact(
                &parse(&text).unwrap(),
                &metadata(&[("f", "h")]),
                "f",
                &format!("@cache\n@trace\ndef f():\n    return {round}\n"),
            )
            .unwrap();
        }

        assert_eq!(text.matches("@cache\n").count(), 1);
        assert_eq!(text.matches("@trace\n").count(), 1);
        assert!(text.ends_with("@cache\n@trace\ndef f():\n    return 2\n"));
    }

    #[test]
    fn docstring_after_function_is_cut_safely() {
        let previous = parse("def f():\n    pass\n\"\"\"{}\"\"\"\nx = 1\n").unwrap();
        let text = merge_artifact(&previous, &metadata(&[("f", "n")]), "f", "def f():\n    return 0").unwrap();

        assert!(text.contains("\n\n\nx = 1\n\n\ndef f():\n    return 0\n"));
        assert!(!text.contains("pass"));
    }
}

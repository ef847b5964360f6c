//! Fingerprints and the metadata block stored at the top of each artifact.
//!
//! The artifact's leading docstring is a JSON object mapping every generated
//! function name to the fingerprint of the template it was generated from.
//! Entries are only ever added or overwritten, never pruned.

use std::collections::BTreeMap;

use serde::Serialize;
use sha2::{Digest, Sha256};

use codeless_segment::Module;
use codeless_shared::{CodelessError, Result};

/// Number of hex characters kept from the digest.
pub const FINGERPRINT_LEN: usize = 32;

/// Quote token wrapping the metadata block.
const METADATA_QUOTE: &str = "\"\"\"";

/// Content digest of template text, used only for change detection.
///
/// Truncated SHA-256 of the trigger-stripped text. Fingerprints recorded by
/// MD5-based writers never match, so their artifacts are regenerated once.
pub fn fingerprint(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut hex = format!("{digest:x}");
    hex.truncate(FINGERPRINT_LEN);
    hex
}

/// Function name → fingerprint of its template at last generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationMetadata(BTreeMap<String, String>);

impl GenerationMetadata {
    /// Decode the metadata held in a parsed artifact's docstring.
    ///
    /// An artifact without a docstring (or with a blank one) has no entries.
    pub fn decode(module: &Module) -> Result<Self> {
        let Some(docstring) = &module.docstring else {
            return Ok(Self::default());
        };

        if docstring.content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_json::from_str(&docstring.content)
            .map(Self)
            .map_err(|e| CodelessError::metadata(format!("artifact docstring is not a fingerprint map: {e}")))
    }

    /// Render as the artifact's leading docstring, terminator included.
    pub fn encode_docstring(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.0
            .serialize(&mut serializer)
            .map_err(|e| CodelessError::metadata(e.to_string()))?;

        let json = String::from_utf8(buf).map_err(|e| CodelessError::metadata(e.to_string()))?;
        Ok(format!("{METADATA_QUOTE}\n{json}\n{METADATA_QUOTE}\n"))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Record the fingerprint for `name`, replacing any previous one.
    pub fn insert(&mut self, name: impl Into<String>, fingerprint: impl Into<String>) {
        self.0.insert(name.into(), fingerprint.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_and_short() {
        let a = fingerprint("def f(): pass\n");
        let b = fingerprint("def f(): pass\n");
        assert_eq!(a, b);
        assert_eq!(a.len(), FINGERPRINT_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn fingerprint_is_truncated_sha256() {
        assert_eq!(fingerprint("def f(): pass\n"), "b72f7b517b6f84967daaccbdc5d6523c");
    }

    #[test]
    fn md5_fingerprint_reads_as_stale() {
        let module = codeless_segment::parse(
            "\"\"\"\n{\n    \"f\": \"87d1450e1c01dbf549454594d84685d2\"\n}\n\"\"\"\n",
        )
        .unwrap();
        let metadata = GenerationMetadata::decode(&module).unwrap();

        assert_eq!(metadata.get("f").map(str::len), Some(FINGERPRINT_LEN));
        assert_ne!(metadata.get("f"), Some(fingerprint("def f(): pass\n").as_str()));
    }

    #[test]
    fn fingerprint_changes_with_any_character() {
        let base = "def f(x):\n    \"\"\"Double x.\"\"\"\n";
        let changed = "def f(x):\n    \"\"\"Double y.\"\"\"\n";
        assert_ne!(fingerprint(base), fingerprint(changed));
    }

    #[test]
    fn encode_uses_four_space_json() {
        let mut metadata = GenerationMetadata::default();
        metadata.insert("f", "h1");
        assert_eq!(
            metadata.encode_docstring().unwrap(),
            "\"\"\"\n{\n    \"f\": \"h1\"\n}\n\"\"\"\n"
        );
    }

    #[test]
    fn decode_roundtrips_through_segmenter() {
        let mut metadata = GenerationMetadata::default();
        metadata.insert("f", "aa");
        metadata.insert("g", "bb");

        let text = format!("{}\ndef f():\n    pass\n", metadata.encode_docstring().unwrap());
        let module = codeless_segment::parse(&text).unwrap();
        let decoded = GenerationMetadata::decode(&module).unwrap();

        assert_eq!(decoded, metadata);
        assert_eq!(decoded.get("g"), Some("bb"));
        assert_eq!(decoded.names().collect::<Vec<_>>(), vec!["f", "g"]);
    }

    #[test]
    fn decode_without_docstring_is_empty() {
        let module = codeless_segment::parse("def f():\n    pass\n").unwrap();
        assert!(GenerationMetadata::decode(&module).unwrap().is_empty());
    }

    #[test]
    fn decode_rejects_prose_docstring() {
        let module = codeless_segment::parse("\"\"\"Just some docs.\"\"\"\n").unwrap();
        let err = GenerationMetadata::decode(&module).unwrap_err();
        assert!(matches!(err, CodelessError::Metadata { .. }));
    }

    #[test]
    fn insert_overwrites() {
        let mut metadata = GenerationMetadata::default();
        metadata.insert("f", "old");
        metadata.insert("f", "new");
        assert_eq!(metadata.len(), 1);
        assert_eq!(metadata.get("f"), Some("new"));
    }
}

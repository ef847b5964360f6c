//! Where an artifact lives and what it is called.
//!
//! Given a template module `A.B.leaf` at `.../B/leaf.py`, its artifact is
//! `A.B.__codeless__.leaf` at `.../B/__codeless__/leaf.py`.

use std::path::{Path, PathBuf};

/// Sub-namespace inserted before the leaf name of every artifact.
pub const RESERVED_SEGMENT: &str = "__codeless__";

/// Name generated code uses to refer back to the template module.
pub const RESERVED_ALIAS: &str = "__codeless_template__";

/// The line that re-exports the template module's symbols into the artifact.
pub const RESERVED_IMPORT: &str = "from __codeless_template__ import *";

/// Filesystem location and logical name of an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub path: PathBuf,
    pub name: String,
}

impl ArtifactPaths {
    /// Derive artifact paths from the *template* module's path and name.
    ///
    /// Not idempotent: deriving from an artifact nests another segment.
    pub fn derive(module_path: &Path, module_name: &str) -> Self {
        Self {
            path: artifact_path(module_path),
            name: artifact_name(module_name),
        }
    }
}

fn artifact_name(module_name: &str) -> String {
    match module_name.rsplit_once('.') {
        Some((package, leaf)) => format!("{package}.{RESERVED_SEGMENT}.{leaf}"),
        None => format!("{RESERVED_SEGMENT}.{module_name}"),
    }
}

fn artifact_path(module_path: &Path) -> PathBuf {
    let parent = module_path.parent().unwrap_or(Path::new(""));
    let leaf = module_path
        .file_name()
        .unwrap_or(module_path.as_os_str());
    parent.join(RESERVED_SEGMENT).join(leaf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_import_names_alias() {
        assert_eq!(RESERVED_IMPORT, format!("from {RESERVED_ALIAS} import *"));
    }

    #[test]
    fn dotted_name_gets_segment_before_leaf() {
        let paths = ArtifactPaths::derive(Path::new("/src/a/b/leaf.py"), "a.b.leaf");
        assert_eq!(paths.name, "a.b.__codeless__.leaf");
        assert_eq!(paths.path, PathBuf::from("/src/a/b/__codeless__/leaf.py"));
    }

    #[test]
    fn top_level_module() {
        let paths = ArtifactPaths::derive(Path::new("leaf.py"), "leaf");
        assert_eq!(paths.name, "__codeless__.leaf");
        assert_eq!(paths.path, PathBuf::from("__codeless__/leaf.py"));
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = ArtifactPaths::derive(Path::new("pkg/mod.py"), "pkg.mod");
        let b = ArtifactPaths::derive(Path::new("pkg/mod.py"), "pkg.mod");
        assert_eq!(a, b);
    }

    #[test]
    fn deriving_twice_nests() {
        let once = ArtifactPaths::derive(Path::new("pkg/mod.py"), "pkg.mod");
        let twice = ArtifactPaths::derive(&once.path, &once.name);
        assert_eq!(twice.name, "pkg.__codeless__.__codeless__.mod");
    }
}

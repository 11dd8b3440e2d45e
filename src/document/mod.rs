//! Document model and YAML input/output.
//!
//! Every config fragment in the system - hand-authored documents, overlay
//! documents, and the storage fragments built from scanned trees - is a
//! [`Document`]: a tree of mappings (ordered, string-keyed), sequences, and
//! scalars. Mappings preserve insertion order and reject duplicate keys at
//! parse time.

mod merge;
mod normalize;

pub use merge::{deep_merge, merge_all};
pub use normalize::{normalize_storage, NormalizeError};

use std::fs;
use std::path::{Path, PathBuf};

/// Generic structured document value.
pub type Document = serde_yaml::Value;

/// Errors for document IO and parsing
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("failed to read document {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse document {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to serialize document: {0}")]
    Serialize(#[source] serde_yaml::Error),
}

/// Load a YAML document from disk.
pub fn load(path: &Path) -> Result<Document, DocumentError> {
    let contents = fs::read_to_string(path).map_err(|source| DocumentError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&contents, path)
}

/// Parse YAML text into a document. An empty file is an empty mapping.
pub fn parse(contents: &str, path: &Path) -> Result<Document, DocumentError> {
    if contents.trim().is_empty() {
        return Ok(Document::Mapping(serde_yaml::Mapping::new()));
    }
    serde_yaml::from_str(contents).map_err(|source| DocumentError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Serialize a document back to YAML text.
pub fn to_yaml(document: &Document) -> Result<String, DocumentError> {
    serde_yaml::to_string(document).map_err(DocumentError::Serialize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_preserves_key_order() {
        let doc = parse("zeta: 1\nalpha: 2\nmiddle: 3\n", Path::new("test.bu")).unwrap();
        let keys: Vec<_> = doc
            .as_mapping()
            .unwrap()
            .keys()
            .map(|k| k.as_str().unwrap().to_string())
            .collect();
        assert_eq!(keys, vec!["zeta", "alpha", "middle"]);
    }

    #[test]
    fn test_parse_rejects_duplicate_keys() {
        let err = parse("a: 1\na: 2\n", Path::new("dup.bu")).unwrap_err();
        assert!(matches!(err, DocumentError::Parse { .. }));
    }

    #[test]
    fn test_empty_input_is_empty_mapping() {
        let doc = parse("", Path::new("empty.bu")).unwrap();
        assert_eq!(doc, Document::Mapping(serde_yaml::Mapping::new()));
    }

    #[test]
    fn test_yaml_round_trip_is_stable() {
        let doc = parse("variant: fcos\nversion: 1.4.0\nstorage:\n  files: []\n", Path::new("c.bu"))
            .unwrap();
        let first = to_yaml(&doc).unwrap();
        let reparsed = parse(&first, Path::new("c.bu")).unwrap();
        let second = to_yaml(&reparsed).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_load_missing_file_is_read_error() {
        let err = load(Path::new("/nonexistent/config.bu")).unwrap_err();
        assert!(matches!(err, DocumentError::Read { .. }));
    }
}

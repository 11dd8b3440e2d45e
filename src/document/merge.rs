//! Document merge logic
//!
//! Implements the recursive merge with:
//! - Mappings: deep-merge by key
//! - Sequences: CONCATENATE (base first, overlay appended)
//! - Scalars: override (overlay wins)
//! - Null overlay: base kept

use super::Document;
use serde_yaml::Value;

/// Deep merge two documents.
///
/// Merge semantics:
/// - Mappings: deep-merge by key (recursive); base key order is preserved,
///   keys only present in the overlay are appended in overlay order
/// - Sequences: concatenation (base elements first)
/// - Scalars and kind mismatches: overlay wins
/// - Null overlay: base is left untouched
pub fn deep_merge(base: Document, overlay: Document) -> Document {
    match (base, overlay) {
        // Null overlay leaves the base alone
        (base, Value::Null) => base,

        // Both mappings: deep merge
        (Value::Mapping(mut base_map), Value::Mapping(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(slot) => {
                        let base_value = std::mem::replace(slot, Value::Null);
                        *slot = deep_merge(base_value, overlay_value);
                    }
                    None => {
                        // null never introduces a key either
                        if !overlay_value.is_null() {
                            base_map.insert(key, overlay_value);
                        }
                    }
                }
            }
            Value::Mapping(base_map)
        }

        // Sequences: append overlay elements after base elements
        (Value::Sequence(mut base_seq), Value::Sequence(overlay_seq)) => {
            base_seq.extend(overlay_seq);
            Value::Sequence(base_seq)
        }

        // Scalars and any other case: overlay wins
        (_, overlay) => overlay,
    }
}

/// Merge documents in order (first is the base, later ones overlay earlier
/// ones), as a fixed left-to-right fold.
pub fn merge_all(documents: Vec<Document>) -> Document {
    documents.into_iter().fold(Value::Null, deep_merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse;
    use std::path::Path;

    fn doc(yaml: &str) -> Document {
        parse(yaml, Path::new("test.bu")).unwrap()
    }

    #[test]
    fn test_scalar_override() {
        let base = doc("mode: 420");
        let overlay = doc("mode: 493");
        let result = deep_merge(base, overlay);
        assert_eq!(result["mode"], Value::from(493));
    }

    #[test]
    fn test_sequence_concatenation() {
        let base = doc("files: [a, b]");
        let overlay = doc("files: [c, d, e]");
        let result = deep_merge(base, overlay);

        let files = result["files"].as_sequence().unwrap();
        assert_eq!(files.len(), 5);
        let names: Vec<_> = files.iter().map(|v| v.as_str().unwrap()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_mapping_deep_merge() {
        let base = doc("storage:\n  files: []\n  directories: []");
        let overlay = doc("storage:\n  files: [x]");
        let result = deep_merge(base, overlay);

        assert_eq!(result["storage"]["files"].as_sequence().unwrap().len(), 1);
        assert!(result["storage"]["directories"].as_sequence().unwrap().is_empty());
    }

    #[test]
    fn test_mapping_key_order_base_first_overlay_appended() {
        let base = doc("zeta: 1\nalpha: 2");
        let overlay = doc("omega: 3\nalpha: 9");
        let result = deep_merge(base, overlay);

        let keys: Vec<_> = result
            .as_mapping()
            .unwrap()
            .keys()
            .map(|k| k.as_str().unwrap().to_string())
            .collect();
        assert_eq!(keys, vec!["zeta", "alpha", "omega"]);
        assert_eq!(result["alpha"], Value::from(9));
    }

    #[test]
    fn test_null_overlay_keeps_base() {
        let base = doc("value: 100");
        let result = deep_merge(base, Value::Null);
        assert_eq!(result["value"], Value::from(100));

        // a null value inside a mapping also leaves the base field alone
        let base = doc("a: 1\nb: 2");
        let overlay = doc("a: null\nc: null");
        let result = deep_merge(base, overlay);
        assert_eq!(result["a"], Value::from(1));
        // and never introduces a new key
        assert!(result.get("c").is_none());
    }

    #[test]
    fn test_kind_mismatch_overlay_wins() {
        let base = doc("value: [1, 2]");
        let overlay = doc("value: plain");
        let result = deep_merge(base, overlay);
        assert_eq!(result["value"], Value::from("plain"));

        let base = doc("value: plain");
        let overlay = doc("value:\n  nested: true");
        let result = deep_merge(base, overlay);
        assert_eq!(result["value"]["nested"], Value::from(true));
    }

    #[test]
    fn test_merge_all_left_to_right() {
        let result = merge_all(vec![
            doc("mode: 1\nfiles: [a]"),
            doc("mode: 2\nfiles: [b]"),
            doc("files: [c]"),
        ]);
        assert_eq!(result["mode"], Value::from(2));
        let names: Vec<_> = result["files"]
            .as_sequence()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_fold_matches_pairwise_merge() {
        let a = doc("x: 1\nlist: [1]");
        let b = doc("y: 2\nlist: [2]");
        let c = doc("x: 3\nlist: [3]");

        let folded = merge_all(vec![a.clone(), b.clone(), c.clone()]);
        let pairwise = deep_merge(deep_merge(a, b), c);
        assert_eq!(folded, pairwise);
    }
}

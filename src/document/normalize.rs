//! Post-merge normalization of storage entry lists.
//!
//! Merging concatenates `storage.files`, `storage.directories` and
//! `storage.links` across documents; afterwards the same path may be
//! declared more than once. Normalization collapses identical duplicates,
//! folds duplicate file declarations that only add `append` fragments into
//! the first declaration, and rejects everything else as a conflict.

use super::Document;
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;

/// Errors for storage normalization
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("conflicting declarations for {kind} entry {path:?}")]
    Conflicting { kind: &'static str, path: String },

    #[error("cannot overwrite contents of already declared file {path:?}")]
    FileOverwrite { path: String },

    #[error("storage {kind} entry without a path")]
    MissingPath { kind: &'static str },
}

/// Deduplicate the storage lists of a merged document in place.
///
/// A document without `storage` (or without some of the lists) is left
/// untouched.
pub fn normalize_storage(document: &mut Document) -> Result<(), NormalizeError> {
    let Some(storage) = document.get_mut("storage") else {
        return Ok(());
    };

    for kind in ["directories", "links"] {
        if let Some(Value::Sequence(list)) = storage.get_mut(kind) {
            *list = unique_paths(std::mem::take(list), kind)?;
        }
    }
    if let Some(Value::Sequence(list)) = storage.get_mut("files") {
        *list = unique_files(std::mem::take(list))?;
    }

    Ok(())
}

/// Keep the first declaration per path; identical later duplicates are
/// dropped, differing ones are a conflict.
fn unique_paths(entries: Vec<Value>, kind: &'static str) -> Result<Vec<Value>, NormalizeError> {
    let mut kept: Vec<Value> = Vec::new();
    let mut by_path: HashMap<String, usize> = HashMap::new();

    for entry in entries {
        let path = entry_path(&entry, kind)?;
        match by_path.get(&path) {
            None => {
                by_path.insert(path, kept.len());
                kept.push(entry);
            }
            Some(&index) if entry == kept[index] => {}
            Some(_) => return Err(NormalizeError::Conflicting { kind, path }),
        }
    }

    Ok(kept)
}

/// Files additionally support merging duplicate declarations whose only
/// divergence is an `append` list: the fragments are concatenated onto the
/// first declaration.
fn unique_files(entries: Vec<Value>) -> Result<Vec<Value>, NormalizeError> {
    let mut kept: Vec<Value> = Vec::new();
    let mut by_path: HashMap<String, usize> = HashMap::new();

    for entry in entries {
        let path = entry_path(&entry, "files")?;
        match by_path.get(&path) {
            None => {
                by_path.insert(path, kept.len());
                kept.push(entry);
            }
            Some(&index) if entry == kept[index] => {}
            Some(&index) => merge_duplicate_file(&mut kept[index], entry, &path)?,
        }
    }

    Ok(kept)
}

fn merge_duplicate_file(
    kept: &mut Value,
    duplicate: Value,
    path: &str,
) -> Result<(), NormalizeError> {
    let conflict = || NormalizeError::Conflicting {
        kind: "files",
        path: path.to_string(),
    };

    let Value::Mapping(mut duplicate) = duplicate else {
        return Err(conflict());
    };
    let Value::Mapping(kept_map) = kept else {
        return Err(conflict());
    };

    if duplicate.contains_key("contents") {
        return Err(NormalizeError::FileOverwrite {
            path: path.to_string(),
        });
    }

    let append = match duplicate.remove("append") {
        Some(Value::Sequence(fragments)) => fragments,
        Some(_) => return Err(conflict()),
        None => Vec::new(),
    };

    // everything besides contents/append must agree with the kept declaration
    let mut kept_comparable = kept_map.clone();
    kept_comparable.remove("contents");
    kept_comparable.remove("append");
    if duplicate != kept_comparable {
        return Err(conflict());
    }

    match kept_map.get_mut("append") {
        Some(Value::Sequence(existing)) => existing.extend(append),
        Some(_) => return Err(conflict()),
        None => {
            kept_map.insert(Value::from("append"), Value::Sequence(append));
        }
    }

    Ok(())
}

fn entry_path(entry: &Value, kind: &'static str) -> Result<String, NormalizeError> {
    entry
        .get("path")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(NormalizeError::MissingPath { kind })
}

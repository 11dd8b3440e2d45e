//! Entry model for scanned file trees.
//!
//! An [`Entry`] is one filesystem object destined for the output document's
//! `storage` section. Paths are absolute, slash-separated, and relative to
//! the scanned tree root: the file `src/main/etc/motd` in a tree rooted at
//! `src/main` becomes the entry path `/etc/motd`.

use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};

/// Default mode for regular files.
pub const DEFAULT_FILE_MODE: u32 = 0o644;
/// Default mode for executable files.
pub const DEFAULT_EXECUTABLE_MODE: u32 = 0o755;
/// Default mode for directories.
pub const DEFAULT_DIRECTORY_MODE: u32 = 0o755;

/// Kind and kind-specific payload of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    File {
        /// Raw bytes read from disk. Empty files produce no contents
        /// fragment in the document.
        contents: Vec<u8>,
        /// Owner-execute bit was set on the source file.
        is_executable: bool,
        /// Source path relative to the project root, used for contents the
        /// document notation cannot carry inline.
        source: PathBuf,
    },
    Directory,
    Link {
        /// Literal link target, never dereferenced.
        target: String,
    },
}

/// Metadata attached to an entry. `None` means unspecified: the field is
/// omitted from the document and the translator applies its own default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub user: Option<String>,
    pub group: Option<String>,
    pub mode: Option<u32>,
    pub overwrite: Option<bool>,
}

impl Metadata {
    /// Overlay `other` field by field: set fields in `other` win, unset
    /// fields keep the current value.
    pub fn apply(&mut self, other: &Metadata) {
        if let Some(user) = &other.user {
            self.user = Some(user.clone());
        }
        if let Some(group) = &other.group {
            self.group = Some(group.clone());
        }
        if let Some(mode) = other.mode {
            self.mode = Some(mode);
        }
        if let Some(overwrite) = other.overwrite {
            self.overwrite = Some(overwrite);
        }
    }
}

/// One filesystem object to embed in the output document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Absolute, slash-separated path relative to the tree root.
    pub path: String,
    pub kind: EntryKind,
    pub metadata: Metadata,
}

impl Entry {
    /// A regular file entry with the default file mode.
    pub fn file(path: String, contents: Vec<u8>, is_executable: bool, source: PathBuf) -> Self {
        let mode = if is_executable {
            DEFAULT_EXECUTABLE_MODE
        } else {
            DEFAULT_FILE_MODE
        };
        Self {
            path,
            kind: EntryKind::File {
                contents,
                is_executable,
                source,
            },
            metadata: Metadata {
                mode: Some(mode),
                ..Metadata::default()
            },
        }
    }

    /// A directory entry with the default directory mode.
    pub fn directory(path: String) -> Self {
        Self {
            path,
            kind: EntryKind::Directory,
            metadata: Metadata {
                mode: Some(DEFAULT_DIRECTORY_MODE),
                ..Metadata::default()
            },
        }
    }

    /// A symbolic link entry. Links carry no mode.
    pub fn link(path: String, target: String) -> Self {
        Self {
            path,
            kind: EntryKind::Link { target },
            metadata: Metadata::default(),
        }
    }

    /// Render the entry as a document mapping in translator field order.
    pub fn to_value(&self) -> Value {
        let mut map = Mapping::new();
        map.insert(Value::from("path"), Value::from(self.path.as_str()));

        match &self.kind {
            EntryKind::Link { target } => {
                map.insert(Value::from("target"), Value::from(target.as_str()));
            }
            EntryKind::File { contents, source, .. } if !contents.is_empty() => {
                map.insert(Value::from("contents"), contents_fragment(contents, source));
            }
            EntryKind::File { .. } | EntryKind::Directory => {}
        }

        if let Some(mode) = self.metadata.mode {
            map.insert(Value::from("mode"), Value::from(mode));
        }
        if let Some(user) = &self.metadata.user {
            map.insert(Value::from("user"), name_fragment(user));
        }
        if let Some(group) = &self.metadata.group {
            map.insert(Value::from("group"), name_fragment(group));
        }
        if let Some(overwrite) = self.metadata.overwrite {
            map.insert(Value::from("overwrite"), Value::from(overwrite));
        }

        Value::Mapping(map)
    }
}

/// Inline contents when the notation can carry them, otherwise a local
/// reference the translator resolves against its files directory.
fn contents_fragment(contents: &[u8], source: &Path) -> Value {
    let mut fragment = Mapping::new();
    match std::str::from_utf8(contents) {
        Ok(text) => {
            fragment.insert(Value::from("inline"), Value::from(text));
        }
        Err(_) => {
            fragment.insert(
                Value::from("local"),
                Value::from(source.to_string_lossy().as_ref()),
            );
        }
    }
    Value::Mapping(fragment)
}

fn name_fragment(name: &str) -> Value {
    let mut fragment = Mapping::new();
    fragment.insert(Value::from("name"), Value::from(name));
    Value::Mapping(fragment)
}

/// Build the `{storage: {directories, files, links}}` fragment for a set of
/// resolved entries. Empty lists are omitted.
pub fn storage_fragment(entries: &[Entry]) -> Value {
    let mut directories = Vec::new();
    let mut files = Vec::new();
    let mut links = Vec::new();

    for entry in entries {
        match entry.kind {
            EntryKind::Directory => directories.push(entry.to_value()),
            EntryKind::File { .. } => files.push(entry.to_value()),
            EntryKind::Link { .. } => links.push(entry.to_value()),
        }
    }

    let mut storage = Mapping::new();
    if !directories.is_empty() {
        storage.insert(Value::from("directories"), Value::Sequence(directories));
    }
    if !files.is_empty() {
        storage.insert(Value::from("files"), Value::Sequence(files));
    }
    if !links.is_empty() {
        storage.insert(Value::from("links"), Value::Sequence(links));
    }

    let mut document = Mapping::new();
    if !storage.is_empty() {
        document.insert(Value::from("storage"), Value::Mapping(storage));
    }
    Value::Mapping(document)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_defaults() {
        let entry = Entry::file("/etc/motd".into(), b"hi".to_vec(), false, "src/main/etc/motd".into());
        assert_eq!(entry.metadata.mode, Some(0o644));

        let entry = Entry::file("/usr/bin/run".into(), b"#!/bin/sh".to_vec(), true, "src/main/usr/bin/run".into());
        assert_eq!(entry.metadata.mode, Some(0o755));
    }

    #[test]
    fn test_directory_defaults() {
        let entry = Entry::directory("/opt".into());
        assert_eq!(entry.metadata.mode, Some(0o755));
        assert_eq!(entry.kind, EntryKind::Directory);
    }

    #[test]
    fn test_link_has_no_mode() {
        let entry = Entry::link("/etc/tz".into(), "/usr/share/zoneinfo/UTC".into());
        assert_eq!(entry.metadata.mode, None);
        let value = entry.to_value();
        assert_eq!(value["target"], Value::from("/usr/share/zoneinfo/UTC"));
        assert!(value.get("mode").is_none());
    }

    #[test]
    fn test_file_value_inlines_utf8_contents() {
        let entry = Entry::file("/etc/motd".into(), b"hi".to_vec(), false, "src/main/etc/motd".into());
        let value = entry.to_value();
        assert_eq!(value["path"], Value::from("/etc/motd"));
        assert_eq!(value["contents"]["inline"], Value::from("hi"));
        assert_eq!(value["mode"], Value::from(0o644));
    }

    #[test]
    fn test_file_value_falls_back_to_local_for_binary() {
        let entry = Entry::file(
            "/opt/blob".into(),
            vec![0xff, 0xfe, 0x00],
            false,
            "src/main/opt/blob".into(),
        );
        let value = entry.to_value();
        assert_eq!(value["contents"]["local"], Value::from("src/main/opt/blob"));
        assert!(value["contents"].get("inline").is_none());
    }

    #[test]
    fn test_empty_file_has_no_contents_fragment() {
        let entry = Entry::file("/etc/empty".into(), Vec::new(), false, "src/main/etc/empty".into());
        let value = entry.to_value();
        assert!(value.get("contents").is_none());
    }

    #[test]
    fn test_metadata_fields_render_as_fragments() {
        let mut entry = Entry::file("/etc/motd".into(), b"hi".to_vec(), false, "src/main/etc/motd".into());
        entry.metadata.apply(&Metadata {
            user: Some("core".into()),
            group: Some("wheel".into()),
            mode: Some(0o600),
            overwrite: Some(true),
        });

        let value = entry.to_value();
        assert_eq!(value["user"]["name"], Value::from("core"));
        assert_eq!(value["group"]["name"], Value::from("wheel"));
        assert_eq!(value["mode"], Value::from(0o600));
        assert_eq!(value["overwrite"], Value::from(true));
    }

    #[test]
    fn test_metadata_apply_is_field_wise() {
        let mut metadata = Metadata {
            user: Some("root".into()),
            mode: Some(0o644),
            ..Metadata::default()
        };
        metadata.apply(&Metadata {
            group: Some("wheel".into()),
            ..Metadata::default()
        });

        assert_eq!(metadata.user.as_deref(), Some("root"));
        assert_eq!(metadata.group.as_deref(), Some("wheel"));
        assert_eq!(metadata.mode, Some(0o644));
    }

    #[test]
    fn test_storage_fragment_groups_by_kind() {
        let entries = vec![
            Entry::directory("/opt".into()),
            Entry::file("/opt/app".into(), b"x".to_vec(), true, "src/main/opt/app".into()),
            Entry::link("/etc/tz".into(), "UTC".into()),
        ];
        let fragment = storage_fragment(&entries);

        assert_eq!(fragment["storage"]["directories"].as_sequence().unwrap().len(), 1);
        assert_eq!(fragment["storage"]["files"].as_sequence().unwrap().len(), 1);
        assert_eq!(fragment["storage"]["links"].as_sequence().unwrap().len(), 1);
    }

    #[test]
    fn test_storage_fragment_omits_empty_lists() {
        let entries = vec![Entry::directory("/opt".into())];
        let fragment = storage_fragment(&entries);
        assert!(fragment["storage"].get("files").is_none());
        assert!(fragment["storage"].get("links").is_none());

        let empty = storage_fragment(&[]);
        assert!(empty.get("storage").is_none());
    }
}

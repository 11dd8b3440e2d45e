//! Deterministic file-tree scanning.
//!
//! Walks a tree root and produces one [`Entry`] per regular file, directory
//! and symbolic link, in lexicographic path order. Overlay-declaration files
//! found during the walk are reported separately and never become entries.

mod entry;

pub use entry::{storage_fragment, Entry, EntryKind, Metadata};

use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Default file name of overlay-declaration files inside a tree.
pub const DECLARATION_FILE_NAME: &str = "subconfig.bu";

/// Errors for tree scanning
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("failed to walk tree {root}: {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read metadata for {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("path {path} is not under the scanned root {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },
}

/// Location of one overlay-declaration file found during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationSite {
    /// Directory containing the declaration, in entry path space
    /// (`/` for the tree root, `/a/b` for a nested directory).
    pub directory: String,
    /// On-disk path of the declaration file.
    pub path: PathBuf,
}

/// Result of scanning one tree.
#[derive(Debug)]
pub struct Scan {
    /// Entries in lexicographic path order.
    pub entries: Vec<Entry>,
    /// Declaration files in lexicographic on-disk path order.
    pub declarations: Vec<DeclarationSite>,
}

/// Scanner for one file tree.
pub struct Scanner {
    root: PathBuf,
    /// Prefix for file source paths, relative to the project root.
    source_prefix: PathBuf,
    declaration_name: String,
}

impl Scanner {
    /// Create a scanner for the given tree root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            source_prefix: PathBuf::new(),
            declaration_name: DECLARATION_FILE_NAME.to_string(),
        }
    }

    /// Set the prefix recorded as the source location of scanned files
    /// (the tree root's path relative to the project root).
    pub fn with_source_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.source_prefix = prefix.into();
        self
    }

    /// Override the declaration file name.
    pub fn with_declaration_name(mut self, name: impl Into<String>) -> Self {
        self.declaration_name = name.into();
        self
    }

    /// Walk the tree and collect entries and declaration sites.
    ///
    /// Objects named `.gitignore` are skipped entirely (directories with
    /// their whole subtree); editor backups (`*~`) likewise. Skipped names
    /// never suppress their siblings.
    pub fn scan(&self) -> Result<Scan, ScanError> {
        let mut entries = Vec::new();
        let mut declarations = Vec::new();

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
            .into_iter()
            .filter_entry(|candidate| !is_skipped_name(&candidate.file_name().to_string_lossy()));

        for result in walker {
            let dir_entry = result.map_err(|source| ScanError::Walk {
                root: self.root.clone(),
                source,
            })?;
            let path = dir_entry.path();
            let relative = path
                .strip_prefix(&self.root)
                .map_err(|_| ScanError::OutsideRoot {
                    path: path.to_path_buf(),
                    root: self.root.clone(),
                })?;

            // the root itself is not an entry
            if relative.as_os_str().is_empty() {
                continue;
            }

            let entry_path = virtual_path(relative);
            let file_type = dir_entry.file_type();

            if file_type.is_symlink() {
                let target = fs::read_link(path).map_err(|source| ScanError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                entries.push(Entry::link(
                    entry_path,
                    target.to_string_lossy().into_owned(),
                ));
            } else if file_type.is_dir() {
                entries.push(Entry::directory(entry_path));
            } else if dir_entry.file_name().to_string_lossy() == self.declaration_name.as_str() {
                declarations.push(DeclarationSite {
                    directory: parent_virtual_path(relative),
                    path: path.to_path_buf(),
                });
            } else {
                let metadata = fs::metadata(path).map_err(|source| ScanError::Metadata {
                    path: path.to_path_buf(),
                    source,
                })?;
                let contents = fs::read(path).map_err(|source| ScanError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                entries.push(Entry::file(
                    entry_path,
                    contents,
                    is_executable(&metadata),
                    self.source_prefix.join(relative),
                ));
            }
        }

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        declarations.sort_by(|a, b| a.path.cmp(&b.path));

        tracing::debug!(
            root = %self.root.display(),
            entries = entries.len(),
            declarations = declarations.len(),
            "scanned tree"
        );

        Ok(Scan {
            entries,
            declarations,
        })
    }
}

fn is_skipped_name(name: &str) -> bool {
    name == ".gitignore" || name.ends_with('~')
}

/// Map a root-relative on-disk path to entry path space: absolute,
/// slash-separated, no trailing separator.
fn virtual_path(relative: &Path) -> String {
    let mut out = String::new();
    for component in relative.components() {
        out.push('/');
        out.push_str(&component.as_os_str().to_string_lossy());
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

fn parent_virtual_path(relative: &Path) -> String {
    virtual_path(relative.parent().unwrap_or(Path::new("")))
}

/// Owner-execute bit of the source file.
#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o100 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    false
}

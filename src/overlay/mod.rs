//! Overlay-declaration files and metadata resolution.
//!
//! A declaration file (`subconfig.bu` by default) holds up to three ordered
//! rule lists - `files`, `directories`, `links` - whose glob patterns are
//! interpreted relative to the declaring directory. Resolution applies every
//! matching rule to an entry field by field; rules from deeper declaration
//! files outrank shallower ones, and within one file later list entries
//! outrank earlier ones.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::pattern::{PathPattern, PatternError};
use crate::tree::{DeclarationSite, Entry, EntryKind, Metadata};

/// Errors for declaration file handling
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error("failed to read declaration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse declaration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("declaration file {path}: {source}")]
    Pattern {
        path: PathBuf,
        #[source]
        source: PatternError,
    },
}

/// Reference to a user or group by name.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct IdentityRef {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
    path: String,
    #[serde(default)]
    user: Option<IdentityRef>,
    #[serde(default)]
    group: Option<IdentityRef>,
    #[serde(default)]
    mode: Option<u32>,
    #[serde(default)]
    overwrite: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDeclaration {
    #[serde(default)]
    files: Vec<RawRule>,
    #[serde(default)]
    directories: Vec<RawRule>,
    #[serde(default)]
    links: Vec<RawRule>,
}

/// One compiled rule: a pattern plus the metadata fields it sets.
#[derive(Debug, Clone)]
pub struct Rule {
    pub pattern: PathPattern,
    pub metadata: Metadata,
}

impl Rule {
    fn compile(raw: RawRule, path: &Path) -> Result<Self, OverlayError> {
        let pattern = PathPattern::new(&raw.path).map_err(|source| OverlayError::Pattern {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            pattern,
            metadata: Metadata {
                user: raw.user.map(|identity| identity.name),
                group: raw.group.map(|identity| identity.name),
                mode: raw.mode,
                overwrite: raw.overwrite,
            },
        })
    }
}

/// A parsed declaration file, scoped to its directory.
#[derive(Debug)]
pub struct DeclarationFile {
    /// Directory containing the declaration, in entry path space.
    pub directory: String,
    /// On-disk path, for diagnostics.
    pub path: PathBuf,
    pub files: Vec<Rule>,
    pub directories: Vec<Rule>,
    pub links: Vec<Rule>,
}

impl DeclarationFile {
    /// Load and compile a declaration file found by the scanner.
    pub fn load(site: &DeclarationSite) -> Result<Self, OverlayError> {
        let contents = fs::read_to_string(&site.path).map_err(|source| OverlayError::Read {
            path: site.path.clone(),
            source,
        })?;
        Self::parse(&contents, site)
    }

    fn parse(contents: &str, site: &DeclarationSite) -> Result<Self, OverlayError> {
        let raw: RawDeclaration = if contents.trim().is_empty() {
            RawDeclaration::default()
        } else {
            serde_yaml::from_str(contents).map_err(|source| OverlayError::Parse {
                path: site.path.clone(),
                source,
            })?
        };

        let compile_list = |rules: Vec<RawRule>| -> Result<Vec<Rule>, OverlayError> {
            rules
                .into_iter()
                .map(|raw| Rule::compile(raw, &site.path))
                .collect()
        };

        Ok(Self {
            directory: site.directory.clone(),
            path: site.path.clone(),
            files: compile_list(raw.files)?,
            directories: compile_list(raw.directories)?,
            links: compile_list(raw.links)?,
        })
    }

    fn rules_for(&self, kind: &EntryKind) -> &[Rule] {
        match kind {
            EntryKind::File { .. } => &self.files,
            EntryKind::Directory => &self.directories,
            EntryKind::Link { .. } => &self.links,
        }
    }
}

/// Finalize entry metadata against a set of declaration files.
///
/// Declarations are processed shallow to deep (lexicographic directory
/// order; ancestors of any given entry are totally ordered by depth), and
/// within one file in list order, so later applications are exactly the
/// higher-precedence rules. Fields are overlaid independently. Rules that
/// match nothing are silently unused.
pub fn resolve(entries: &mut [Entry], declarations: &[DeclarationFile]) {
    let mut ordered: Vec<&DeclarationFile> = declarations.iter().collect();
    ordered.sort_by(|a, b| a.directory.cmp(&b.directory));

    for entry in entries.iter_mut() {
        for declaration in &ordered {
            let Some(relative) = relative_to(&entry.path, &declaration.directory) else {
                continue;
            };
            for rule in declaration.rules_for(&entry.kind) {
                if rule.pattern.matches(&relative) {
                    entry.metadata.apply(&rule.metadata);
                }
            }
        }
    }
}

/// Entry path relative to a declaration directory, or `None` when the entry
/// does not fall under (or at) that directory.
fn relative_to(path: &str, directory: &str) -> Option<String> {
    if directory == "/" {
        return Some(path.trim_start_matches('/').to_string());
    }
    let rest = path.strip_prefix(directory)?;
    if rest.is_empty() {
        // the declaring directory itself
        return Some(String::new());
    }
    rest.strip_prefix('/').map(str::to_string)
}

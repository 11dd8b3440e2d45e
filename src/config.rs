//! Layered tool configuration.
//!
//! Three layers, later wins per field:
//! 1. Built-in defaults (the conventional project layout)
//! 2. Optional `buweld.toml` in the project root
//! 3. CLI flags

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the project root.
pub const CONFIG_FILE_NAME: &str = "buweld.toml";

/// Upper bound for the translator timeout, seconds.
const TIMEOUT_MAX_SECONDS: u64 = 3600;

/// Errors for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("timeout_seconds must be in (0, {TIMEOUT_MAX_SECONDS}], got {value}")]
    TimeoutOutOfBounds { value: u64 },

    #[error("base document {path} is missing or not a file")]
    BaseDocumentMissing { path: PathBuf },

    #[error("failed to list overlay directory {path}: {source}")]
    OverlayDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Values read from `buweld.toml`; every field optional.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    base_document: Option<PathBuf>,
    overlay_dir: Option<PathBuf>,
    tree_dir: Option<PathBuf>,
    main_unit: Option<String>,
    declaration_name: Option<String>,
    output: Option<PathBuf>,
    #[serde(default)]
    translator: TranslatorFileConfig,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct TranslatorFileConfig {
    program: Option<PathBuf>,
    args: Option<Vec<String>>,
    timeout_seconds: Option<u64>,
}

/// CLI-provided overrides (the highest-precedence layer).
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub output: Option<PathBuf>,
    pub translator: Option<PathBuf>,
    pub timeout_seconds: Option<u64>,
}

/// Fully resolved configuration. All relative paths are interpreted against
/// `root`; no component changes the process working directory.
#[derive(Debug, Clone)]
pub struct Config {
    pub root: PathBuf,
    pub base_document: PathBuf,
    pub overlay_dir: PathBuf,
    pub tree_dir: PathBuf,
    pub main_unit: String,
    pub declaration_name: String,
    pub output: PathBuf,
    pub translator_program: PathBuf,
    pub translator_args: Vec<String>,
    pub timeout_seconds: u64,
}

impl Config {
    /// Built-in defaults for a project root.
    pub fn defaults(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            base_document: PathBuf::from("config.bu"),
            overlay_dir: PathBuf::from("config.bu.d"),
            tree_dir: PathBuf::from("src"),
            main_unit: "main".to_string(),
            declaration_name: "subconfig.bu".to_string(),
            output: PathBuf::from("config.ign"),
            translator_program: PathBuf::from("butane"),
            translator_args: vec!["--strict".to_string()],
            timeout_seconds: 120,
        }
    }

    /// Resolve the effective configuration for a project root.
    ///
    /// `config_path` forces a specific config file (which must then exist);
    /// otherwise `<root>/buweld.toml` is used when present.
    pub fn load(
        root: &Path,
        config_path: Option<&Path>,
        overrides: &Overrides,
    ) -> Result<Self, ConfigurationError> {
        let mut config = Self::defaults(root);

        let file = match config_path {
            Some(path) => Some(Self::load_file(path)?),
            None => {
                let default_path = root.join(CONFIG_FILE_NAME);
                if default_path.is_file() {
                    Some(Self::load_file(&default_path)?)
                } else {
                    None
                }
            }
        };
        if let Some(file) = file {
            config.apply_file(file);
        }
        config.apply_overrides(overrides);
        config.validate()?;

        Ok(config)
    }

    fn load_file(path: &Path) -> Result<FileConfig, ConfigurationError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigurationError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(base_document) = file.base_document {
            self.base_document = base_document;
        }
        if let Some(overlay_dir) = file.overlay_dir {
            self.overlay_dir = overlay_dir;
        }
        if let Some(tree_dir) = file.tree_dir {
            self.tree_dir = tree_dir;
        }
        if let Some(main_unit) = file.main_unit {
            self.main_unit = main_unit;
        }
        if let Some(declaration_name) = file.declaration_name {
            self.declaration_name = declaration_name;
        }
        if let Some(output) = file.output {
            self.output = output;
        }
        if let Some(program) = file.translator.program {
            self.translator_program = program;
        }
        if let Some(args) = file.translator.args {
            self.translator_args = args;
        }
        if let Some(timeout_seconds) = file.translator.timeout_seconds {
            self.timeout_seconds = timeout_seconds;
        }
    }

    fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(output) = &overrides.output {
            self.output = output.clone();
        }
        if let Some(translator) = &overrides.translator {
            self.translator_program = translator.clone();
        }
        if let Some(timeout_seconds) = overrides.timeout_seconds {
            self.timeout_seconds = timeout_seconds;
        }
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.timeout_seconds == 0 || self.timeout_seconds > TIMEOUT_MAX_SECONDS {
            return Err(ConfigurationError::TimeoutOutOfBounds {
                value: self.timeout_seconds,
            });
        }
        Ok(())
    }

    /// Absolute path of the base document.
    pub fn base_document_path(&self) -> PathBuf {
        self.root.join(&self.base_document)
    }

    /// Absolute path of the overlay document directory.
    pub fn overlay_dir_path(&self) -> PathBuf {
        self.root.join(&self.overlay_dir)
    }

    /// Absolute path of the output artifact.
    pub fn output_path(&self) -> PathBuf {
        self.root.join(&self.output)
    }

    /// Tree root for a unit name, and its project-root-relative prefix.
    pub fn tree_paths(&self, unit: &str) -> (PathBuf, PathBuf) {
        let prefix = self.tree_dir.join(unit);
        (self.root.join(&prefix), prefix)
    }
}

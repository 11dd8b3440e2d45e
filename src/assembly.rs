//! Assembly orchestration.
//!
//! Sequences the whole pipeline: load the base document, pair every overlay
//! document with its file tree, inject scanned entries, fold everything into
//! one document, normalize the storage lists, and hand the result to the
//! external translator. Units are processed strictly in declaration order
//! (the base first, then overlay documents sorted by file name) so the merge
//! fold is deterministic.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{Config, ConfigurationError};
use crate::document::{
    self, deep_merge, merge_all, normalize_storage, Document, DocumentError, NormalizeError,
};
use crate::overlay::{self, DeclarationFile, OverlayError};
use crate::translator::{ExternalToolError, Translator};
use crate::tree::{storage_fragment, ScanError, Scanner};

/// Top-level assembly errors
#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Overlay(#[from] OverlayError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    ExternalTool(#[from] ExternalToolError),

    #[error("failed to write output {path}: {source}")]
    WriteOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AssemblyError {
    /// Stable exit code per error class.
    pub fn exit_code(&self) -> i32 {
        match self {
            AssemblyError::Configuration(_) => 10,
            AssemblyError::Document(_) => 20,
            AssemblyError::Scan(_) => 30,
            AssemblyError::Overlay(_) => 40,
            AssemblyError::Normalize(_) => 50,
            AssemblyError::ExternalTool(_) => 60,
            AssemblyError::WriteOutput { .. } => 70,
        }
    }
}

/// One named unit: an overlay document paired with its file tree.
#[derive(Debug)]
struct Unit {
    name: String,
    document_path: PathBuf,
}

/// Drives one assembly run over a resolved [`Config`].
pub struct Assembler {
    config: Config,
}

impl Assembler {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Produce the fully merged document without invoking the translator.
    pub fn assemble(&self) -> Result<Document, AssemblyError> {
        let base_path = self.config.base_document_path();
        if !base_path.is_file() {
            return Err(ConfigurationError::BaseDocumentMissing { path: base_path }.into());
        }

        tracing::info!(base = %base_path.display(), "assembling");
        let mut documents = vec![self.unit_document(&base_path, &self.config.main_unit)?];

        for unit in self.overlay_units()? {
            tracing::info!(unit = unit.name, "loading overlay unit");
            documents.push(self.unit_document(&unit.document_path, &unit.name)?);
        }

        // fixed left-to-right fold, base first, unit declaration order after
        let mut merged = merge_all(documents);
        normalize_storage(&mut merged)?;
        Ok(merged)
    }

    /// Assemble, translate, and write the output artifact.
    ///
    /// Returns the output path. Nothing is written unless the translator
    /// succeeds.
    pub fn run(&self) -> Result<PathBuf, AssemblyError> {
        let merged = self.assemble()?;
        let yaml = document::to_yaml(&merged)?;

        let translator = Translator::new(
            self.config.translator_program.clone(),
            self.config.translator_args.clone(),
            self.config.root.clone(),
            Duration::from_secs(self.config.timeout_seconds),
        );
        let version = translator.check_version()?;
        tracing::info!(version, "translator ready");

        let artifact = translator.translate(&yaml)?;

        let output_path = self.config.output_path();
        fs::write(&output_path, &artifact).map_err(|source| AssemblyError::WriteOutput {
            path: output_path.clone(),
            source,
        })?;
        tracing::info!(output = %output_path.display(), bytes = artifact.len(), "wrote artifact");

        Ok(output_path)
    }

    /// Load one unit's document and inject its tree entries, if it has a
    /// tree. A missing tree is simply "no tree".
    fn unit_document(
        &self,
        document_path: &std::path::Path,
        unit_name: &str,
    ) -> Result<Document, AssemblyError> {
        let mut document = document::load(document_path)?;

        let (tree_root, source_prefix) = self.config.tree_paths(unit_name);
        if tree_root.is_dir() {
            let scan = Scanner::new(&tree_root)
                .with_source_prefix(&source_prefix)
                .with_declaration_name(&self.config.declaration_name)
                .scan()?;

            let declarations = scan
                .declarations
                .iter()
                .map(DeclarationFile::load)
                .collect::<Result<Vec<_>, _>>()?;

            let mut entries = scan.entries;
            overlay::resolve(&mut entries, &declarations);

            tracing::debug!(
                unit = unit_name,
                entries = entries.len(),
                declarations = declarations.len(),
                "injecting tree entries"
            );
            document = deep_merge(document, storage_fragment(&entries));
        }

        Ok(document)
    }

    /// Overlay units in lexicographic file-name order.
    fn overlay_units(&self) -> Result<Vec<Unit>, AssemblyError> {
        let dir = self.config.overlay_dir_path();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        let listing = fs::read_dir(&dir).map_err(|source| ConfigurationError::OverlayDir {
            path: dir.clone(),
            source,
        })?;
        for result in listing {
            let dir_entry = result.map_err(|source| ConfigurationError::OverlayDir {
                path: dir.clone(),
                source,
            })?;
            let path = dir_entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "bu") {
                paths.push(path);
            }
        }
        paths.sort();

        Ok(paths
            .into_iter()
            .filter_map(|path| {
                let name = path.file_stem()?.to_string_lossy().into_owned();
                Some(Unit {
                    name,
                    document_path: path,
                })
            })
            .collect())
    }
}

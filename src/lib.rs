//! buweld - Butane config assembly engine
//!
//! This crate merges a base Butane config, named overlay configs, and
//! scanned file trees into one coherent document, then delegates the
//! translation into Ignition JSON to the external `butane` binary.

pub mod assembly;
pub mod config;
pub mod document;
pub mod overlay;
pub mod pattern;
pub mod translator;
pub mod tree;

pub use assembly::{Assembler, AssemblyError};
pub use config::{Config, ConfigurationError, Overrides};
pub use document::{deep_merge, Document};
pub use pattern::PathPattern;
pub use translator::Translator;
pub use tree::{Entry, EntryKind, Scanner};

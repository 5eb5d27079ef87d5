//! Core dependency graph engine for phpack.
//!
//! The pipeline: the [`analyzer`] turns one file into symbols and typed
//! dependency edges persisted in the [`store`]; the [`resolver`] drives
//! analysis to a fixpoint, binding symbolic edges to files through the
//! [`autoload`] engine and the literal-include rules in [`paths`]; the
//! [`order`] module walks the committed graph into a cycle-tolerant load
//! order for the emitter boundary.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

pub mod analyzer;
pub mod autoload;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod ingest;
pub mod order;
pub mod paths;
pub mod resolver;
pub mod runtime;
pub mod store;

pub use analyzer::{AnalyzeOptions, AnalyzeOutcome, FileAnalyzer};
pub use autoload::AutoloadEngine;
pub use config::{AutoloadSection, OptimizationSection, PackConfig};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::{AnalyzeError, ConfigError, CoreError, StoreError};
pub use order::{load_order, ArtifactEmitter, LoadPlan, PlannedFile};
pub use paths::PathResolver;
pub use resolver::{DependencyResolver, ResolutionStats};
pub use runtime::{PhpRuntime, RuntimeIndex};
pub use store::{EdgeKind, EdgeRow, FileKind, FileRow, RuleKind, Store, SymbolKind};

/// Abstraction for file system access so the engine can run against an
/// in-memory tree in tests.
pub trait FileProvider {
    fn read_file(&self, path: &Path) -> Result<String, FileProviderError>;

    fn exists(&self, path: &Path) -> bool;

    fn is_directory(&self, path: &Path) -> bool;

    fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>, FileProviderError>;
}

impl<T: FileProvider + ?Sized> FileProvider for &T {
    fn read_file(&self, path: &Path) -> Result<String, FileProviderError> {
        (**self).read_file(path)
    }

    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }

    fn is_directory(&self, path: &Path) -> bool {
        (**self).is_directory(path)
    }

    fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>, FileProviderError> {
        (**self).list_directory(path)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum FileProviderError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("io error: {0}")]
    Io(String),
}

/// [`FileProvider`] backed by the real file system.
#[derive(Debug, Default)]
pub struct NativeFileProvider;

impl NativeFileProvider {
    pub fn new() -> Self {
        Self
    }
}

impl FileProvider for NativeFileProvider {
    fn read_file(&self, path: &Path) -> Result<String, FileProviderError> {
        std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FileProviderError::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => {
                FileProviderError::PermissionDenied(path.to_path_buf())
            }
            _ => FileProviderError::Io(e.to_string()),
        })
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_directory(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>, FileProviderError> {
        let entries = std::fs::read_dir(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FileProviderError::NotFound(path.to_path_buf()),
            _ => FileProviderError::Io(e.to_string()),
        })?;
        let mut out = Vec::new();
        for entry in entries {
            match entry {
                Ok(e) => out.push(e.path()),
                Err(e) => return Err(FileProviderError::Io(e.to_string())),
            }
        }
        out.sort();
        Ok(out)
    }
}

/// In-memory [`FileProvider`] for tests: absolute paths mapped to file
/// contents; directories are implied by their children.
#[derive(Debug, Default)]
pub struct InMemoryFileProvider {
    files: RwLock<HashMap<PathBuf, String>>,
}

impl InMemoryFileProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.files
            .write()
            .expect("file map lock")
            .insert(path.into(), content.into());
    }
}

impl FileProvider for InMemoryFileProvider {
    fn read_file(&self, path: &Path) -> Result<String, FileProviderError> {
        self.files
            .read()
            .expect("file map lock")
            .get(path)
            .cloned()
            .ok_or_else(|| FileProviderError::NotFound(path.to_path_buf()))
    }

    fn exists(&self, path: &Path) -> bool {
        let files = self.files.read().expect("file map lock");
        files.contains_key(path) || files.keys().any(|k| k.starts_with(path))
    }

    fn is_directory(&self, path: &Path) -> bool {
        let files = self.files.read().expect("file map lock");
        !files.contains_key(path) && files.keys().any(|k| k.starts_with(path))
    }

    fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>, FileProviderError> {
        let files = self.files.read().expect("file map lock");
        let mut out: Vec<PathBuf> = files
            .keys()
            .filter_map(|k| {
                let rest = k.strip_prefix(path).ok()?;
                let first = rest.components().next()?;
                Some(path.join(first))
            })
            .collect();
        out.sort();
        out.dedup();
        Ok(out)
    }
}

//! Error taxonomy for the engine.
//!
//! Fatal: [`ConfigError`], [`StoreError`] (including ambiguous symbols).
//! Non-fatal, accumulated as [`crate::Diagnostics`]: parse failures,
//! unresolved symbols/includes, hierarchy cycles.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Analyze(#[from] AnalyzeError),

    #[error("no entry file registered in the store")]
    NoEntry,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read configuration {path}: {message}")]
    Unreadable { path: PathBuf, message: String },

    #[error("malformed configuration {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("invalid glob pattern {pattern}: {source}")]
    BadPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store failure: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("store io failure: {0}")]
    Io(#[from] std::io::Error),

    /// Two distinct files both define the requested FQN; the program is
    /// not resolvable and the pipeline aborts.
    #[error("ambiguous symbol {fqn}: defined by both {first} and {second}")]
    AmbiguousSymbol {
        fqn: String,
        first: String,
        second: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    #[error("not a PHP source file: {0}")]
    NotPhp(PathBuf),

    #[error("excluded from analysis: {0}")]
    Excluded(PathBuf),

    #[error("cannot read {path}: {message}")]
    Unreadable { path: PathBuf, message: String },

    #[error(transparent)]
    Parse(#[from] phpack_ast::ParseError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CrunchyError {
    #[error("configuration file not found: {0}")]
    #[diagnostic(help("pass --config <path> or create config.yaml in the current directory"))]
    MissingConfig(PathBuf),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse YAML config: {0}")]
    ConfigParse(String),

    #[error("no collections found in configuration file")]
    #[diagnostic(help("add a non-empty `collections:` list"))]
    NoCollections,

    #[error("invalid collection name: {0:?}")]
    InvalidCollection(String),

    #[error("invalid setting: {0}")]
    InvalidSetting(String),

    #[error("invalid archive identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("refusing unsafe file name from archive listing: {0:?}")]
    UnsafeFileName(String),

    #[error("archive request failed: {0}")]
    ArchiveHttp(String),

    #[error("archive returned status {status}: {message}")]
    ArchiveStatus { status: u16, message: String },

    #[error("unexpected archive response: {0}")]
    ArchiveResponse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("tracking ledger error: {0}")]
    Ledger(String),

    #[error("interrupted")]
    Interrupted,

    #[error("{0} fetches failed")]
    FetchFailures(u64),
}

use std::path::PathBuf;

/// Errors surfaced by document stores and configuration loading.
///
/// Index maintenance itself never fails: per-document read errors are logged
/// and swallowed so the rest of the corpus stays indexed.
#[derive(Debug, thiserror::Error)]
pub enum ExtLinksError {
    #[error("failed to read document {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("failed to enumerate documents under {root}: {reason}")]
    Enumerate { root: PathBuf, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExtLinksError>;

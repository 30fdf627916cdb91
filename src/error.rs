use std::path::PathBuf;
use tempfile::PersistError;
use thiserror::Error;

/// Top-level error type for `refold`.
///
/// Configuration and setup variants abort the run before any filesystem
/// mutation occurs. Transient I/O is never represented here — it is
/// captured as a transaction's `RETRY_LATER` state instead (see
/// [`crate::model::TransactionStatus`]). Logical per-transaction failures
/// (`CollisionAtExecError`, `StaleContentError`) are recorded on the
/// transaction and only reach this enum when they occur outside any
/// transaction context (e.g. during setup).
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to persist temporary file: {0}")]
    Persist(#[from] PersistError),

    #[error("replacement rule has an empty key after canonicalization: {find:?}")]
    EmptyKey { find: String },

    #[error("duplicate canonical key in replacement map: {canonical:?} (from {find_a:?} and {find_b:?})")]
    DuplicateKey {
        canonical: String,
        find_a: String,
        find_b: String,
    },

    #[error("cyclic mapping: replacement(s) reintroduce a find pattern: {offenders:?}")]
    CyclicMapping { offenders: Vec<String> },

    #[error("invalid mapping document: {0}")]
    InvalidMapping(String),

    #[error("scan root is not a directory: {0}")]
    ScanRootNotADirectory(PathBuf),

    #[error("journal is locked by another process: {0}")]
    JournalBusy(PathBuf),

    #[error("journal version {found} is newer than supported version {supported}")]
    JournalVersion { found: u32, supported: u32 },

    #[error("collision at execution time for {path}: destination {destination} already exists")]
    CollisionAtExec { path: PathBuf, destination: PathBuf },

    #[error("stale content at {path}:{line}: source bytes no longer match the planned edit")]
    StaleContent { path: PathBuf, line: usize },

    #[error("transaction {id} exceeded its retry budget")]
    RetryBudgetExhausted { id: String },

    #[error("invalid path: {0:?}")]
    InvalidPath(PathBuf),

    #[error("validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, Error>;

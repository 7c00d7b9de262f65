use std::path::PathBuf;

/// Cancellation is not a variant here: it is never a user-visible error, so
/// cancellable operations signal it through their own return type (an
/// `Option` or `bool` the caller already has an observer to act on) rather
/// than through this enum.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("database file is corrupt: {0}")]
    Corrupt(String),

    #[error("unsupported database version {major}.{minor}")]
    VersionMismatch { major: u8, minor: u8 },

    #[error("bad pattern: {0}")]
    BadPattern(String),

    #[error("query parse error: {0}")]
    QueryParse(String),

    #[error("out of memory")]
    OutOfMemory,

    #[error("name too long: {0}")]
    NameTooLong(String),
}

pub type Result<T> = std::result::Result<T, Error>;

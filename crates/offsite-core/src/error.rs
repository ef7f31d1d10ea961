use thiserror::Error;

pub type Result<T> = std::result::Result<T, OffsiteError>;

#[derive(Debug, Error)]
pub enum OffsiteError {
    #[error("index storage error: {0}")]
    Index(#[from] rusqlite::Error),

    #[error("a record for digest {0} already exists")]
    DigestConflict(String),

    #[error("no index record with id {0}")]
    RecordNotFound(i64),

    #[error("entropy source unavailable: {0}")]
    Entropy(String),

    #[error("remote object '{0}' already exists")]
    PreconditionFailed(String),

    #[error("remote transport error: {0}")]
    Remote(String),

    #[error("source tree cannot be enumerated: {0}")]
    Walk(String),

    #[error("decryption failed: wrong key or corrupted data")]
    DecryptionFailed,

    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

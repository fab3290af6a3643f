//! Error types shared across the server.

use thiserror::Error;

/// Errors produced by the store, blob, and hashing layers.
///
/// Handlers absorb these: a failed operation is logged and the client is
/// either informed with a typed failure reply or the frame is dropped.
/// Nothing here escapes the session loop.
#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("document encoding error: {0}")]
    Bson(#[from] mongodb::bson::ser::Error),

    #[error("document decoding error: {0}")]
    BsonDecode(#[from] mongodb::bson::de::Error),

    #[error("blob io error: {0}")]
    BlobIo(#[from] std::io::Error),

    #[error("blob not found: {0}")]
    BlobNotFound(String),

    #[error("blob too large: {size} bytes (max {max})")]
    BlobTooLarge { size: usize, max: usize },

    #[error("invalid blob key: {0}")]
    InvalidBlobKey(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("json encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("id allocation exhausted after {0} attempts")]
    IdAllocation(u32),
}

#[derive(Debug, thiserror::Error)]
pub enum BinderError {
    #[error("Pool not found for set '{0}'")]
    PoolNotFound(String),

    #[error("Pool for set '{set_id}' is corrupt: {reason}")]
    PoolCorrupt { set_id: String, reason: String },

    #[error("Invalid pack config: {0}")]
    InvalidConfig(String),

    #[error(
        "Not enough '{bucket}' cards in set '{set_id}': requested {requested}, available {available}"
    )]
    InsufficientPool {
        set_id: String,
        bucket: String,
        requested: usize,
        available: usize,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Binder update was not applied: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BinderError>;

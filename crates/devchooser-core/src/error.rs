#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid device index: {raw:?}")]
    InvalidIndex { raw: String },

    #[error("manifest serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

use thiserror::Error;

/// Errors produced by the client-side parts of the core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Reading or writing the persisted draft overlay failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted draft overlay is not valid JSON.
    #[error("Draft file is corrupt: {0}")]
    Json(#[from] serde_json::Error),

    /// An action needs an open conversation and none is selected.
    #[error("No chat room currently selected")]
    NoConversation,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CoreError>;

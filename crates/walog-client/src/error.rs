use thiserror::Error;
use walog_core::CoreError;

/// Errors surfaced to the terminal.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Could not reach the server: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with an error body.
    #[error("Server answered {status}: {message}")]
    Api { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Could not determine application data directory")]
    NoDataDir,

    #[error("No sender id configured (use --self-id or WALOG_SELF_ID)")]
    MissingSelfId,

    #[error("Nothing to send")]
    EmptyMessage,
}

pub type Result<T> = std::result::Result<T, ClientError>;

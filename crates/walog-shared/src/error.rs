use thiserror::Error;

/// Reasons a record is refused at the store boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing body")]
    MissingBody,

    #[error("Missing timestamp")]
    MissingTimestamp,

    #[error("Missing from")]
    MissingFrom,

    #[error("Missing to")]
    MissingTo,

    #[error("Missing localId.remote")]
    MissingRemote,

    #[error("Missing mediaKey on a media message")]
    MissingMediaKey,

    #[error("Invalid file name: {0}")]
    InvalidFileName(String),
}

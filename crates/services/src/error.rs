use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomError {
    /// A required field was missing or empty after trimming.
    #[error("{0}")]
    InvalidRequest(String),
    #[error("room {0} not found")]
    RoomNotFound(String),
    #[error("file {0} not found")]
    FileNotFound(String),
}

pub type RoomResult<T> = Result<T, RoomError>;

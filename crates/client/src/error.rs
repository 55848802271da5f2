use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The account cannot cover the requested debit.
    #[error("not enough points")]
    NotEnoughPoints,
    /// A pending debit was accepted or rejected already.
    #[error("transaction has already been finalized")]
    AlreadyFinalized,
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("got response {status}: {message}")]
    Server { status: u16, message: String },
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

pub type ClientResult<T> = Result<T, ClientError>;

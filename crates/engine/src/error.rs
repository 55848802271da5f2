//! The module contains the error the engine can throw.
//!
//! The errors are:
//!
//! - [`InsufficientFunds`] thrown when a debit exceeds the available balance.
//! - [`KeyNotFound`] thrown when a flow is missing or owned by someone else.
//! - [`Conflict`] thrown when a flow has already been finalized.
//! - [`Unauthorized`] thrown when a subscription token is unknown or expired.
//!
//!  [`InsufficientFunds`]: EngineError::InsufficientFunds
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`Conflict`]: EngineError::Conflict
//!  [`Unauthorized`]: EngineError::Unauthorized
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid kind: {0}")]
    InvalidKind(String),
    #[error("Invalid field: {0}")]
    InvalidField(String),
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InsufficientFunds(a), Self::InsufficientFunds(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidKind(a), Self::InvalidKind(b)) => a == b,
            (Self::InvalidField(a), Self::InvalidField(b)) => a == b,
            (Self::InvalidCursor(a), Self::InvalidCursor(b)) => a == b,
            (Self::Unauthorized(a), Self::Unauthorized(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

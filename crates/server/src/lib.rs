use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

use api_types::ErrorBody;
pub use auth::{Authenticator, Caller, Role, StaticAuthenticator, StaticToken};
pub use notifications::{
    DEFAULT_SUBSCRIBER_CAPACITY, SubscriberRegistry, Subscription, run_dispatcher,
};
pub use server::{ServerOptions, ServerState, router, run_with_listener, spawn_with_listener};

mod auth;
mod inflow;
mod notifications;
mod outflow;
mod records;
mod server;

pub mod types {
    pub mod balance {
        pub use api_types::balance::Balance;
    }

    pub mod transaction {
        pub use api_types::transaction::{
            HistoryQuery, Transaction, TransactionHistory, TransactionState, TransactionType,
        };
    }

    pub mod inflow {
        pub use api_types::inflow::{
            CheerRequest, GiftSubRequest, ManualCreditRequest, SubscriptionRequest,
        };
    }

    pub mod outflow {
        pub use api_types::flow::FlowCreated;
        pub use api_types::outflow::OutflowRequest;
    }
}

#[derive(Debug)]
pub enum ServerError {
    Engine(EngineError),
    Unauthorized(String),
    Forbidden(String),
    Generic(String),
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::KeyNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::InsufficientFunds(_) | EngineError::Conflict(_) => StatusCode::CONFLICT,
        EngineError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        EngineError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        EngineError::InvalidAmount(_)
        | EngineError::InvalidKind(_)
        | EngineError::InvalidField(_)
        | EngineError::InvalidCursor(_) => StatusCode::BAD_REQUEST,
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ServerError::Engine(err) => (status_for_engine_error(&err), message_for_engine_error(err)),
            ServerError::Unauthorized(err) => (StatusCode::UNAUTHORIZED, err),
            ServerError::Forbidden(err) => (StatusCode::FORBIDDEN, err),
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err),
        };

        (status, Json(ErrorBody { error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

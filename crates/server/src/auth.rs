//! Caller identity.
//!
//! Credentials are verified outside this crate: an [`Authenticator`] only maps
//! a bearer token to the account it acts for and the role it holds.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use serde::{Deserialize, Serialize};

use crate::{ServerError, server::ServerState};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A user acting on their own account.
    Viewer,
    /// The channel owner; may grant points to any account.
    Broadcaster,
    /// An internal service reporting platform events for an account.
    Authority,
}

impl Role {
    /// Every role may perform viewer operations on its own account.
    pub fn satisfies(self, required: Role) -> bool {
        self == required || required == Role::Viewer
    }
}

/// An authenticated caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caller {
    pub account_id: String,
    pub role: Role,
}

impl Caller {
    pub fn require(&self, role: Role) -> Result<(), ServerError> {
        if self.role.satisfies(role) {
            Ok(())
        } else {
            Err(ServerError::Forbidden(format!("{role:?} role required")))
        }
    }
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Returns the caller a bearer token belongs to, if any.
    async fn authenticate(&self, token: &str) -> Option<Caller>;
}

/// A pre-shared token, usually read from configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticToken {
    pub token: String,
    pub account_id: String,
    pub role: Role,
}

/// Authenticator backed by a fixed token table.
#[derive(Clone, Debug, Default)]
pub struct StaticAuthenticator {
    callers: HashMap<String, Caller>,
}

impl StaticAuthenticator {
    pub fn new(tokens: impl IntoIterator<Item = StaticToken>) -> Self {
        let callers = tokens
            .into_iter()
            .map(|entry| {
                (
                    entry.token,
                    Caller {
                        account_id: entry.account_id,
                        role: entry.role,
                    },
                )
            })
            .collect();
        Self { callers }
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self, token: &str) -> Option<Caller> {
        self.callers.get(token).cloned()
    }
}

impl FromRequestParts<ServerState> for Caller {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ServerError::Unauthorized("missing bearer token".to_string()))?;

        state
            .authenticator
            .authenticate(bearer.token())
            .await
            .ok_or_else(|| ServerError::Unauthorized("invalid token".to_string()))
    }
}

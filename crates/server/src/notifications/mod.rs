//! Real-time notifications.
//!
//! A single dispatcher task reads the engine's change feed and fans every flow
//! change out to the live subscribers of its account. Clients first obtain a
//! short-lived token with `POST /notifications`, then open
//! `GET /notifications?token=…` as a server-sent event stream.

use std::{convert::Infallible, sync::Arc};

use api_types::notifications::SubscribeQuery;
use axum::{
    extract::{Query, State},
    http::{HeaderMap, header},
    response::sse::{Event, KeepAlive, Sse},
};
use engine::{ChangeFeedReceiver, EngineError};
use futures::{Stream, StreamExt, stream};
use tokio_util::sync::CancellationToken;

use crate::{Caller, ServerError, server::ServerState};

mod registry;

pub use registry::{DEFAULT_SUBSCRIBER_CAPACITY, SubscriberRegistry, Subscription};

/// Drains the change feed into the registry until shutdown.
pub async fn run_dispatcher(
    registry: Arc<SubscriberRegistry>,
    mut feed: ChangeFeedReceiver,
    shutdown: CancellationToken,
) {
    tracing::info!("notification dispatcher started");
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            change = feed.recv() => {
                let delivered = registry.dispatch(&change);
                tracing::trace!(flow_id = %change.id, delivered, "flow change dispatched");
            }
        }
    }
    tracing::info!("notification dispatcher stopped");
}

/// Handle requests for a notification token
pub async fn issue_token(
    caller: Caller,
    State(state): State<ServerState>,
) -> Result<String, ServerError> {
    let token = state
        .engine
        .issue_subscription_token(&caller.account_id)
        .await?;
    Ok(token)
}

/// Handle requests for the notification stream
pub async fn subscribe(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Query(query): Query<SubscribeQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ServerError> {
    if let Some(accept) = headers.get(header::ACCEPT) {
        match accept.to_str() {
            Ok(accept) if accepts_event_stream(accept) => {}
            Ok(accept) => {
                return Err(ServerError::Generic(format!(
                    "content-type {accept} is not supported"
                )));
            }
            Err(_) => {
                return Err(ServerError::Generic("invalid accept header".to_string()));
            }
        }
    }
    let Some(token) = query.token.filter(|token| !token.is_empty()) else {
        return Err(ServerError::Unauthorized(
            "'token' URL parameter must be set".to_string(),
        ));
    };
    let account_id = state
        .engine
        .resolve_subscription_token(&token)
        .await
        .map_err(|err| match err {
            EngineError::Unauthorized(_) => ServerError::Unauthorized("invalid token".to_string()),
            other => ServerError::Engine(other),
        })?;

    let subscription = state.registry.subscribe(&account_id);
    tracing::info!(%account_id, subscriber_id = subscription.id(), "notification stream opened");

    Ok(Sse::new(event_stream(subscription, state.shutdown.clone()))
        .keep_alive(KeepAlive::new().interval(state.keep_alive)))
}

/// An explicit `Accept` must allow `text/event-stream`.
fn accepts_event_stream(accept: &str) -> bool {
    accept.is_empty() || accept == "*/*" || accept.starts_with("text/event-stream")
}

/// An empty comment first, so clients see the stream is open, then one
/// `data:` frame per transaction until the subscriber or the server goes away.
fn event_stream(
    subscription: Subscription,
    shutdown: CancellationToken,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let opened = stream::once(async { Ok(Event::default().comment("")) });
    let events = stream::unfold(
        (subscription, shutdown),
        |(mut subscription, shutdown)| async move {
            let transaction = tokio::select! {
                _ = shutdown.cancelled() => None,
                next = subscription.recv() => next,
            }?;
            let event = match Event::default().json_data(&transaction) {
                Ok(event) => event,
                Err(err) => {
                    tracing::error!(flow_id = %transaction.id, "cannot encode notification: {err}");
                    return None;
                }
            };
            Some((Ok(event), (subscription, shutdown)))
        },
    );
    opened.chain(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_stream_accept_values() {
        assert!(accepts_event_stream(""));
        assert!(accepts_event_stream("*/*"));
        assert!(accepts_event_stream("text/event-stream"));
        assert!(accepts_event_stream("text/event-stream; charset=utf-8"));
        assert!(!accepts_event_stream("application/json"));
        assert!(!accepts_event_stream("text/html, */*"));
    }
}

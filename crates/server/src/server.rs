use axum::{
    Router,
    routing::{get, patch, post},
};
use engine::{ChangeFeedReceiver, Engine};
use tokio_util::sync::CancellationToken;

use std::{sync::Arc, time::Duration};

use crate::{
    Authenticator, inflow,
    notifications::{self, DEFAULT_SUBSCRIBER_CAPACITY, SubscriberRegistry},
    outflow, records,
};

/// Tunables of the HTTP surface.
#[derive(Clone, Debug)]
pub struct ServerOptions {
    /// Queue length of each notification subscriber.
    pub subscriber_capacity: usize,
    /// Idle interval after which a keep-alive comment is sent on open streams.
    pub keep_alive: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
            keep_alive: Duration::from_secs(30),
        }
    }
}

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
    pub registry: Arc<SubscriberRegistry>,
    pub authenticator: Arc<dyn Authenticator>,
    /// Cancelled when the server shuts down; ends every open stream.
    pub shutdown: CancellationToken,
    pub keep_alive: Duration,
}

impl ServerState {
    pub fn new(
        engine: Engine,
        authenticator: Arc<dyn Authenticator>,
        options: &ServerOptions,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            engine: Arc::new(engine),
            registry: Arc::new(SubscriberRegistry::new(options.subscriber_capacity)),
            authenticator,
            shutdown,
            keep_alive: options.keep_alive,
        }
    }
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/balance", get(records::balance))
        .route("/history", get(records::history))
        .route("/inflow/manual-credit", post(inflow::manual_credit))
        .route("/inflow/cheer", post(inflow::cheer))
        .route("/inflow/subscription", post(inflow::subscription))
        .route("/inflow/gift-sub", post(inflow::gift_sub))
        .route("/outflow", post(outflow::reserve))
        .route(
            "/outflow/{id}",
            patch(outflow::accept).delete(outflow::reject),
        )
        .route(
            "/notifications",
            post(notifications::issue_token).get(notifications::subscribe),
        )
        .with_state(state)
}

/// Serves the ledger on `listener` until `shutdown` is cancelled.
///
/// The notification dispatcher runs for as long as the server does.
pub async fn run_with_listener(
    engine: Engine,
    feed: ChangeFeedReceiver,
    authenticator: Arc<dyn Authenticator>,
    options: ServerOptions,
    listener: tokio::net::TcpListener,
    shutdown: CancellationToken,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let state = ServerState::new(engine, authenticator, &options, shutdown.clone());
    let dispatcher = tokio::spawn(notifications::run_dispatcher(
        Arc::clone(&state.registry),
        feed,
        shutdown.clone(),
    ));

    let graceful = shutdown.clone();
    let result = axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { graceful.cancelled().await })
        .await;

    shutdown.cancel();
    if let Err(err) = dispatcher.await {
        tracing::error!("notification dispatcher failed: {err}");
    }
    tracing::info!("Server stopped");
    result
}

pub fn spawn_with_listener(
    engine: Engine,
    feed: ChangeFeedReceiver,
    authenticator: Arc<dyn Authenticator>,
    options: ServerOptions,
    listener: tokio::net::TcpListener,
    shutdown: CancellationToken,
) -> Result<std::net::SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) =
            run_with_listener(engine, feed, authenticator, options, listener, shutdown).await
        {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}

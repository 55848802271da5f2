use chrono::Duration;
use sea_orm::DatabaseConnection;
use tokio::sync::watch;

use crate::{
    ChangeFeedReceiver, ResultEngine,
    change_feed::{self, DEFAULT_FEED_POLL_INTERVAL},
};

mod balances;
mod history;
mod inflows;
mod outflows;
mod tokens;

pub use history::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use inflows::SubscriptionCredit;
pub use tokens::DEFAULT_TOKEN_TTL;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    feed_wake: watch::Sender<u64>,
    feed_poll_interval: std::time::Duration,
    token_ttl: Duration,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Opens a receiver that yields every flow change committed from now on,
    /// by this engine or by any other writer of the same database.
    pub async fn change_feed(&self) -> ResultEngine<ChangeFeedReceiver> {
        let last_seq = change_feed::last_seq(&self.database).await?;
        Ok(ChangeFeedReceiver::new(
            self.database.clone(),
            self.feed_wake.subscribe(),
            self.feed_poll_interval,
            last_seq,
        ))
    }

    /// Wakes local feed receivers after a commit that recorded a change.
    fn wake_feed(&self) {
        self.feed_wake.send_modify(|count| *count = count.wrapping_add(1));
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    feed_poll_interval: Option<std::time::Duration>,
    token_ttl: Option<Duration>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// How often an idle change feed polls the store for changes written by
    /// other processes (defaults to one second).
    pub fn feed_poll_interval(mut self, interval: std::time::Duration) -> EngineBuilder {
        self.feed_poll_interval = Some(interval);
        self
    }

    /// Lifetime of subscription tokens (defaults to [`DEFAULT_TOKEN_TTL`]).
    pub fn token_ttl(mut self, ttl: Duration) -> EngineBuilder {
        self.token_ttl = Some(ttl);
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> crate::ResultEngine<Engine> {
        let (feed_wake, _) = watch::channel(0);
        Ok(Engine {
            database: self.database,
            feed_wake,
            feed_poll_interval: self
                .feed_poll_interval
                .unwrap_or(DEFAULT_FEED_POLL_INTERVAL),
            token_ttl: self.token_ttl.unwrap_or(DEFAULT_TOKEN_TTL),
        })
    }
}

//! Flow change feed.
//!
//! Every flow insert and every finalizing update writes a row to the
//! `flow_changes` table in the same transaction as the flow itself, so a
//! change exists exactly when its flow write commits. The sequence number is
//! assigned inside the write transaction and SQLite serializes writers, so
//! sequence order is commit order.
//!
//! A [`ChangeFeedReceiver`] reads the table in sequence order. Writers in the
//! same process wake it at once; writes from other processes (the admin CLI,
//! another server) are picked up on the next poll.

use std::{collections::VecDeque, time::Duration};

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, ConnectionTrait, DatabaseConnection, QueryOrder, QuerySelect, entity::prelude::*,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use uuid::Uuid;

use crate::{EngineError, Flow, ResultEngine};

/// Default interval between two polls of an idle feed.
pub const DEFAULT_FEED_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Rows read per poll.
const FETCH_BATCH: u64 = 100;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlowChange {
    pub account_id: String,
    pub id: Uuid,
    /// Raw kind as stored; validated by consumers.
    pub kind: String,
    pub metadata: Value,
    pub delta_points: i64,
    pub created_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
    pub accepted: bool,
}

impl From<&Flow> for FlowChange {
    fn from(flow: &Flow) -> Self {
        Self {
            account_id: flow.account_id.clone(),
            id: flow.id,
            kind: flow.kind.as_str().to_string(),
            metadata: flow.metadata.clone(),
            delta_points: flow.delta_points,
            created_at: flow.created_at,
            finalized_at: flow.finalized_at,
            accepted: flow.accepted,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "flow_changes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub seq: i64,
    pub flow_id: String,
    pub account_id: String,
    /// [`FlowChange`] encoded as JSON.
    pub payload: String,
    pub recorded_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Appends the current state of `flow` to the feed. Call it on the
/// transaction that writes the flow.
pub(crate) async fn record<C: ConnectionTrait>(db: &C, flow: &Flow) -> ResultEngine<()> {
    let payload = serde_json::to_string(&FlowChange::from(flow))
        .map_err(|err| EngineError::InvalidField(format!("invalid flow change: {err}")))?;
    ActiveModel {
        seq: ActiveValue::NotSet,
        flow_id: ActiveValue::Set(flow.id.to_string()),
        account_id: ActiveValue::Set(flow.account_id.clone()),
        payload: ActiveValue::Set(payload),
        recorded_at: ActiveValue::Set(Utc::now()),
    }
    .insert(db)
    .await?;
    Ok(())
}

/// Reads committed flow changes in commit order.
#[derive(Debug)]
pub struct ChangeFeedReceiver {
    database: DatabaseConnection,
    wake: watch::Receiver<u64>,
    poll_interval: Duration,
    last_seq: i64,
    pending: VecDeque<FlowChange>,
}

impl ChangeFeedReceiver {
    pub(crate) fn new(
        database: DatabaseConnection,
        wake: watch::Receiver<u64>,
        poll_interval: Duration,
        last_seq: i64,
    ) -> Self {
        Self {
            database,
            wake,
            poll_interval,
            last_seq,
            pending: VecDeque::new(),
        }
    }

    /// Sequence number of the last change read from the store.
    pub fn position(&self) -> i64 {
        self.last_seq
    }

    /// Waits for the next change. Store errors are logged and retried after
    /// the poll interval.
    pub async fn recv(&mut self) -> FlowChange {
        loop {
            if let Some(change) = self.pending.pop_front() {
                return change;
            }
            match self.fetch().await {
                Ok(0) => self.idle().await,
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!("cannot read change feed: {err}");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// Returns a change that is already committed, without waiting.
    pub async fn try_recv(&mut self) -> ResultEngine<Option<FlowChange>> {
        if self.pending.is_empty() {
            self.fetch().await?;
        }
        Ok(self.pending.pop_front())
    }

    async fn idle(&mut self) {
        tokio::select! {
            woken = self.wake.changed() => {
                // The engine that owned the sender is gone; keep polling.
                if woken.is_err() {
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
            _ = tokio::time::sleep(self.poll_interval) => {}
        }
    }

    /// Loads the next batch of rows and returns how many were read.
    async fn fetch(&mut self) -> ResultEngine<usize> {
        let rows = Entity::find()
            .filter(Column::Seq.gt(self.last_seq))
            .order_by_asc(Column::Seq)
            .limit(FETCH_BATCH)
            .all(&self.database)
            .await?;

        let read = rows.len();
        for row in rows {
            self.last_seq = row.seq;
            match serde_json::from_str::<FlowChange>(&row.payload) {
                Ok(change) => self.pending.push_back(change),
                Err(err) => {
                    tracing::warn!(seq = row.seq, flow_id = %row.flow_id, "skipping unreadable flow change: {err}");
                }
            }
        }
        Ok(read)
    }
}

/// Highest sequence number in the store, `0` when empty.
pub(crate) async fn last_seq(db: &DatabaseConnection) -> ResultEngine<i64> {
    let last = Entity::find()
        .order_by_desc(Column::Seq)
        .one(db)
        .await?
        .map_or(0, |row| row.seq);
    Ok(last)
}

//! Human-facing transaction records derived from flows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Flow, FlowChange, FlowKind, FlowState, metadata};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    /// `finalized_at` once finalized, `created_at` while pending.
    pub timestamp: DateTime<Utc>,
    pub kind: FlowKind,
    pub state: FlowState,
    pub delta_points: i64,
    pub description: String,
}

impl From<&Flow> for TransactionRecord {
    fn from(flow: &Flow) -> Self {
        Self {
            id: flow.id,
            timestamp: flow.finalized_at.unwrap_or(flow.created_at),
            kind: flow.kind,
            state: flow.state(),
            delta_points: flow.delta_points,
            description: metadata::describe(flow.kind, &flow.metadata),
        }
    }
}

impl TryFrom<&FlowChange> for TransactionRecord {
    type Error = EngineError;

    fn try_from(change: &FlowChange) -> Result<Self, Self::Error> {
        let kind = FlowKind::try_from(change.kind.as_str())?;
        Ok(Self {
            id: change.id,
            timestamp: change.finalized_at.unwrap_or(change.created_at),
            kind,
            state: FlowState::from_parts(change.finalized_at, change.accepted),
            delta_points: change.delta_points,
            description: metadata::describe(kind, &change.metadata),
        })
    }
}

/// One page of history, newest first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HistoryPage {
    pub items: Vec<TransactionRecord>,
    /// Id of the first record of the next page, if any.
    pub next_cursor: Option<Uuid>,
}

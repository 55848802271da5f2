//! Balance and history endpoints

use api_types::{
    balance::Balance,
    transaction::{
        HistoryQuery, Transaction, TransactionHistory, TransactionState, TransactionType,
    },
};
use axum::{
    Json,
    extract::{Query, State},
};
use engine::{FlowKind, FlowState, TransactionRecord};

use crate::{Caller, ServerError, server::ServerState};

fn map_kind(kind: FlowKind) -> TransactionType {
    match kind {
        FlowKind::ManualCredit => TransactionType::ManualCredit,
        FlowKind::Cheer => TransactionType::Cheer,
        FlowKind::Subscription => TransactionType::Subscription,
        FlowKind::GiftSub => TransactionType::GiftSub,
        FlowKind::AlertRedemption => TransactionType::AlertRedemption,
    }
}

fn map_state(state: FlowState) -> TransactionState {
    match state {
        FlowState::Pending => TransactionState::Pending,
        FlowState::Accepted => TransactionState::Accepted,
        FlowState::Rejected => TransactionState::Rejected,
    }
}

pub(crate) fn to_transaction(record: TransactionRecord) -> Transaction {
    Transaction {
        id: record.id,
        timestamp: record.timestamp,
        transaction_type: map_kind(record.kind),
        state: map_state(record.state),
        delta_points: record.delta_points,
        description: record.description,
    }
}

/// Handle requests for the caller's balance
pub async fn balance(
    caller: Caller,
    State(state): State<ServerState>,
) -> Result<Json<Balance>, ServerError> {
    let balance = state.engine.balance(&caller.account_id).await?;
    Ok(Json(Balance {
        total_points: balance.total,
        available_points: balance.available,
    }))
}

/// Handle requests for one page of the caller's history
pub async fn history(
    caller: Caller,
    State(state): State<ServerState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<TransactionHistory>, ServerError> {
    let page = state
        .engine
        .history(&caller.account_id, query.from.as_deref(), query.max)
        .await?;

    Ok(Json(TransactionHistory {
        items: page.items.into_iter().map(to_transaction).collect(),
        next_cursor: page.next_cursor,
    }))
}

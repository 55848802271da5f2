//! Outflow API endpoints: reserve, then accept or reject.

use api_types::{flow::FlowCreated, outflow::OutflowRequest};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{Caller, ServerError, server::ServerState};

pub async fn reserve(
    caller: Caller,
    State(state): State<ServerState>,
    Json(payload): Json<OutflowRequest>,
) -> Result<(StatusCode, Json<FlowCreated>), ServerError> {
    let flow_id = match payload {
        OutflowRequest::AlertRedemption {
            num_points_to_debit,
            alert_type,
            alert_metadata,
        } => {
            state
                .engine
                .reserve_alert_redemption(
                    &caller.account_id,
                    num_points_to_debit,
                    &alert_type,
                    alert_metadata,
                )
                .await?
        }
    };
    Ok((StatusCode::CREATED, Json(FlowCreated { flow_id })))
}

pub async fn accept(
    caller: Caller,
    State(state): State<ServerState>,
    Path(flow_id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .finalize_debit(flow_id, &caller.account_id, true)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reject(
    caller: Caller,
    State(state): State<ServerState>,
    Path(flow_id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .finalize_debit(flow_id, &caller.account_id, false)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

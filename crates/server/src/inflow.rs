//! Inflow API endpoints
//!
//! Manual credits are granted by the broadcaster to any account. Every other
//! inflow is reported by an authority for the account it acts for.

use api_types::{
    flow::FlowCreated,
    inflow::{CheerRequest, GiftSubRequest, ManualCreditRequest, SubscriptionRequest},
};
use axum::{Json, extract::State, http::StatusCode};
use engine::SubscriptionCredit;

use crate::{Caller, Role, ServerError, server::ServerState};

type Created = (StatusCode, Json<FlowCreated>);

fn created(flow_id: uuid::Uuid) -> Created {
    (StatusCode::CREATED, Json(FlowCreated { flow_id }))
}

pub async fn manual_credit(
    caller: Caller,
    State(state): State<ServerState>,
    Json(payload): Json<ManualCreditRequest>,
) -> Result<Created, ServerError> {
    caller.require(Role::Broadcaster)?;
    let flow_id = state
        .engine
        .record_manual_credit(
            &payload.account_id,
            payload.num_points_to_credit,
            &payload.note,
        )
        .await?;
    Ok(created(flow_id))
}

pub async fn cheer(
    caller: Caller,
    State(state): State<ServerState>,
    Json(payload): Json<CheerRequest>,
) -> Result<Created, ServerError> {
    caller.require(Role::Authority)?;
    let flow_id = state
        .engine
        .record_cheer(
            &caller.account_id,
            payload.num_points_to_credit,
            payload.message.as_deref(),
        )
        .await?;
    Ok(created(flow_id))
}

pub async fn subscription(
    caller: Caller,
    State(state): State<ServerState>,
    Json(payload): Json<SubscriptionRequest>,
) -> Result<Created, ServerError> {
    caller.require(Role::Authority)?;
    let flow_id = state
        .engine
        .record_subscription(
            &caller.account_id,
            SubscriptionCredit {
                base_points: payload.base_points_to_credit,
                is_initial: payload.is_initial,
                is_gift: payload.is_gift,
                message: payload.message,
                credit_multiplier: payload.credit_multiplier,
            },
        )
        .await?;
    Ok(created(flow_id))
}

pub async fn gift_sub(
    caller: Caller,
    State(state): State<ServerState>,
    Json(payload): Json<GiftSubRequest>,
) -> Result<Created, ServerError> {
    caller.require(Role::Authority)?;
    let flow_id = state
        .engine
        .record_gift_sub(
            &caller.account_id,
            payload.base_points_to_credit,
            payload.num_subscriptions,
            payload.credit_multiplier,
        )
        .await?;
    Ok(created(flow_id))
}

//! Wire types shared by the ledger server and its clients.
//!
//! Every JSON body uses camelCase field names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Error body returned by every failing endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

pub mod balance {
    use super::*;

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Balance {
        /// Accepted flows plus credits still pending.
        pub total_points: i64,
        /// Accepted flows minus debits still pending: what can be spent now.
        pub available_points: i64,
    }
}

pub mod transaction {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "kebab-case")]
    pub enum TransactionType {
        ManualCredit,
        Cheer,
        Subscription,
        GiftSub,
        AlertRedemption,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum TransactionState {
        Pending,
        Accepted,
        Rejected,
    }

    /// One entry of a history page or one notification event.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Transaction {
        pub id: Uuid,
        /// Finalization time, or creation time while pending.
        pub timestamp: DateTime<Utc>,
        #[serde(rename = "type")]
        pub transaction_type: TransactionType,
        pub state: TransactionState,
        pub delta_points: i64,
        pub description: String,
    }

    #[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct TransactionHistory {
        pub items: Vec<Transaction>,
        /// Pass as `from` to fetch the next (older) page.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub next_cursor: Option<Uuid>,
    }

    /// Query string of `GET /history`.
    #[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct HistoryQuery {
        /// Page size, clamped server-side to `1..=100`.
        pub max: Option<u64>,
        /// Cursor from a previous page.
        pub from: Option<String>,
    }
}

pub mod inflow {
    use super::*;

    fn default_multiplier() -> f64 {
        1.0
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ManualCreditRequest {
        pub account_id: String,
        pub num_points_to_credit: i64,
        pub note: String,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CheerRequest {
        pub num_points_to_credit: i64,
        #[serde(default)]
        pub message: Option<String>,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SubscriptionRequest {
        pub base_points_to_credit: i64,
        #[serde(default)]
        pub is_initial: bool,
        #[serde(default)]
        pub is_gift: bool,
        #[serde(default)]
        pub message: Option<String>,
        #[serde(default = "default_multiplier")]
        pub credit_multiplier: f64,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GiftSubRequest {
        pub base_points_to_credit: i64,
        pub num_subscriptions: i64,
        #[serde(default = "default_multiplier")]
        pub credit_multiplier: f64,
    }
}

pub mod outflow {
    use super::*;

    /// Body of `POST /outflow`, discriminated by `type`.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
    pub enum OutflowRequest {
        AlertRedemption {
            num_points_to_debit: i64,
            alert_type: String,
            #[serde(default, skip_serializing_if = "Option::is_none")]
            alert_metadata: Option<Value>,
        },
    }
}

pub mod flow {
    use super::*;

    /// Returned by every endpoint that records a flow.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct FlowCreated {
        pub flow_id: Uuid,
    }
}

pub mod notifications {
    use super::*;

    /// Query string of `GET /notifications`.
    #[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct SubscribeQuery {
        pub token: Option<String>,
    }
}

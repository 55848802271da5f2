//! Flow primitives.
//!
//! A `Flow` is a single signed change of points against one account. Credits
//! are recorded already finalized and accepted; debits are recorded pending and
//! settled later by exactly one finalization.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlowKind {
    ManualCredit,
    Cheer,
    Subscription,
    GiftSub,
    AlertRedemption,
}

impl FlowKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ManualCredit => "manual-credit",
            Self::Cheer => "cheer",
            Self::Subscription => "subscription",
            Self::GiftSub => "gift-sub",
            Self::AlertRedemption => "alert-redemption",
        }
    }

    /// Returns `true` for kinds that add points (inflows).
    pub fn is_credit(self) -> bool {
        !matches!(self, Self::AlertRedemption)
    }
}

impl TryFrom<&str> for FlowKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "manual-credit" => Ok(Self::ManualCredit),
            "cheer" => Ok(Self::Cheer),
            "subscription" => Ok(Self::Subscription),
            "gift-sub" => Ok(Self::GiftSub),
            "alert-redemption" => Ok(Self::AlertRedemption),
            other => Err(EngineError::InvalidKind(format!("unknown flow kind: {other}"))),
        }
    }
}

/// Display state of a flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    Pending,
    Accepted,
    Rejected,
}

impl FlowState {
    /// Derives the state from the finalization columns. `accepted` is ignored
    /// while the flow is pending.
    pub fn from_parts(finalized_at: Option<DateTime<Utc>>, accepted: bool) -> Self {
        match (finalized_at, accepted) {
            (None, _) => Self::Pending,
            (Some(_), true) => Self::Accepted,
            (Some(_), false) => Self::Rejected,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub id: Uuid,
    pub kind: FlowKind,
    pub account_id: String,
    pub delta_points: i64,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
    pub accepted: bool,
}

impl Flow {
    /// Builds a credit that takes effect immediately.
    pub fn credit(
        account_id: &str,
        kind: FlowKind,
        points: i64,
        metadata: Value,
    ) -> ResultEngine<Self> {
        if !kind.is_credit() {
            return Err(EngineError::InvalidKind(format!(
                "{} is not a credit kind",
                kind.as_str()
            )));
        }
        let account_id = require_account(account_id)?;
        require_positive(points, "points to credit")?;

        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(),
            kind,
            account_id,
            delta_points: points,
            metadata,
            created_at: now,
            finalized_at: Some(now),
            accepted: true,
        })
    }

    /// Builds a debit reservation: pending, with a negative delta.
    pub fn pending_debit(
        account_id: &str,
        kind: FlowKind,
        points: i64,
        metadata: Value,
    ) -> ResultEngine<Self> {
        if kind.is_credit() {
            return Err(EngineError::InvalidKind(format!(
                "{} is not a debit kind",
                kind.as_str()
            )));
        }
        let account_id = require_account(account_id)?;
        require_positive(points, "points to debit")?;

        Ok(Self {
            id: Uuid::now_v7(),
            kind,
            account_id,
            delta_points: -points,
            metadata,
            created_at: Utc::now(),
            finalized_at: None,
            accepted: false,
        })
    }

    pub fn is_pending(&self) -> bool {
        self.finalized_at.is_none()
    }

    pub fn state(&self) -> FlowState {
        FlowState::from_parts(self.finalized_at, self.accepted)
    }
}

fn require_account(account_id: &str) -> ResultEngine<String> {
    let trimmed = account_id.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidField(
            "account id must not be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

fn require_positive(points: i64, label: &str) -> ResultEngine<()> {
    if points <= 0 {
        return Err(EngineError::InvalidAmount(format!("{label} must be > 0")));
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "flows")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub kind: String,
    pub account_id: String,
    pub delta_points: i64,
    pub metadata: String,
    pub created_at: DateTimeUtc,
    pub finalized_at: Option<DateTimeUtc>,
    pub accepted: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Flow> for ActiveModel {
    fn from(flow: &Flow) -> Self {
        Self {
            id: ActiveValue::Set(flow.id.to_string()),
            kind: ActiveValue::Set(flow.kind.as_str().to_string()),
            account_id: ActiveValue::Set(flow.account_id.clone()),
            delta_points: ActiveValue::Set(flow.delta_points),
            metadata: ActiveValue::Set(flow.metadata.to_string()),
            created_at: ActiveValue::Set(flow.created_at),
            finalized_at: ActiveValue::Set(flow.finalized_at),
            accepted: ActiveValue::Set(flow.accepted),
        }
    }
}

impl TryFrom<Model> for Flow {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let metadata = serde_json::from_str(&model.metadata).unwrap_or_else(|err| {
            tracing::warn!(flow_id = %model.id, "unreadable flow metadata: {err}");
            Value::Null
        });
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::KeyNotFound("flow not exists".to_string()))?,
            kind: FlowKind::try_from(model.kind.as_str())?,
            account_id: model.account_id,
            delta_points: model.delta_points,
            metadata,
            created_at: model.created_at,
            finalized_at: model.finalized_at,
            accepted: model.accepted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn credit_is_created_finalized_and_accepted() {
        let flow = Flow::credit("1001", FlowKind::Cheer, 400, json!({})).unwrap();
        assert_eq!(flow.delta_points, 400);
        assert!(!flow.is_pending());
        assert_eq!(flow.state(), FlowState::Accepted);
        assert_eq!(flow.finalized_at, Some(flow.created_at));
    }

    #[test]
    fn debit_is_created_pending_and_negative() {
        let flow =
            Flow::pending_debit("1001", FlowKind::AlertRedemption, 250, json!({})).unwrap();
        assert_eq!(flow.delta_points, -250);
        assert!(flow.is_pending());
        assert_eq!(flow.state(), FlowState::Pending);
    }

    #[test]
    fn zero_or_negative_points_are_rejected() {
        assert!(matches!(
            Flow::credit("1001", FlowKind::ManualCredit, 0, json!({})),
            Err(EngineError::InvalidAmount(_))
        ));
        assert!(matches!(
            Flow::pending_debit("1001", FlowKind::AlertRedemption, -5, json!({})),
            Err(EngineError::InvalidAmount(_))
        ));
    }

    #[test]
    fn kind_must_match_direction() {
        assert!(matches!(
            Flow::credit("1001", FlowKind::AlertRedemption, 10, json!({})),
            Err(EngineError::InvalidKind(_))
        ));
        assert!(matches!(
            Flow::pending_debit("1001", FlowKind::GiftSub, 10, json!({})),
            Err(EngineError::InvalidKind(_))
        ));
    }

    #[test]
    fn blank_account_is_rejected() {
        assert!(matches!(
            Flow::credit("  ", FlowKind::Cheer, 10, json!({})),
            Err(EngineError::InvalidField(_))
        ));
    }

    #[test]
    fn kind_round_trips_through_storage_name() {
        for kind in [
            FlowKind::ManualCredit,
            FlowKind::Cheer,
            FlowKind::Subscription,
            FlowKind::GiftSub,
            FlowKind::AlertRedemption,
        ] {
            assert_eq!(FlowKind::try_from(kind.as_str()).unwrap(), kind);
        }
        assert!(FlowKind::try_from("refund").is_err());
    }

    #[test]
    fn state_ignores_accepted_flag_while_pending() {
        assert_eq!(FlowState::from_parts(None, true), FlowState::Pending);
        assert_eq!(
            FlowState::from_parts(Some(Utc::now()), false),
            FlowState::Rejected
        );
    }
}

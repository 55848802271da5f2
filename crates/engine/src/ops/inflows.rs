use sea_orm::{ActiveModelTrait, TransactionTrait};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    CheerMetadata, EngineError, Flow, FlowKind, GiftSubMetadata, ManualCreditMetadata,
    ResultEngine, SubscriptionMetadata, change_feed, flows,
    metadata::truncate_message,
    util::{scaled_points, validate_credit_multiplier},
};

use super::{Engine, with_tx};

/// Parameters of a subscription credit.
#[derive(Clone, Debug, PartialEq)]
pub struct SubscriptionCredit {
    pub base_points: i64,
    pub is_initial: bool,
    pub is_gift: bool,
    pub message: Option<String>,
    pub credit_multiplier: f64,
}

fn to_metadata<T: serde::Serialize>(metadata: &T) -> ResultEngine<Value> {
    serde_json::to_value(metadata)
        .map_err(|err| EngineError::InvalidField(format!("invalid metadata: {err}")))
}

impl Engine {
    /// Records a credit. Credits are final on creation: they are stored
    /// accepted and count toward both total and available balance at once.
    pub async fn create_credit(
        &self,
        account_id: &str,
        kind: FlowKind,
        points: i64,
        metadata: Value,
    ) -> ResultEngine<Uuid> {
        let flow = Flow::credit(account_id, kind, points, metadata)?;
        with_tx!(self, |db_tx| {
            flows::ActiveModel::from(&flow).insert(&db_tx).await?;
            change_feed::record(&db_tx, &flow).await
        })?;

        tracing::info!(
            flow_id = %flow.id,
            account_id = %flow.account_id,
            kind = flow.kind.as_str(),
            points,
            "credit recorded"
        );
        self.wake_feed();
        Ok(flow.id)
    }

    /// Discretionary credit granted by the broadcaster. The note is required.
    pub async fn record_manual_credit(
        &self,
        account_id: &str,
        points: i64,
        note: &str,
    ) -> ResultEngine<Uuid> {
        let note = note.trim();
        if note.is_empty() {
            return Err(EngineError::InvalidField(
                "note must be a non-empty string".to_string(),
            ));
        }
        let metadata = to_metadata(&ManualCreditMetadata {
            note: note.to_string(),
        })?;
        self.create_credit(account_id, FlowKind::ManualCredit, points, metadata)
            .await
    }

    /// Credit for a cheer. Long messages are truncated before storage.
    pub async fn record_cheer(
        &self,
        account_id: &str,
        points: i64,
        message: Option<&str>,
    ) -> ResultEngine<Uuid> {
        let metadata = to_metadata(&CheerMetadata {
            message: truncate_message(message.unwrap_or_default()),
        })?;
        self.create_credit(account_id, FlowKind::Cheer, points, metadata)
            .await
    }

    /// Credit for a new or renewed subscription, scaled by the tier multiplier.
    pub async fn record_subscription(
        &self,
        account_id: &str,
        credit: SubscriptionCredit,
    ) -> ResultEngine<Uuid> {
        if credit.base_points <= 0 {
            return Err(EngineError::InvalidAmount(
                "base points must be > 0".to_string(),
            ));
        }
        validate_credit_multiplier(credit.credit_multiplier)?;
        let points = scaled_points(credit.base_points, credit.credit_multiplier)?;

        let metadata = to_metadata(&SubscriptionMetadata {
            message: truncate_message(credit.message.as_deref().unwrap_or_default()),
            is_initial: credit.is_initial,
            is_gift: credit.is_gift,
            credit_multiplier: credit.credit_multiplier,
        })?;
        self.create_credit(account_id, FlowKind::Subscription, points, metadata)
            .await
    }

    /// Credit for gifting `num_subscriptions` subs to other viewers.
    pub async fn record_gift_sub(
        &self,
        account_id: &str,
        base_points: i64,
        num_subscriptions: i64,
        credit_multiplier: f64,
    ) -> ResultEngine<Uuid> {
        if base_points <= 0 {
            return Err(EngineError::InvalidAmount(
                "base points must be > 0".to_string(),
            ));
        }
        if num_subscriptions <= 0 {
            return Err(EngineError::InvalidAmount(
                "number of subscriptions must be > 0".to_string(),
            ));
        }
        validate_credit_multiplier(credit_multiplier)?;
        let base_total = base_points.checked_mul(num_subscriptions).ok_or_else(|| {
            EngineError::InvalidAmount("gift sub points overflow".to_string())
        })?;
        let points = scaled_points(base_total, credit_multiplier)?;

        let metadata = to_metadata(&GiftSubMetadata {
            num_subscriptions,
            credit_multiplier,
        })?;
        self.create_credit(account_id, FlowKind::GiftSub, points, metadata)
            .await
    }
}

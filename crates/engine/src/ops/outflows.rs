use chrono::Utc;
use sea_orm::{
    ActiveValue, ConnectionTrait, QueryFilter, Statement, TransactionTrait, prelude::*,
};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    AlertRedemptionMetadata, EngineError, Flow, FlowKind, ResultEngine, change_feed, flows,
    util::parse_uuid,
};

use super::{Engine, with_tx};

/// Inserts a pending debit only when the account's available balance covers it.
///
/// Check and insert are a single statement, so two concurrent reservations can
/// never both spend the same points.
const RESERVE_SQL: &str = r#"
INSERT INTO flows (id, kind, account_id, delta_points, metadata, created_at, finalized_at, accepted)
SELECT ?, ?, ?, ?, ?, ?, NULL, ?
WHERE (
    SELECT COALESCE(SUM(CASE
        WHEN finalized_at IS NULL AND delta_points < 0 THEN delta_points
        WHEN finalized_at IS NOT NULL AND accepted THEN delta_points
        ELSE 0
    END), 0)
    FROM flows
    WHERE account_id = ?
) >= ?
"#;

impl Engine {
    /// Reserves `points` from the account's available balance by recording a
    /// pending debit. The debit stays pending until [`Engine::finalize_debit`].
    ///
    /// Fails with [`EngineError::InsufficientFunds`] (and records nothing) when
    /// the available balance is lower than `points`.
    pub async fn create_debit(
        &self,
        account_id: &str,
        kind: FlowKind,
        points: i64,
        metadata: Value,
    ) -> ResultEngine<Uuid> {
        let flow = Flow::pending_debit(account_id, kind, points, metadata)?;

        let values: Vec<sea_orm::Value> = vec![
            flow.id.to_string().into(),
            flow.kind.as_str().into(),
            flow.account_id.clone().into(),
            flow.delta_points.into(),
            flow.metadata.to_string().into(),
            flow.created_at.into(),
            false.into(),
            flow.account_id.clone().into(),
            points.into(),
        ];
        let backend = self.database.get_database_backend();
        let reserved = with_tx!(self, |db_tx| {
            let result = db_tx
                .execute(Statement::from_sql_and_values(backend, RESERVE_SQL, values))
                .await?;
            if result.rows_affected() == 0 {
                Ok(false)
            } else {
                change_feed::record(&db_tx, &flow).await.map(|()| true)
            }
        })?;

        if !reserved {
            let balance = self.balance(&flow.account_id).await?;
            tracing::info!(
                account_id = %flow.account_id,
                requested = points,
                available = balance.available,
                "debit refused: not enough points"
            );
            return Err(EngineError::InsufficientFunds(format!(
                "requested {points}, available {}",
                balance.available
            )));
        }

        tracing::info!(
            flow_id = %flow.id,
            account_id = %flow.account_id,
            kind = flow.kind.as_str(),
            points,
            "debit reserved"
        );
        self.wake_feed();
        Ok(flow.id)
    }

    /// Reserves points for an alert redemption.
    pub async fn reserve_alert_redemption(
        &self,
        account_id: &str,
        points: i64,
        alert_type: &str,
        alert_metadata: Option<Value>,
    ) -> ResultEngine<Uuid> {
        let metadata = serde_json::to_value(AlertRedemptionMetadata {
            alert_type: alert_type.to_string(),
            metadata: alert_metadata,
        })
        .map_err(|err| EngineError::InvalidField(format!("invalid metadata: {err}")))?;
        self.create_debit(account_id, FlowKind::AlertRedemption, points, metadata)
            .await
    }

    /// Settles a pending flow owned by `account_id`.
    ///
    /// - Missing flows and flows owned by another account are both reported
    ///   as [`EngineError::KeyNotFound`].
    /// - Flows that are no longer pending are reported as
    ///   [`EngineError::Conflict`]; their state is left untouched.
    pub async fn finalize_debit(
        &self,
        flow_id: Uuid,
        account_id: &str,
        accept: bool,
    ) -> ResultEngine<()> {
        let flow = with_tx!(self, |db_tx| {
            let model = flows::Entity::find_by_id(flow_id.to_string())
                .one(&db_tx)
                .await?
                .filter(|model| model.account_id == account_id)
                .ok_or_else(|| EngineError::KeyNotFound("flow not exists".to_string()))?;
            if model.finalized_at.is_some() {
                return Err(EngineError::Conflict("flow is not pending".to_string()));
            }

            // Guarded by "still pending": the first finalization wins and any
            // later attempt changes nothing.
            let updated = flows::Entity::update_many()
                .set(flows::ActiveModel {
                    finalized_at: ActiveValue::Set(Some(Utc::now())),
                    accepted: ActiveValue::Set(accept),
                    ..Default::default()
                })
                .filter(flows::Column::Id.eq(flow_id.to_string()))
                .filter(flows::Column::FinalizedAt.is_null())
                .exec(&db_tx)
                .await?;
            if updated.rows_affected == 0 {
                return Err(EngineError::Conflict("flow is not pending".to_string()));
            }

            let model = flows::Entity::find_by_id(flow_id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("flow not exists".to_string()))?;
            let flow = Flow::try_from(model)?;
            change_feed::record(&db_tx, &flow).await?;
            Ok::<_, EngineError>(flow)
        })?;

        tracing::info!(
            flow_id = %flow.id,
            account_id = %flow.account_id,
            accepted = accept,
            "flow finalized"
        );
        self.wake_feed();
        Ok(())
    }

    /// Looks up a single flow by id.
    pub async fn flow(&self, flow_id: &str) -> ResultEngine<Flow> {
        let flow_id = parse_uuid(flow_id, "flow")?;
        let model = flows::Entity::find_by_id(flow_id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("flow not exists".to_string()))?;
        Flow::try_from(model)
    }
}

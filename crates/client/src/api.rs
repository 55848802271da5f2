//! Object-safe view of the ledger for services that spend or grant points.
//!
//! Depend on [`LedgerApi`] rather than [`LedgerClient`] to swap in
//! [`MockLedger`](crate::MockLedger) in tests.

use api_types::{balance::Balance, inflow::SubscriptionRequest};
use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::{ClientResult, LedgerClient, PendingDebit};

/// A reserved debit awaiting its outcome.
#[async_trait]
pub trait PendingTransaction: Send + Sync {
    fn flow_id(&self) -> Uuid;

    fn is_finalized(&self) -> bool;

    /// Spends the reserved points. Fails with
    /// [`ClientError::AlreadyFinalized`](crate::ClientError::AlreadyFinalized)
    /// once the debit has an outcome.
    async fn accept(&mut self) -> ClientResult<()>;

    /// Releases the reserved points unless the debit was already accepted.
    async fn finalize(&mut self) -> ClientResult<()>;
}

#[async_trait]
pub trait LedgerApi: Send + Sync {
    async fn balance(&self, access_token: &str) -> ClientResult<Balance>;

    async fn request_credit_from_cheer(
        &self,
        access_token: &str,
        num_points_to_credit: i64,
        message: Option<&str>,
    ) -> ClientResult<Uuid>;

    async fn request_credit_from_subscription(
        &self,
        access_token: &str,
        request: &SubscriptionRequest,
    ) -> ClientResult<Uuid>;

    async fn request_credit_from_gift_sub(
        &self,
        access_token: &str,
        base_points_to_credit: i64,
        num_subscriptions: i64,
        credit_multiplier: f64,
    ) -> ClientResult<Uuid>;

    async fn request_alert_redemption(
        &self,
        access_token: &str,
        num_points_to_debit: i64,
        alert_type: &str,
        alert_metadata: Option<Value>,
    ) -> ClientResult<Box<dyn PendingTransaction>>;
}

#[async_trait]
impl PendingTransaction for PendingDebit {
    fn flow_id(&self) -> Uuid {
        PendingDebit::flow_id(self)
    }

    fn is_finalized(&self) -> bool {
        PendingDebit::is_finalized(self)
    }

    async fn accept(&mut self) -> ClientResult<()> {
        PendingDebit::accept(self).await
    }

    async fn finalize(&mut self) -> ClientResult<()> {
        PendingDebit::finalize(self).await
    }
}

#[async_trait]
impl LedgerApi for LedgerClient {
    async fn balance(&self, access_token: &str) -> ClientResult<Balance> {
        LedgerClient::balance(self, access_token).await
    }

    async fn request_credit_from_cheer(
        &self,
        access_token: &str,
        num_points_to_credit: i64,
        message: Option<&str>,
    ) -> ClientResult<Uuid> {
        LedgerClient::request_credit_from_cheer(self, access_token, num_points_to_credit, message)
            .await
    }

    async fn request_credit_from_subscription(
        &self,
        access_token: &str,
        request: &SubscriptionRequest,
    ) -> ClientResult<Uuid> {
        LedgerClient::request_credit_from_subscription(self, access_token, request).await
    }

    async fn request_credit_from_gift_sub(
        &self,
        access_token: &str,
        base_points_to_credit: i64,
        num_subscriptions: i64,
        credit_multiplier: f64,
    ) -> ClientResult<Uuid> {
        LedgerClient::request_credit_from_gift_sub(
            self,
            access_token,
            base_points_to_credit,
            num_subscriptions,
            credit_multiplier,
        )
        .await
    }

    async fn request_alert_redemption(
        &self,
        access_token: &str,
        num_points_to_debit: i64,
        alert_type: &str,
        alert_metadata: Option<Value>,
    ) -> ClientResult<Box<dyn PendingTransaction>> {
        let debit = LedgerClient::request_alert_redemption(
            self,
            access_token,
            num_points_to_debit,
            alert_type,
            alert_metadata,
        )
        .await?;
        Ok(Box::new(debit))
    }
}

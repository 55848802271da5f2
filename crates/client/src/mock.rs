//! In-memory [`LedgerApi`] for tests of services that use the ledger.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use api_types::{balance::Balance, inflow::SubscriptionRequest};
use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::{ClientError, ClientResult, LedgerApi, PendingTransaction};

#[derive(Debug, Default)]
struct MockAccount {
    credited: i64,
    debits: Vec<MockDebitState>,
}

#[derive(Debug)]
struct MockDebitState {
    id: Uuid,
    points: i64,
    finalized: bool,
    accepted: bool,
}

impl MockAccount {
    fn balance(&self) -> Balance {
        let mut balance = Balance {
            total_points: self.credited,
            available_points: self.credited,
        };
        for debit in &self.debits {
            if !debit.finalized {
                balance.available_points -= debit.points;
            } else if debit.accepted {
                balance.total_points -= debit.points;
                balance.available_points -= debit.points;
            }
        }
        balance
    }
}

type Accounts = Arc<Mutex<HashMap<String, MockAccount>>>;

/// Ledger keyed by access token. Tokens that were never granted are rejected
/// as unauthorized.
#[derive(Debug, Clone, Default)]
pub struct MockLedger {
    accounts: Accounts,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `access_token` with a starting balance.
    pub fn grant(self, access_token: &str, points: i64) -> Self {
        self.accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(access_token.to_string())
            .or_default()
            .credited += points;
        self
    }

    fn credit(&self, access_token: &str, points: i64) -> ClientResult<Uuid> {
        if points <= 0 {
            return Err(ClientError::Validation("points must be > 0".to_string()));
        }
        let mut accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
        let account = accounts
            .get_mut(access_token)
            .ok_or_else(|| ClientError::Unauthorized("invalid token".to_string()))?;
        account.credited += points;
        Ok(Uuid::now_v7())
    }
}

fn scaled(points: f64) -> ClientResult<i64> {
    if !points.is_finite() || points <= 0.0 {
        return Err(ClientError::Validation(
            "credit multiplier must be a positive number".to_string(),
        ));
    }
    Ok(points.round() as i64)
}

#[async_trait]
impl LedgerApi for MockLedger {
    async fn balance(&self, access_token: &str) -> ClientResult<Balance> {
        self.accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(access_token)
            .map(MockAccount::balance)
            .ok_or_else(|| ClientError::Unauthorized("invalid token".to_string()))
    }

    async fn request_credit_from_cheer(
        &self,
        access_token: &str,
        num_points_to_credit: i64,
        _message: Option<&str>,
    ) -> ClientResult<Uuid> {
        self.credit(access_token, num_points_to_credit)
    }

    async fn request_credit_from_subscription(
        &self,
        access_token: &str,
        request: &SubscriptionRequest,
    ) -> ClientResult<Uuid> {
        let points =
            scaled(request.base_points_to_credit as f64 * request.credit_multiplier)?;
        self.credit(access_token, points)
    }

    async fn request_credit_from_gift_sub(
        &self,
        access_token: &str,
        base_points_to_credit: i64,
        num_subscriptions: i64,
        credit_multiplier: f64,
    ) -> ClientResult<Uuid> {
        let points = scaled(
            base_points_to_credit as f64 * num_subscriptions as f64 * credit_multiplier,
        )?;
        self.credit(access_token, points)
    }

    async fn request_alert_redemption(
        &self,
        access_token: &str,
        num_points_to_debit: i64,
        _alert_type: &str,
        _alert_metadata: Option<Value>,
    ) -> ClientResult<Box<dyn PendingTransaction>> {
        if num_points_to_debit <= 0 {
            return Err(ClientError::Validation("points must be > 0".to_string()));
        }
        let mut accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
        let account = accounts
            .get_mut(access_token)
            .ok_or_else(|| ClientError::Unauthorized("invalid token".to_string()))?;
        if account.balance().available_points < num_points_to_debit {
            return Err(ClientError::NotEnoughPoints);
        }

        let id = Uuid::now_v7();
        account.debits.push(MockDebitState {
            id,
            points: num_points_to_debit,
            finalized: false,
            accepted: false,
        });
        Ok(Box::new(MockDebit {
            accounts: Arc::clone(&self.accounts),
            access_token: access_token.to_string(),
            id,
            finalized: false,
        }))
    }
}

/// Debit handle returned by [`MockLedger`].
#[derive(Debug)]
pub struct MockDebit {
    accounts: Accounts,
    access_token: String,
    id: Uuid,
    finalized: bool,
}

impl MockDebit {
    fn settle(&mut self, accept: bool) {
        let mut accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(debit) = accounts
            .get_mut(&self.access_token)
            .and_then(|account| account.debits.iter_mut().find(|debit| debit.id == self.id))
        {
            debit.finalized = true;
            debit.accepted = accept;
        }
        self.finalized = true;
    }
}

#[async_trait]
impl PendingTransaction for MockDebit {
    fn flow_id(&self) -> Uuid {
        self.id
    }

    fn is_finalized(&self) -> bool {
        self.finalized
    }

    async fn accept(&mut self) -> ClientResult<()> {
        if self.finalized {
            return Err(ClientError::AlreadyFinalized);
        }
        self.settle(true);
        Ok(())
    }

    async fn finalize(&mut self) -> ClientResult<()> {
        if !self.finalized {
            self.settle(false);
        }
        Ok(())
    }
}

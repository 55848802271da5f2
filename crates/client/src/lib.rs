//! HTTP client for the points ledger.
//!
//! Every call carries the caller's bearer token; the server derives the
//! account from it.

use api_types::{
    ErrorBody,
    balance::Balance,
    flow::FlowCreated,
    inflow::{CheerRequest, GiftSubRequest, ManualCreditRequest, SubscriptionRequest},
    outflow::OutflowRequest,
    transaction::TransactionHistory,
};
use reqwest::{Method, StatusCode, Url};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use uuid::Uuid;

pub use api::{LedgerApi, PendingTransaction};
pub use error::{ClientError, ClientResult};
pub use mock::{MockDebit, MockLedger};

mod api;
mod error;
mod mock;

#[derive(Debug, Clone)]
pub struct LedgerClient {
    base_url: Url,
    http: reqwest::Client,
}

impl LedgerClient {
    pub fn new(base_url: &str) -> ClientResult<Self> {
        let base_url =
            Url::parse(base_url).map_err(|err| ClientError::InvalidUrl(err.to_string()))?;
        Ok(Self {
            base_url,
            http: reqwest::Client::new(),
        })
    }

    fn endpoint(&self, path: &str) -> ClientResult<Url> {
        self.base_url
            .join(path)
            .map_err(|err| ClientError::InvalidUrl(err.to_string()))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        access_token: &str,
        body: Option<&impl Serialize>,
    ) -> ClientResult<reqwest::Response> {
        let endpoint = self.endpoint(path)?;
        let mut request = self
            .http
            .request(method.clone(), endpoint)
            .bearer_auth(access_token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let res = request.send().await?;
        if res.status().is_success() {
            return Ok(res);
        }

        let status = res.status();
        let message = res
            .json::<ErrorBody>()
            .await
            .map(|err| err.error)
            .unwrap_or_else(|_| "unknown error".to_string());
        tracing::debug!(%method, path, %status, "ledger request failed: {message}");

        let err = match status {
            StatusCode::UNAUTHORIZED => ClientError::Unauthorized(message),
            StatusCode::FORBIDDEN => ClientError::Forbidden(message),
            StatusCode::NOT_FOUND => ClientError::NotFound(message),
            StatusCode::CONFLICT => ClientError::Conflict(message),
            StatusCode::BAD_REQUEST => ClientError::Validation(message),
            _ => ClientError::Server {
                status: status.as_u16(),
                message,
            },
        };
        Err(err)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        access_token: &str,
        body: Option<&impl Serialize>,
    ) -> ClientResult<T> {
        let res = self.send(method, path, access_token, body).await?;
        Ok(res.json::<T>().await?)
    }

    async fn post_inflow(
        &self,
        path: &str,
        access_token: &str,
        body: &impl Serialize,
    ) -> ClientResult<Uuid> {
        let created: FlowCreated = self
            .send_json(Method::POST, path, access_token, Some(body))
            .await?;
        Ok(created.flow_id)
    }

    pub async fn balance(&self, access_token: &str) -> ClientResult<Balance> {
        self.send_json(Method::GET, "balance", access_token, None::<&()>)
            .await
    }

    /// Fetches one page of history; pass the previous page's `next_cursor` as
    /// `from` to continue.
    pub async fn history(
        &self,
        access_token: &str,
        max: Option<u64>,
        from: Option<Uuid>,
    ) -> ClientResult<TransactionHistory> {
        let mut path = "history".to_string();
        let mut params = Vec::new();
        if let Some(max) = max {
            params.push(format!("max={max}"));
        }
        if let Some(from) = from {
            params.push(format!("from={from}"));
        }
        if !params.is_empty() {
            path = format!("{path}?{}", params.join("&"));
        }
        self.send_json(Method::GET, &path, access_token, None::<&()>)
            .await
    }

    /// Grants points to `account_id`. Requires a broadcaster token.
    pub async fn request_manual_credit(
        &self,
        access_token: &str,
        account_id: &str,
        num_points_to_credit: i64,
        note: &str,
    ) -> ClientResult<Uuid> {
        let body = ManualCreditRequest {
            account_id: account_id.to_string(),
            num_points_to_credit,
            note: note.to_string(),
        };
        self.post_inflow("inflow/manual-credit", access_token, &body)
            .await
    }

    pub async fn request_credit_from_cheer(
        &self,
        access_token: &str,
        num_points_to_credit: i64,
        message: Option<&str>,
    ) -> ClientResult<Uuid> {
        let body = CheerRequest {
            num_points_to_credit,
            message: message.map(str::to_string),
        };
        self.post_inflow("inflow/cheer", access_token, &body).await
    }

    pub async fn request_credit_from_subscription(
        &self,
        access_token: &str,
        request: &SubscriptionRequest,
    ) -> ClientResult<Uuid> {
        self.post_inflow("inflow/subscription", access_token, request)
            .await
    }

    pub async fn request_credit_from_gift_sub(
        &self,
        access_token: &str,
        base_points_to_credit: i64,
        num_subscriptions: i64,
        credit_multiplier: f64,
    ) -> ClientResult<Uuid> {
        let body = GiftSubRequest {
            base_points_to_credit,
            num_subscriptions,
            credit_multiplier,
        };
        self.post_inflow("inflow/gift-sub", access_token, &body)
            .await
    }

    /// Reserves points for an alert. The returned [`PendingDebit`] must be
    /// accepted once the alert has played, or finalized to release the points.
    pub async fn request_alert_redemption(
        &self,
        access_token: &str,
        num_points_to_debit: i64,
        alert_type: &str,
        alert_metadata: Option<Value>,
    ) -> ClientResult<PendingDebit> {
        let body = OutflowRequest::AlertRedemption {
            num_points_to_debit,
            alert_type: alert_type.to_string(),
            alert_metadata,
        };
        let created: FlowCreated = self
            .send_json(Method::POST, "outflow", access_token, Some(&body))
            .await
            .map_err(|err| match err {
                ClientError::Conflict(_) => ClientError::NotEnoughPoints,
                other => other,
            })?;

        Ok(PendingDebit {
            client: self.clone(),
            access_token: access_token.to_string(),
            flow_id: created.flow_id,
            finalized: false,
        })
    }

    /// Issues a short-lived token for `GET /notifications?token=…`.
    pub async fn notification_token(&self, access_token: &str) -> ClientResult<String> {
        let res = self
            .send(Method::POST, "notifications", access_token, None::<&()>)
            .await?;
        Ok(res.text().await?)
    }

    async fn finalize(&self, access_token: &str, flow_id: Uuid, accept: bool) -> ClientResult<()> {
        let method = if accept { Method::PATCH } else { Method::DELETE };
        self.send(method, &format!("outflow/{flow_id}"), access_token, None::<&()>)
            .await?;
        Ok(())
    }
}

/// A reserved debit awaiting its outcome.
#[derive(Debug)]
pub struct PendingDebit {
    client: LedgerClient,
    access_token: String,
    flow_id: Uuid,
    finalized: bool,
}

impl PendingDebit {
    pub fn flow_id(&self) -> Uuid {
        self.flow_id
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Spends the reserved points.
    pub async fn accept(&mut self) -> ClientResult<()> {
        if self.finalized {
            return Err(ClientError::AlreadyFinalized);
        }
        self.client
            .finalize(&self.access_token, self.flow_id, true)
            .await?;
        self.finalized = true;
        Ok(())
    }

    /// Releases the reserved points unless the debit was already accepted.
    /// Calling it again is a no-op.
    pub async fn finalize(&mut self) -> ClientResult<()> {
        if !self.finalized {
            self.client
                .finalize(&self.access_token, self.flow_id, false)
                .await?;
            self.finalized = true;
        }
        Ok(())
    }
}

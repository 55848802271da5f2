use chrono::{Duration, Utc};
use sea_orm::{ActiveValue, Condition, QueryFilter, TransactionTrait, prelude::*};

use crate::{EngineError, ResultEngine, tokens};

use super::{Engine, with_tx};

/// Default lifetime of a subscription token.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::seconds(600);

impl Engine {
    /// Issues a short-lived token that authorizes subscribing to the account's
    /// notification stream.
    ///
    /// Issuing a token invalidates the account's previous tokens. Expired
    /// tokens of any account are purged at the same time.
    pub async fn issue_subscription_token(&self, account_id: &str) -> ResultEngine<String> {
        let account_id = account_id.trim();
        if account_id.is_empty() {
            return Err(EngineError::InvalidField(
                "account id must not be empty".to_string(),
            ));
        }

        let now = Utc::now();
        let token = tokens::generate_token();
        with_tx!(self, |db_tx| {
            tokens::Entity::delete_many()
                .filter(
                    Condition::any()
                        .add(tokens::Column::AccountId.eq(account_id))
                        .add(tokens::Column::ExpiresAt.lte(now)),
                )
                .exec(&db_tx)
                .await?;

            tokens::ActiveModel {
                token: ActiveValue::Set(token.clone()),
                account_id: ActiveValue::Set(account_id.to_string()),
                expires_at: ActiveValue::Set(now + self.token_ttl),
            }
            .insert(&db_tx)
            .await?;
            Ok::<_, EngineError>(())
        })?;

        tracing::debug!(account_id, "subscription token issued");
        Ok(token)
    }

    /// Resolves a subscription token to its account.
    ///
    /// Unknown and expired tokens are both [`EngineError::Unauthorized`].
    pub async fn resolve_subscription_token(&self, token: &str) -> ResultEngine<String> {
        let model = tokens::Entity::find_by_id(token.to_string())
            .filter(tokens::Column::ExpiresAt.gt(Utc::now()))
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::Unauthorized("invalid token".to_string()))?;
        Ok(model.account_id)
    }
}

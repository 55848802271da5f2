use sea_orm::{Condition, QueryFilter, QueryOrder, QuerySelect, prelude::*};
use uuid::Uuid;

use crate::{EngineError, Flow, HistoryPage, ResultEngine, TransactionRecord, flows};

use super::Engine;

pub const DEFAULT_PAGE_SIZE: u64 = 50;
pub const MAX_PAGE_SIZE: u64 = 100;

fn invalid_cursor() -> EngineError {
    EngineError::InvalidCursor("invalid history cursor".to_string())
}

impl Engine {
    /// Lists an account's transactions, newest first.
    ///
    /// Pagination is keyset-based on `(created_at DESC, id DESC)`. The cursor
    /// is the id of the first record of the page to return; a page that has a
    /// successor carries the successor's first id as `next_cursor`.
    ///
    /// `page_size` defaults to [`DEFAULT_PAGE_SIZE`] and is clamped to
    /// `1..=MAX_PAGE_SIZE`.
    pub async fn history(
        &self,
        account_id: &str,
        cursor: Option<&str>,
        page_size: Option<u64>,
    ) -> ResultEngine<HistoryPage> {
        let page_size = page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let mut query = flows::Entity::find()
            .filter(flows::Column::AccountId.eq(account_id))
            .order_by_desc(flows::Column::CreatedAt)
            .order_by_desc(flows::Column::Id)
            .limit(page_size + 1);

        if let Some(cursor) = cursor {
            let cursor_id = Uuid::parse_str(cursor).map_err(|_| invalid_cursor())?;
            let start = flows::Entity::find_by_id(cursor_id.to_string())
                .filter(flows::Column::AccountId.eq(account_id))
                .one(&self.database)
                .await?
                .ok_or_else(invalid_cursor)?;
            query = query.filter(
                Condition::any()
                    .add(flows::Column::CreatedAt.lt(start.created_at))
                    .add(
                        Condition::all()
                            .add(flows::Column::CreatedAt.eq(start.created_at))
                            .add(flows::Column::Id.lte(start.id)),
                    ),
            );
        }

        let mut models = query.all(&self.database).await?;
        let next_cursor = if models.len() as u64 > page_size {
            let extra = models.pop().ok_or_else(invalid_cursor)?;
            Some(Uuid::parse_str(&extra.id).map_err(|_| invalid_cursor())?)
        } else {
            None
        };

        let mut items = Vec::with_capacity(models.len());
        for model in models {
            let flow = Flow::try_from(model)?;
            items.push(TransactionRecord::from(&flow));
        }
        Ok(HistoryPage { items, next_cursor })
    }
}

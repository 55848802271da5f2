use sea_orm::{ConnectionTrait, Statement};

use crate::{Balance, ResultEngine};

use super::Engine;

/// Reduces an account's flows to a balance in a single read.
const BALANCE_SQL: &str = r#"
SELECT
    COALESCE(SUM(CASE
        WHEN finalized_at IS NULL AND delta_points > 0 THEN delta_points
        WHEN finalized_at IS NOT NULL AND accepted THEN delta_points
        ELSE 0
    END), 0) AS total_points,
    COALESCE(SUM(CASE
        WHEN finalized_at IS NULL AND delta_points < 0 THEN delta_points
        WHEN finalized_at IS NOT NULL AND accepted THEN delta_points
        ELSE 0
    END), 0) AS available_points
FROM flows
WHERE account_id = ?
"#;

impl Engine {
    /// Current balance of an account. Unknown accounts have a zero balance.
    pub async fn balance(&self, account_id: &str) -> ResultEngine<Balance> {
        let backend = self.database.get_database_backend();
        let row = self
            .database
            .query_one(Statement::from_sql_and_values(
                backend,
                BALANCE_SQL,
                [account_id.into()],
            ))
            .await?;

        let Some(row) = row else {
            return Ok(Balance::default());
        };
        Ok(Balance {
            total: row.try_get("", "total_points")?,
            available: row.try_get("", "available_points")?,
        })
    }
}

//! The balance SQL and the reservation check must agree with
//! `Balance::from_flows` over the rows actually stored.

use std::collections::HashMap;

use chrono::Utc;
use proptest::prelude::*;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};
use uuid::Uuid;

use engine::{Balance, Engine, EngineError, Flow};
use migration::MigratorTrait;

const ACCOUNTS: [&str; 2] = ["1001", "1002"];

#[derive(Clone, Debug)]
enum Op {
    Credit { account: usize, points: i64 },
    PendingCredit { account: usize, points: i64 },
    Reserve { account: usize, points: i64 },
    Finalize { debit: usize, accept: bool },
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..ACCOUNTS.len(), 1i64..500).prop_map(|(account, points)| Op::Credit { account, points }),
        (0..ACCOUNTS.len(), 1i64..500)
            .prop_map(|(account, points)| Op::PendingCredit { account, points }),
        (0..ACCOUNTS.len(), 1i64..800).prop_map(|(account, points)| Op::Reserve { account, points }),
        (any::<usize>(), any::<bool>()).prop_map(|(debit, accept)| Op::Finalize { debit, accept }),
    ]
}

async fn insert_pending_credit(db: &DatabaseConnection, account_id: &str, points: i64) -> Uuid {
    let id = Uuid::now_v7();
    db.execute(Statement::from_sql_and_values(
        db.get_database_backend(),
        "INSERT INTO flows (id, kind, account_id, delta_points, metadata, created_at, finalized_at, accepted) \
         VALUES (?, ?, ?, ?, ?, ?, NULL, ?)",
        vec![
            id.to_string().into(),
            "subscription".into(),
            account_id.into(),
            points.into(),
            "{}".into(),
            Utc::now().into(),
            false.into(),
        ],
    ))
    .await
    .unwrap();
    id
}

/// Applies `ops` and checks every step against a local mirror of the rows.
async fn run(ops: Vec<Op>) -> Result<(), TestCaseError> {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db.clone()).build().await.unwrap();

    let mut stored: HashMap<&str, HashMap<Uuid, Flow>> = HashMap::new();
    let mut debits: Vec<(&str, Uuid)> = Vec::new();

    for op in ops {
        let (account_id, flow_id) = match op {
            Op::Credit { account, points } => {
                let account_id = ACCOUNTS[account];
                let id = engine.record_cheer(account_id, points, None).await.unwrap();
                (account_id, Some(id))
            }
            Op::PendingCredit { account, points } => {
                let account_id = ACCOUNTS[account];
                (account_id, Some(insert_pending_credit(&db, account_id, points).await))
            }
            Op::Reserve { account, points } => {
                let account_id = ACCOUNTS[account];
                let expected = Balance::from_flows(stored.entry(account_id).or_default().values());
                match engine
                    .reserve_alert_redemption(account_id, points, "siren", None)
                    .await
                {
                    Ok(id) => {
                        prop_assert!(expected.available >= points);
                        debits.push((account_id, id));
                        (account_id, Some(id))
                    }
                    Err(EngineError::InsufficientFunds(_)) => {
                        prop_assert!(expected.available < points);
                        (account_id, None)
                    }
                    Err(other) => return Err(TestCaseError::fail(other.to_string())),
                }
            }
            Op::Finalize { debit, accept } => {
                if debits.is_empty() {
                    continue;
                }
                let (account_id, id) = debits[debit % debits.len()];
                match engine.finalize_debit(id, account_id, accept).await {
                    Ok(()) | Err(EngineError::Conflict(_)) => {}
                    Err(other) => return Err(TestCaseError::fail(other.to_string())),
                }
                (account_id, Some(id))
            }
        };

        if let Some(id) = flow_id {
            let flow = engine.flow(&id.to_string()).await.unwrap();
            stored.entry(account_id).or_default().insert(id, flow);
        }

        for account_id in ACCOUNTS {
            let expected = Balance::from_flows(stored.entry(account_id).or_default().values());
            let actual = engine.balance(account_id).await.unwrap();
            prop_assert_eq!(actual, expected);
            prop_assert!(actual.available <= actual.total);
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn stored_balance_matches_fold(ops in proptest::collection::vec(arb_op(), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(run(ops))?;
    }
}

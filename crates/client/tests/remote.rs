use std::sync::Arc;

use api_types::inflow::SubscriptionRequest;
use engine::Engine;
use ledger_client::{ClientError, LedgerApi, LedgerClient, PendingTransaction};
use migration::MigratorTrait;
use sea_orm::Database;
use serde_json::json;
use server::{Role, ServerOptions, StaticAuthenticator, StaticToken};
use tokio_util::sync::CancellationToken;

const VIEWER: &str = "viewer-token";
const BROADCASTER: &str = "broadcaster-token";
const AUTHORITY: &str = "authority-token";

async fn spawn_ledger() -> (LedgerClient, CancellationToken) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db).build().await.unwrap();
    let changes = engine.change_feed().await.unwrap();

    let authenticator = StaticAuthenticator::new([
        StaticToken {
            token: VIEWER.to_string(),
            account_id: "1001".to_string(),
            role: Role::Viewer,
        },
        StaticToken {
            token: BROADCASTER.to_string(),
            account_id: "9000".to_string(),
            role: Role::Broadcaster,
        },
        StaticToken {
            token: AUTHORITY.to_string(),
            account_id: "1001".to_string(),
            role: Role::Authority,
        },
    ]);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let shutdown = CancellationToken::new();
    let addr = server::spawn_with_listener(
        engine,
        changes,
        Arc::new(authenticator),
        ServerOptions::default(),
        listener,
        shutdown.clone(),
    )
    .unwrap();

    let client = LedgerClient::new(&format!("http://{addr}/")).unwrap();
    (client, shutdown)
}

#[tokio::test]
async fn credits_show_up_in_balance_and_history() {
    let (client, shutdown) = spawn_ledger().await;

    client
        .request_manual_credit(BROADCASTER, "1001", 100, "welcome")
        .await
        .unwrap();
    client
        .request_credit_from_cheer(AUTHORITY, 200, Some("pog"))
        .await
        .unwrap();
    client
        .request_credit_from_subscription(
            AUTHORITY,
            &SubscriptionRequest {
                base_points_to_credit: 600,
                is_initial: true,
                is_gift: false,
                message: None,
                credit_multiplier: 1.0,
            },
        )
        .await
        .unwrap();
    let last = client
        .request_credit_from_gift_sub(AUTHORITY, 200, 1, 1.0)
        .await
        .unwrap();

    let balance = client.balance(VIEWER).await.unwrap();
    assert_eq!(balance.total_points, 1100);
    assert_eq!(balance.available_points, 1100);

    let page = client.history(VIEWER, Some(3), None).await.unwrap();
    assert_eq!(page.items.len(), 3);
    assert_eq!(page.items[0].id, last);
    assert_eq!(page.items[0].description, "Thank you for gifting a sub!");

    let rest = client
        .history(VIEWER, Some(3), page.next_cursor)
        .await
        .unwrap();
    assert_eq!(rest.items.len(), 1);
    assert_eq!(rest.items[0].description, "Manual credit: welcome");
    assert!(rest.next_cursor.is_none());

    shutdown.cancel();
}

#[tokio::test]
async fn pending_debit_guards_double_finalization() {
    let (client, shutdown) = spawn_ledger().await;
    client
        .request_manual_credit(BROADCASTER, "1001", 500, "seed")
        .await
        .unwrap();

    let mut debit = client
        .request_alert_redemption(VIEWER, 300, "ghost", Some(json!({"color": "red"})))
        .await
        .unwrap();
    assert!(!debit.is_finalized());
    assert_eq!(client.balance(VIEWER).await.unwrap().available_points, 200);

    debit.accept().await.unwrap();
    assert!(matches!(
        debit.accept().await,
        Err(ClientError::AlreadyFinalized)
    ));
    // Finalizing after accept does not reject.
    debit.finalize().await.unwrap();

    let balance = client.balance(VIEWER).await.unwrap();
    assert_eq!(balance.total_points, 200);
    assert_eq!(balance.available_points, 200);

    shutdown.cancel();
}

#[tokio::test]
async fn finalize_releases_unaccepted_points() {
    let (client, shutdown) = spawn_ledger().await;
    client
        .request_manual_credit(BROADCASTER, "1001", 500, "seed")
        .await
        .unwrap();

    let mut debit = client
        .request_alert_redemption(VIEWER, 300, "ghost", None)
        .await
        .unwrap();
    debit.finalize().await.unwrap();
    debit.finalize().await.unwrap();

    let balance = client.balance(VIEWER).await.unwrap();
    assert_eq!(balance.total_points, 500);
    assert_eq!(balance.available_points, 500);

    shutdown.cancel();
}

#[tokio::test]
async fn overdraw_is_not_enough_points() {
    let (client, shutdown) = spawn_ledger().await;

    let err = client
        .request_alert_redemption(VIEWER, 1, "ghost", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NotEnoughPoints));

    let err = client.balance("nobody").await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized(_)));

    let err = client
        .request_manual_credit(VIEWER, "1001", 10, "self-service")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Forbidden(_)));

    let token = client.notification_token(VIEWER).await.unwrap();
    assert_eq!(token.len(), 64);

    shutdown.cancel();
}

#[tokio::test]
async fn ledger_api_drives_the_remote_service() {
    let (client, shutdown) = spawn_ledger().await;
    let api: Box<dyn LedgerApi> = Box::new(client.clone());

    api.request_credit_from_cheer(AUTHORITY, 400, None)
        .await
        .unwrap();
    let mut debit = api
        .request_alert_redemption(VIEWER, 150, "ghost", None)
        .await
        .unwrap();
    assert_eq!(api.balance(VIEWER).await.unwrap().available_points, 250);

    debit.accept().await.unwrap();
    assert!(debit.is_finalized());
    let balance = api.balance(VIEWER).await.unwrap();
    assert_eq!((balance.total_points, balance.available_points), (250, 250));

    shutdown.cancel();
}

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use sea_orm::Database;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use engine::Engine;
use migration::MigratorTrait;
use server::{Role, ServerOptions, ServerState, StaticAuthenticator, StaticToken};

const VIEWER: &str = "viewer-token";
const OTHER_VIEWER: &str = "other-viewer-token";
const BROADCASTER: &str = "broadcaster-token";
const AUTHORITY: &str = "authority-token";

fn token(token: &str, account_id: &str, role: Role) -> StaticToken {
    StaticToken {
        token: token.to_string(),
        account_id: account_id.to_string(),
        role,
    }
}

/// Router over an in-memory ledger with the notification dispatcher running.
async fn app() -> (Router, CancellationToken) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db)
        .feed_poll_interval(Duration::from_millis(50))
        .build()
        .await
        .unwrap();
    let changes = engine.change_feed().await.unwrap();

    let authenticator = StaticAuthenticator::new([
        token(VIEWER, "1001", Role::Viewer),
        token(OTHER_VIEWER, "1002", Role::Viewer),
        token(BROADCASTER, "9000", Role::Broadcaster),
        token(AUTHORITY, "1001", Role::Authority),
    ]);
    let shutdown = CancellationToken::new();
    let options = ServerOptions {
        keep_alive: Duration::from_secs(3600),
        ..ServerOptions::default()
    };
    let state = ServerState::new(engine, Arc::new(authenticator), &options, shutdown.clone());
    tokio::spawn(server::run_dispatcher(
        Arc::clone(&state.registry),
        changes,
        shutdown.clone(),
    ));

    (server::router(state), shutdown)
}

fn request(method: &str, uri: &str, bearer: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(bearer) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {bearer}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, body)
}

async fn grant(app: &Router, account_id: &str, points: i64) -> String {
    let (status, body) = send(
        app,
        request(
            "POST",
            "/inflow/manual-credit",
            Some(BROADCASTER),
            Some(json!({"accountId": account_id, "numPointsToCredit": points, "note": "test"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["flowId"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn requests_without_bearer_are_unauthorized() {
    let (app, _shutdown) = app().await;

    let (status, body) = send(&app, request("GET", "/balance", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = send(&app, request("GET", "/balance", Some("bogus"), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn balance_follows_reserve_and_accept() {
    let (app, _shutdown) = app().await;

    let (status, body) = send(&app, request("GET", "/balance", Some(VIEWER), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"totalPoints": 0, "availablePoints": 0}));

    grant(&app, "1001", 1200).await;

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/outflow",
            Some(VIEWER),
            Some(json!({"type": "alert-redemption", "numPointsToDebit": 250, "alertType": "ghost"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let flow_id = body["flowId"].as_str().unwrap().to_string();

    let (_, body) = send(&app, request("GET", "/balance", Some(VIEWER), None)).await;
    assert_eq!(body, json!({"totalPoints": 1200, "availablePoints": 950}));

    let uri = format!("/outflow/{flow_id}");
    let (status, _) = send(&app, request("PATCH", &uri, Some(VIEWER), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, request("DELETE", &uri, Some(VIEWER), None)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = send(&app, request("GET", "/balance", Some(VIEWER), None)).await;
    assert_eq!(body, json!({"totalPoints": 950, "availablePoints": 950}));

    let (status, body) = send(
        &app,
        request(
            "POST",
            "/outflow",
            Some(VIEWER),
            Some(json!({"type": "alert-redemption", "numPointsToDebit": 2000, "alertType": "ghost"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("Insufficient"));
}

#[tokio::test]
async fn outflows_of_other_accounts_are_not_found() {
    let (app, _shutdown) = app().await;
    grant(&app, "1001", 100).await;

    let (_, body) = send(
        &app,
        request(
            "POST",
            "/outflow",
            Some(VIEWER),
            Some(json!({"type": "alert-redemption", "numPointsToDebit": 10, "alertType": "ghost"})),
        ),
    )
    .await;
    let uri = format!("/outflow/{}", body["flowId"].as_str().unwrap());

    let (status, _) = send(&app, request("DELETE", &uri, Some(OTHER_VIEWER), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, request("PATCH", "/outflow/not-a-uuid", Some(VIEWER), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn inflows_require_their_role() {
    let (app, _shutdown) = app().await;

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/inflow/manual-credit",
            Some(VIEWER),
            Some(json!({"accountId": "1001", "numPointsToCredit": 10, "note": "free"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/inflow/cheer",
            Some(BROADCASTER),
            Some(json!({"numPointsToCredit": 10})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    for (uri, body) in [
        ("/inflow/cheer", json!({"numPointsToCredit": 100, "message": "gg"})),
        (
            "/inflow/subscription",
            json!({"basePointsToCredit": 600, "isInitial": true, "isGift": false, "creditMultiplier": 1.0}),
        ),
        (
            "/inflow/gift-sub",
            json!({"basePointsToCredit": 200, "numSubscriptions": 5, "creditMultiplier": 1.0}),
        ),
    ] {
        let (status, _) = send(&app, request("POST", uri, Some(AUTHORITY), Some(body))).await;
        assert_eq!(status, StatusCode::CREATED, "{uri}");
    }

    let (_, body) = send(&app, request("GET", "/balance", Some(VIEWER), None)).await;
    assert_eq!(body, json!({"totalPoints": 1700, "availablePoints": 1700}));

    let (status, _) = send(
        &app,
        request(
            "POST",
            "/inflow/cheer",
            Some(AUTHORITY),
            Some(json!({"numPointsToCredit": 0})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn history_pages_with_max_and_from() {
    let (app, _shutdown) = app().await;
    for points in [10, 20, 30] {
        grant(&app, "1001", points).await;
    }

    let (status, body) = send(&app, request("GET", "/history?max=2", Some(VIEWER), None)).await;
    assert_eq!(status, StatusCode::OK);
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["deltaPoints"], 30);
    assert_eq!(items[0]["type"], "manual-credit");
    assert_eq!(items[0]["state"], "accepted");
    assert_eq!(items[0]["description"], "Manual credit: test");
    let cursor = body["nextCursor"].as_str().unwrap().to_string();

    let uri = format!("/history?max=2&from={cursor}");
    let (_, body) = send(&app, request("GET", &uri, Some(VIEWER), None)).await;
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], cursor.as_str());
    assert!(body.get("nextCursor").is_none());

    let (status, _) = send(&app, request("GET", "/history?from=nope", Some(VIEWER), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn notification_stream_requires_a_valid_token() {
    let (app, _shutdown) = app().await;

    let (status, body) = send(&app, request("GET", "/notifications", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "'token' URL parameter must be set");

    let (status, body) = send(&app, request("GET", "/notifications?token=abc", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid token");

    let (status, _) = send(&app, request("POST", "/notifications", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn notification_stream_rejects_other_content_types() {
    let (app, _shutdown) = app().await;
    let (_, token) = send(&app, request("POST", "/notifications", Some(VIEWER), None)).await;
    let uri = format!("/notifications?token={}", token.as_str().unwrap());

    let mut json_only = request("GET", &uri, None, None);
    json_only
        .headers_mut()
        .insert(header::ACCEPT, "application/json".parse().unwrap());
    let (status, body) = send(&app, json_only).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "content-type application/json is not supported");

    let mut event_stream = request("GET", &uri, None, None);
    event_stream
        .headers_mut()
        .insert(header::ACCEPT, "text/event-stream".parse().unwrap());
    let response = app.clone().oneshot(event_stream).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

async fn next_frame(body: &mut Body) -> String {
    let frame = tokio::time::timeout(Duration::from_secs(5), body.frame())
        .await
        .expect("timed out waiting for an event")
        .expect("stream ended")
        .unwrap();
    String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap()
}

#[tokio::test]
async fn notification_stream_delivers_own_transactions() {
    let (app, shutdown) = app().await;

    let (status, token) = send(&app, request("POST", "/notifications", Some(VIEWER), None)).await;
    assert_eq!(status, StatusCode::OK);
    let token = token.as_str().unwrap().to_string();

    let uri = format!("/notifications?token={token}");
    let response = app.clone().oneshot(request("GET", &uri, None, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );
    let mut body = response.into_body();
    assert!(next_frame(&mut body).await.starts_with(':'));

    // Another account's flow must not show up on this stream.
    grant(&app, "1002", 5).await;
    let flow_id = grant(&app, "1001", 70).await;

    let frame = next_frame(&mut body).await;
    let data = frame
        .lines()
        .find_map(|line| line.strip_prefix("data:"))
        .unwrap();
    let event: Value = serde_json::from_str(data.trim()).unwrap();
    assert_eq!(event["id"], flow_id.as_str());
    assert_eq!(event["deltaPoints"], 70);
    assert_eq!(event["state"], "accepted");

    shutdown.cancel();
    let end = tokio::time::timeout(Duration::from_secs(5), body.frame())
        .await
        .unwrap();
    assert!(end.is_none());
}

#[tokio::test]
async fn reissued_token_replaces_the_old_one() {
    let (app, _shutdown) = app().await;

    let (_, first) = send(&app, request("POST", "/notifications", Some(VIEWER), None)).await;
    let (_, second) = send(&app, request("POST", "/notifications", Some(VIEWER), None)).await;

    let uri = format!("/notifications?token={}", first.as_str().unwrap());
    let (status, _) = send(&app, request("GET", &uri, None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let uri = format!("/notifications?token={}", second.as_str().unwrap());
    let response = app.clone().oneshot(request("GET", &uri, None, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

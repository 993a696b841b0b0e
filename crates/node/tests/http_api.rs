//! End-to-end requests against the HTTP router.

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tally_common::Address;
use tally_core::{Amount, Ledger, LedgerParams};
use tally_node::api::{build_router, ApiOptions, CALLER_HEADER};
use tally_node::{LedgerService, ManualClock};
use tokio_stream::StreamExt;
use tower::ServiceExt;

const T0: u64 = 1_700_000_000;

fn addr(n: u64) -> Address {
    Address::from_low_u64(n)
}

fn setup() -> (Router, Arc<ManualClock>, Arc<LedgerService>) {
    let clock = Arc::new(ManualClock::new(T0));
    let mut params = LedgerParams::with_owner(addr(1));
    params.faucet_amount = Amount::from(1000u32);
    params.faucet_cooldown = Duration::from_secs(3600);
    let ledger = Ledger::new(addr(0x7a11), params).unwrap();
    let service = Arc::new(LedgerService::new(ledger, clock.clone(), 64).unwrap());
    (
        build_router(service.clone(), ApiOptions::default()),
        clock,
        service,
    )
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, caller: Option<Address>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(caller) = caller {
        builder = builder.header(CALLER_HEADER, caller.to_string());
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn test_health_and_root() {
    let (app, _, _) = setup();
    let (status, body) = call(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = call(&app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "tally");
}

#[tokio::test]
async fn test_faucet_transfer_and_account_view() {
    let (app, _, _) = setup();
    let alice = addr(2);
    let bob = addr(3);

    let (status, body) = call(&app, post("/api/faucet", Some(alice), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["kind"], "Transfer");
    assert_eq!(body["data"][0]["from"], Address::ZERO.to_string());
    assert_eq!(body["data"][0]["amount"], "1000");

    let (status, _) = call(
        &app,
        post(
            "/api/transfer",
            Some(alice),
            json!({ "to": bob.to_string(), "amount": "400" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, get(&format!("/api/accounts/{}", alice))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["balance"], "600");
    assert_eq!(body["data"]["last_request_time"], T0);
    assert_eq!(body["data"]["next_faucet_time"], T0 + 3600);

    let (_, body) = call(&app, get("/api/status")).await;
    assert_eq!(body["data"]["total_supply"], "1000");
    assert_eq!(body["data"]["account_count"], 2);
}

#[tokio::test]
async fn test_cooldown_maps_to_429() {
    let (app, clock, _) = setup();
    let alice = addr(2);

    call(&app, post("/api/faucet", Some(alice), json!({}))).await;
    let (status, body) = call(&app, post("/api/faucet", Some(alice), json!({}))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "COOLDOWN_ACTIVE");
    assert!(body["message"].as_str().unwrap().contains(&(T0 + 3600).to_string()));

    clock.advance(3600);
    let (status, _) = call(&app, post("/api/faucet", Some(alice), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_transfer_rejections() {
    let (app, _, service) = setup();
    let alice = addr(2);
    call(&app, post("/api/faucet", Some(alice), json!({}))).await;

    let (status, body) = call(
        &app,
        post(
            "/api/transfer",
            Some(alice),
            json!({ "to": alice.to_string(), "amount": "1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "SELF_TRANSFER");

    let (_, body) = call(
        &app,
        post(
            "/api/transfer",
            Some(alice),
            json!({ "to": addr(0x7a11).to_string(), "amount": "1" }),
        ),
    )
    .await;
    assert_eq!(body["error"], "INVALID_RECIPIENT");

    let (_, body) = call(
        &app,
        post(
            "/api/transfer",
            Some(alice),
            json!({ "to": addr(3).to_string(), "amount": "1001" }),
        ),
    )
    .await;
    assert_eq!(body["error"], "INSUFFICIENT_BALANCE");

    let (status, body) = call(
        &app,
        post(
            "/api/transfer",
            Some(alice),
            json!({ "to": "not-an-address", "amount": "1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_REQUEST");

    assert_eq!(service.status().await.total_supply, Amount::from(1000u32));
}

#[tokio::test]
async fn test_caller_header_required() {
    let (app, _, _) = setup();

    let (status, body) = call(&app, post("/api/faucet", None, json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "MISSING_CALLER");

    let (_, body) = call(&app, post("/api/faucet", Some(Address::ZERO), json!({}))).await;
    assert_eq!(body["error"], "MISSING_CALLER");
}

#[tokio::test]
async fn test_admin_routes_require_owner() {
    let (app, _, _) = setup();
    let owner = addr(1);
    let intruder = addr(9);

    let (status, body) = call(
        &app,
        post(
            "/api/admin/faucet-amount",
            Some(intruder),
            json!({ "amount": "5" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "NOT_OWNER");

    let (status, body) = call(
        &app,
        post(
            "/api/admin/faucet-waiting-period",
            Some(owner),
            json!({ "seconds": 0 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["kind"], "FaucetWaitingPeriodChanged");
    assert_eq!(body["data"][0]["old"], 3600);
    assert_eq!(body["data"][0]["new"], 0);
    assert_eq!(body["data"][0]["timestamp"], T0);

    let (status, body) = call(
        &app,
        post(
            "/api/admin/max-transfer-limit",
            Some(owner),
            json!({ "limit": "5" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "LIMIT_TOO_LOW");

    let (status, _) = call(
        &app,
        post(
            "/api/admin/owner",
            Some(owner),
            json!({ "new_owner": intruder.to_string() }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = call(&app, get("/api/status")).await;
    assert_eq!(body["data"]["owner"], intruder.to_string());
    assert_eq!(body["data"]["faucet_cooldown_secs"], 0);

    let (status, body) = call(
        &app,
        post(
            "/api/admin/owner",
            Some(intruder),
            json!({ "new_owner": Address::ZERO.to_string() }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_OWNER");
}

#[tokio::test]
async fn test_events_since() {
    let (app, _, _) = setup();
    call(&app, post("/api/faucet", Some(addr(2)), json!({}))).await;
    call(&app, post("/api/faucet", Some(addr(3)), json!({}))).await;
    call(&app, post("/api/faucet", Some(addr(4)), json!({}))).await;

    let (_, body) = call(&app, get("/api/events")).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 3);

    let (_, body) = call(&app, get("/api/events?since=2")).await;
    let events = body["data"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["sequence"], 2);
    assert_eq!(events[0]["to"], addr(4).to_string());
}

#[tokio::test]
async fn test_metrics_exposed() {
    let (app, _, _) = setup();
    call(&app, post("/api/faucet", Some(addr(2)), json!({}))).await;

    let response = app.clone().oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("tally_faucet_draws_total 1"));
}

#[tokio::test]
async fn test_bad_account_path() {
    let (app, _, _) = setup();
    let (status, body) = call(&app, get("/api/accounts/0x1234")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_REQUEST");
}

#[tokio::test]
async fn test_ledger_identity_cannot_draw() {
    let (app, _, service) = setup();
    let (status, body) = call(&app, post("/api/faucet", Some(addr(0x7a11)), json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_RECIPIENT");
    assert_eq!(service.status().await.total_supply, Amount::from(0u32));
}

#[tokio::test]
async fn test_events_paging() {
    let (app, _, _) = setup();
    for n in 2..7 {
        call(&app, post("/api/faucet", Some(addr(n)), json!({}))).await;
    }

    let (_, body) = call(&app, get("/api/events?since=1&limit=2")).await;
    let events = body["data"].as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["sequence"], 1);
    assert_eq!(events[1]["sequence"], 2);
}

async fn read_until(
    body: &mut (impl tokio_stream::Stream<Item = Result<axum::body::Bytes, axum::Error>> + Unpin),
    needle: &str,
) -> String {
    let mut text = String::new();
    while !text.contains(needle) {
        let chunk = tokio::time::timeout(Duration::from_secs(5), body.next())
            .await
            .expect("timed out waiting for event")
            .expect("stream ended")
            .unwrap();
        text.push_str(&String::from_utf8_lossy(&chunk));
    }
    text
}

#[tokio::test]
async fn test_event_stream_replays_then_follows() {
    let (app, _, service) = setup();
    call(&app, post("/api/faucet", Some(addr(2)), json!({}))).await;

    let response = app
        .clone()
        .oneshot(get("/api/events/stream?since=0"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let mut body = response.into_body().into_data_stream();
    let text = read_until(&mut body, "\"sequence\":0").await;
    assert!(text.contains("Transfer"));
    assert!(text.contains(&addr(2).to_string()));

    service.faucet(&addr(3)).await.unwrap();
    let text = read_until(&mut body, "\"sequence\":1").await;
    assert!(text.contains(&addr(3).to_string()));
}

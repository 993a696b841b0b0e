//! HTTP API over a [`LedgerService`]

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequestParts, Path, Query, State},
    http::{header, request::Parts, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tally_common::utils::codec::decimal;
use tally_common::Address;
use tally_core::{Amount, EventRecord};
use tokio_stream::{Stream, StreamExt};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::{NodeError, NodeResult};
use crate::service::{AccountView, LedgerService, LedgerStatus};

/// Header carrying the authenticated caller identity.
pub const CALLER_HEADER: &str = "x-caller";

pub const DEFAULT_EVENTS_PAGE: usize = 100;
pub const MAX_EVENTS_PAGE: usize = 1000;

#[derive(Debug, Clone, Copy)]
pub struct ApiOptions {
    pub metrics_enabled: bool,
    pub cors_enabled: bool,
}

impl Default for ApiOptions {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            cors_enabled: false,
        }
    }
}

/// Success response
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T> {
    pub data: T,
    pub timestamp: String,
}

fn success<T>(data: T) -> Json<SuccessResponse<T>> {
    Json(SuccessResponse {
        data,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

type ApiResult<T> = NodeResult<Json<SuccessResponse<T>>>;

/// Caller identity taken from the `x-caller` header. The null identity is
/// never accepted.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub Address);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = NodeError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let address: Address = parts
            .headers
            .get(CALLER_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
            .ok_or(NodeError::MissingCaller)?;
        if address.is_zero() {
            return Err(NodeError::MissingCaller);
        }
        Ok(Caller(address))
    }
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> NodeResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| NodeError::InvalidRequest(rejection.body_text()))
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub to: Address,
    #[serde(with = "decimal")]
    pub amount: Amount,
}

#[derive(Debug, Deserialize)]
pub struct FaucetAmountRequest {
    #[serde(with = "decimal")]
    pub amount: Amount,
}

#[derive(Debug, Deserialize)]
pub struct WaitingPeriodRequest {
    pub seconds: u64,
}

#[derive(Debug, Deserialize)]
pub struct TransferLimitRequest {
    #[serde(with = "decimal")]
    pub limit: Amount,
}

#[derive(Debug, Deserialize)]
pub struct OwnershipRequest {
    pub new_owner: Address,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub since: Option<u64>,
    pub limit: Option<usize>,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Root handler with info
pub async fn root_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "tally",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Faucet-funded token ledger",
        "endpoints": {
            "GET /api/status": "Ledger parameters and supply",
            "GET /api/accounts/:address": "Account balance and faucet eligibility",
            "GET /api/events?since=N&limit=M": "Logged events from sequence N",
            "GET /api/events/stream?since=N": "Server-sent event stream",
            "POST /api/transfer": "Move tokens to another account",
            "POST /api/faucet": "Draw from the faucet",
            "POST /api/admin/faucet-amount": "Owner: set the faucet amount",
            "POST /api/admin/faucet-waiting-period": "Owner: set the faucet cooldown",
            "POST /api/admin/max-transfer-limit": "Owner: set the transfer cap",
            "POST /api/admin/owner": "Owner: hand over ownership",
            "GET /health": "Health check",
            "GET /metrics": "Prometheus metrics"
        }
    }))
}

pub async fn status_handler(State(service): State<Arc<LedgerService>>) -> ApiResult<LedgerStatus> {
    Ok(success(service.status().await))
}

pub async fn account_handler(
    State(service): State<Arc<LedgerService>>,
    Path(address): Path<String>,
) -> ApiResult<AccountView> {
    let address = address
        .parse::<Address>()
        .map_err(|e| NodeError::InvalidRequest(e.to_string()))?;
    Ok(success(service.account(&address).await))
}

pub async fn events_handler(
    State(service): State<Arc<LedgerService>>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<Vec<EventRecord>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_EVENTS_PAGE)
        .min(MAX_EVENTS_PAGE);
    Ok(success(
        service.events_since(query.since.unwrap_or(0), limit).await,
    ))
}

/// Server-sent events: logged records from `since` (if given), then live
/// commits as they happen.
pub async fn event_stream_handler(
    State(service): State<Arc<LedgerService>>,
    Query(query): Query<EventsQuery>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let (backlog, subscriber) = match query.since {
        Some(since) => service.subscribe_from(since).await,
        None => (Vec::new(), service.subscribe()),
    };

    let stream = tokio_stream::iter(backlog)
        .chain(subscriber.into_stream())
        .map(|record| {
            Event::default()
                .event(record.event.kind())
                .id(record.sequence.to_string())
                .json_data(&record)
        });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub async fn transfer_handler(
    State(service): State<Arc<LedgerService>>,
    Caller(caller): Caller,
    payload: Result<Json<TransferRequest>, JsonRejection>,
) -> ApiResult<Vec<EventRecord>> {
    let request = body(payload)?;
    info!("Transfer request from {} to {}: {}", caller, request.to, request.amount);
    Ok(success(
        service.transfer(&caller, &request.to, request.amount).await?,
    ))
}

pub async fn faucet_handler(
    State(service): State<Arc<LedgerService>>,
    Caller(caller): Caller,
) -> ApiResult<Vec<EventRecord>> {
    info!("Faucet request from {}", caller);
    Ok(success(service.faucet(&caller).await?))
}

pub async fn faucet_amount_handler(
    State(service): State<Arc<LedgerService>>,
    Caller(caller): Caller,
    payload: Result<Json<FaucetAmountRequest>, JsonRejection>,
) -> ApiResult<Vec<EventRecord>> {
    let request = body(payload)?;
    Ok(success(
        service.set_faucet_amount(&caller, request.amount).await?,
    ))
}

pub async fn waiting_period_handler(
    State(service): State<Arc<LedgerService>>,
    Caller(caller): Caller,
    payload: Result<Json<WaitingPeriodRequest>, JsonRejection>,
) -> ApiResult<Vec<EventRecord>> {
    let request = body(payload)?;
    Ok(success(
        service
            .set_faucet_waiting_period(&caller, Duration::from_secs(request.seconds))
            .await?,
    ))
}

pub async fn transfer_limit_handler(
    State(service): State<Arc<LedgerService>>,
    Caller(caller): Caller,
    payload: Result<Json<TransferLimitRequest>, JsonRejection>,
) -> ApiResult<Vec<EventRecord>> {
    let request = body(payload)?;
    Ok(success(
        service.set_max_transfer_limit(&caller, request.limit).await?,
    ))
}

pub async fn ownership_handler(
    State(service): State<Arc<LedgerService>>,
    Caller(caller): Caller,
    payload: Result<Json<OwnershipRequest>, JsonRejection>,
) -> ApiResult<Vec<EventRecord>> {
    let request = body(payload)?;
    info!("Ownership transfer requested by {} to {}", caller, request.new_owner);
    Ok(success(
        service.transfer_ownership(&caller, &request.new_owner).await?,
    ))
}

pub async fn metrics_handler(
    State(service): State<Arc<LedgerService>>,
) -> NodeResult<impl IntoResponse> {
    let text = service.metrics().gather()?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        text,
    ))
}

pub fn build_router(service: Arc<LedgerService>, options: ApiOptions) -> Router {
    let mut app = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/api/status", get(status_handler))
        .route("/api/accounts/:address", get(account_handler))
        .route("/api/events", get(events_handler))
        .route("/api/events/stream", get(event_stream_handler))
        .route("/api/transfer", post(transfer_handler))
        .route("/api/faucet", post(faucet_handler))
        .route("/api/admin/faucet-amount", post(faucet_amount_handler))
        .route("/api/admin/faucet-waiting-period", post(waiting_period_handler))
        .route("/api/admin/max-transfer-limit", post(transfer_limit_handler))
        .route("/api/admin/owner", post(ownership_handler));

    if options.metrics_enabled {
        app = app.route("/metrics", get(metrics_handler));
    }

    let mut app = app.with_state(service).layer(TraceLayer::new_for_http());

    if options.cors_enabled {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        app = app.layer(cors);
        info!("CORS enabled");
    }

    app
}

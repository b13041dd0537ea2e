use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use uuid::Uuid;

use crate::detection::signals::{self, RequestMeta};
use crate::domain::transaction::{
    HistoryPage, HistoryQuery, InitiateOutcome, InitiatePaymentRequest, ProcessOutcome,
    ProcessPaymentRequest, TransactionSnapshot,
};
use crate::error::ApiError;
use crate::http::middleware::auth::AuthUser;
use crate::AppState;

pub async fn initiate(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    headers: HeaderMap,
    Json(req): Json<InitiatePaymentRequest>,
) -> Result<Response, ApiError> {
    let ip = signals::client_ip(&headers);
    let meta = RequestMeta::from_headers(&headers, ip, "/payment/initiate".into(), "POST".into());
    let outcome = state.payment_service.initiate(user.id, meta, req).await?;

    Ok(match outcome {
        InitiateOutcome::Admitted(body) => (StatusCode::OK, Json(body)).into_response(),
        InitiateOutcome::VerificationRequired(body) => (StatusCode::OK, Json(body)).into_response(),
        InitiateOutcome::BotDetected(body) => (StatusCode::BAD_REQUEST, Json(body)).into_response(),
        InitiateOutcome::Blocklisted(body) => (StatusCode::FORBIDDEN, Json(body)).into_response(),
    })
}

pub async fn process(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<ProcessPaymentRequest>,
) -> Result<Response, ApiError> {
    let outcome = state.payment_service.process(user.id, req).await?;

    Ok(match outcome {
        ProcessOutcome::Outstanding(body) => (StatusCode::OK, Json(body)).into_response(),
        ProcessOutcome::Finalized(body) => (StatusCode::OK, Json(body)).into_response(),
    })
}

pub async fn status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<TransactionSnapshot>, ApiError> {
    let snapshot = state.payment_service.status(user.id, transaction_id).await?;
    Ok(Json(snapshot))
}

pub async fn history(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryPage>, ApiError> {
    let page = state.payment_service.history(user.id, query).await?;
    Ok(Json(page))
}

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::domain::event::SuspiciousEvent;
use crate::error::ApiError;
use crate::http::middleware::auth::AuthUser;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub skip: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct LogsPage {
    pub items: Vec<SuspiciousEvent>,
    pub total: i64,
}

#[derive(Debug, Deserialize)]
pub struct BlockTarget {
    pub ip: Option<String>,
    pub user_id: Option<Uuid>,
}

fn page_bounds(query: &LogsQuery) -> (i64, i64) {
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let skip = query.skip.unwrap_or(0).max(0);
    (limit, skip)
}

pub async fn logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<LogsPage>, ApiError> {
    let (limit, skip) = page_bounds(&query);
    let q = query.q.as_deref().filter(|q| !q.is_empty());
    let items = state.suspicious_repo.list(q, limit, skip).await?;
    let total = state.suspicious_repo.count(q).await?;
    Ok(Json(LogsPage { items, total }))
}

pub async fn block(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Json(target): Json<BlockTarget>,
) -> Result<Response, ApiError> {
    if target.ip.is_none() && target.user_id.is_none() {
        return Err(ApiError::validation("provide ip or user_id"));
    }
    let entry = state
        .block_list_repo
        .insert(target.ip.as_deref(), target.user_id)
        .await?;
    tracing::info!(admin = %admin.id, ip = ?target.ip, user_id = ?target.user_id, "block list entry added");
    Ok((StatusCode::CREATED, Json(entry)).into_response())
}

pub async fn unblock(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Json(target): Json<BlockTarget>,
) -> Result<Response, ApiError> {
    if target.ip.is_none() && target.user_id.is_none() {
        return Err(ApiError::validation("provide ip or user_id"));
    }
    let removed = state
        .block_list_repo
        .remove(target.ip.as_deref(), target.user_id)
        .await?;
    tracing::info!(admin = %admin.id, ip = ?target.ip, user_id = ?target.user_id, removed, "block list entry removed");
    Ok(Json(json!({ "message": "Unblocked", "removed": removed })).into_response())
}

pub async fn user_logs(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<LogsPage>, ApiError> {
    let (limit, skip) = page_bounds(&query);
    let items = state.suspicious_repo.list_for_user(user.id, limit, skip).await?;
    let total = state.suspicious_repo.count_for_user(user.id).await?;
    Ok(Json(LogsPage { items, total }))
}

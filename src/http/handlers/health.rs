use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::json;

use crate::AppState;

pub async fn basic() -> Response {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
    .into_response()
}

pub async fn detailed(State(state): State<AppState>) -> Response {
    let database = check_database(&state).await;
    let redis = check_redis(&state).await;
    let ml_service = state.ml_scorer.status().await;
    let queue = state.rescore_queue.status().await;

    let db_ok = database["status"] == "healthy";
    let redis_ok = redis["status"] == "healthy";
    let healthy = db_ok && redis_ok;

    let body = json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "timestamp": Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
        "checks": {
            "database": database,
            "redis": redis,
            "ml_service": ml_service,
            "queue": queue,
        },
    });

    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(body)).into_response()
}

async fn check_database(state: &AppState) -> serde_json::Value {
    match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => json!({ "status": "healthy" }),
        Err(e) => json!({ "status": "unhealthy", "error": e.to_string() }),
    }
}

async fn check_redis(state: &AppState) -> serde_json::Value {
    match state.redis_client.get_multiplexed_async_connection().await {
        Ok(mut conn) => {
            let pong: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;
            match pong {
                Ok(_) => json!({ "status": "healthy" }),
                Err(e) => json!({ "status": "unhealthy", "error": e.to_string() }),
            }
        }
        Err(e) => json!({ "status": "unhealthy", "error": e.to_string() }),
    }
}

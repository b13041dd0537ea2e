use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use redis::AsyncCommands;

use crate::detection::signals::client_ip;
use crate::error::ApiError;

#[derive(Clone)]
pub struct RateLimitState {
    pub redis_client: redis::Client,
    pub scope: &'static str,
    pub window_secs: u64,
    pub max_requests: i64,
}

// Fixed window per ip and scope. Redis being down fails open.
pub async fn enforce(
    State(state): State<RateLimitState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let ip = client_ip(request.headers());
    let bucket = chrono::Utc::now().timestamp() as u64 / state.window_secs.max(1);
    let key = format!("rate:{}:{}:{}", state.scope, ip, bucket);

    if let Ok(mut conn) = state.redis_client.get_multiplexed_async_connection().await {
        let count: i64 = conn.incr(&key, 1).await.unwrap_or(1);
        let _: bool = conn
            .expire(&key, (state.window_secs * 2) as i64)
            .await
            .unwrap_or(false);
        if count > state.max_requests {
            tracing::warn!(%ip, scope = state.scope, count, "rate limit exceeded");
            return ApiError::RateLimited.into_response();
        }
    }

    next.run(request).await
}

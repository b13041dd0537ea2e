use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::detection::signals::{self, client_ip};
use crate::domain::event::{NewSuspiciousEvent, SuspiciousReason};
use crate::error::ApiError;
use crate::http::middleware::auth::AuthUser;
use crate::repo::block_list_repo::BlockListRepo;
use crate::repo::suspicious_events_repo::SuspiciousEventsRepo;
use crate::service::geo::GeoResolver;
use crate::service::payment_service::record_suspicious;
use crate::service::realtime::RealtimeEmitter;

#[derive(Clone)]
pub struct ScreeningState {
    pub block_list_repo: BlockListRepo,
    pub suspicious_repo: SuspiciousEventsRepo,
    pub emitter: RealtimeEmitter,
    pub geo: GeoResolver,
    pub log_threshold: f64,
}

fn lite_score(headless: bool, missing_js: bool, geo_mismatch: bool, suspicious_ua: bool) -> f64 {
    let mut score: f64 = 0.0;
    if headless {
        score += 0.3;
    }
    if missing_js {
        score += 0.2;
    }
    if geo_mismatch {
        score += 0.2;
    }
    if suspicious_ua {
        score += 0.2;
    }
    score.min(1.0)
}

// Header-only screen for routes outside the payment pipeline. The full
// scorer never runs here; anything above the log threshold is recorded
// and the request continues.
pub async fn screen(
    State(state): State<ScreeningState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let headers = request.headers();
    let ip = client_ip(headers);
    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let path = request.uri().path().to_string();
    let method = request.method().to_string();
    let user_id = request.extensions().get::<AuthUser>().map(|u| u.id);

    let headless = signals::is_headless_ua(&user_agent);
    let suspicious_ua = signals::is_suspicious_ua(&user_agent);
    let missing_js = headers.get("x-js-ok").and_then(|v| v.to_str().ok()) != Some("1");

    let expected_country = headers
        .get("x-expected-country")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let country = state.geo.lookup(&ip).await.country;
    let geo_mismatch = signals::is_geo_mismatch(expected_country.as_deref(), country.as_deref());

    let score = lite_score(headless, missing_js, geo_mismatch, suspicious_ua);

    match state.block_list_repo.is_blocked(&ip, user_id).await {
        Ok(true) => {
            record_suspicious(
                &state.suspicious_repo,
                &state.emitter,
                NewSuspiciousEvent {
                    ip,
                    user_id,
                    user_agent,
                    path,
                    method,
                    reason: SuspiciousReason::Blocklist,
                    score: Some(score),
                    meta: json!({ "country": country, "expected_country": expected_country }),
                },
            )
            .await;
            return ApiError::Authorization("request blocked".into()).into_response();
        }
        Ok(false) => {}
        Err(e) => {
            tracing::warn!(error = %e, "block list check failed, continuing");
        }
    }

    if score >= state.log_threshold {
        record_suspicious(
            &state.suspicious_repo,
            &state.emitter,
            NewSuspiciousEvent {
                ip,
                user_id,
                user_agent,
                path,
                method,
                reason: SuspiciousReason::SuspectedBot,
                score: Some(score),
                meta: json!({
                    "headless": headless,
                    "missing_js": missing_js,
                    "geo_mismatch": geo_mismatch,
                    "suspicious_ua": suspicious_ua,
                }),
            },
        )
        .await;
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lite_score_sums_and_caps() {
        assert_eq!(lite_score(false, false, false, false), 0.0);
        assert!((lite_score(true, false, false, false) - 0.3).abs() < 1e-9);
        assert!((lite_score(false, true, true, false) - 0.4).abs() < 1e-9);
        assert!((lite_score(true, true, true, true) - 0.9).abs() < 1e-9);
    }

    #[test]
    fn clean_browser_stays_below_the_log_threshold() {
        assert!(lite_score(false, false, false, false) < 0.3);
        assert!(lite_score(false, true, false, false) < 0.3);
    }
}

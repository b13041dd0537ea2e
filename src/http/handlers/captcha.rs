use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::detection::signals::client_ip;
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CaptchaVerifyRequest {
    pub token: String,
    #[serde(default)]
    pub provider: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CaptchaVerifyResponse {
    pub success: bool,
    pub provider: String,
}

pub async fn verify(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CaptchaVerifyRequest>,
) -> Result<Json<CaptchaVerifyResponse>, ApiError> {
    if req.token.is_empty() {
        return Err(ApiError::validation("token is required"));
    }

    let provider = req.provider.as_deref().unwrap_or("recaptcha");
    match provider {
        "recaptcha" => {
            let ip = client_ip(&headers);
            let success = state
                .captcha
                .verify_recaptcha(&req.token, Some(&ip))
                .await?;
            Ok(Json(CaptchaVerifyResponse {
                success,
                provider: provider.to_string(),
            }))
        }
        other => Err(ApiError::validation_with(
            "unsupported captcha provider",
            json!({ "provider": other }),
        )),
    }
}

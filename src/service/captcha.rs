use anyhow::Result;
use serde_json::Value;
use std::time::Duration;

use crate::config::AppConfig;

const RECAPTCHA_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

#[derive(Clone)]
pub struct CaptchaClient {
    pub secret: String,
    pub client: reqwest::Client,
}

impl CaptchaClient {
    pub fn new(cfg: &AppConfig) -> Self {
        CaptchaClient {
            secret: cfg.recaptcha_secret.clone(),
            client: reqwest::Client::new(),
        }
    }

    pub async fn verify_recaptcha(&self, token: &str, remote_ip: Option<&str>) -> Result<bool> {
        let mut form = vec![("secret", self.secret.as_str()), ("response", token)];
        if let Some(ip) = remote_ip {
            form.push(("remoteip", ip));
        }

        let resp = self
            .client
            .post(RECAPTCHA_VERIFY_URL)
            .form(&form)
            .timeout(Duration::from_secs(5))
            .send()
            .await?;

        let body: Value = resp.json().await?;
        Ok(body.get("success").and_then(Value::as_bool).unwrap_or(false))
    }
}

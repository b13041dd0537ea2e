use serde_json::Value;
use std::time::Duration;

use crate::config::AppConfig;
use crate::domain::transaction::GeoInfo;

#[derive(Clone)]
pub struct GeoResolver {
    pub api_url: String,
    pub timeout: Duration,
    pub client: reqwest::Client,
}

fn is_local(ip: &str) -> bool {
    ip == "127.0.0.1" || ip == "::1" || ip.starts_with("10.") || ip.starts_with("192.168.")
}

impl GeoResolver {
    pub fn new(cfg: &AppConfig) -> Self {
        GeoResolver {
            api_url: cfg.geo_api_url.clone(),
            timeout: Duration::from_millis(cfg.geo_timeout_ms),
            client: reqwest::Client::new(),
        }
    }

    // Lookup failures are neutral: scoring proceeds without a country.
    pub async fn lookup(&self, ip: &str) -> GeoInfo {
        if self.api_url.is_empty() || is_local(ip) {
            return GeoInfo::default();
        }

        let url = format!("{}{}", self.api_url, ip);
        match self.client.get(&url).timeout(self.timeout).send().await {
            Ok(r) if r.status().is_success() => {
                let body: Value = r.json().await.unwrap_or_default();
                GeoInfo {
                    country: body
                        .get("countryCode")
                        .or_else(|| body.get("country"))
                        .and_then(Value::as_str)
                        .map(String::from),
                    city: body.get("city").and_then(Value::as_str).map(String::from),
                    timezone: body
                        .get("timezone")
                        .and_then(Value::as_str)
                        .map(String::from),
                }
            }
            Ok(r) => {
                tracing::warn!(status = %r.status(), "geo lookup rejected");
                GeoInfo::default()
            }
            Err(e) => {
                tracing::warn!(error = %e, "geo lookup failed");
                GeoInfo::default()
            }
        }
    }
}

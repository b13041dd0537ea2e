use anyhow::{bail, Result};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::config::AppConfig;
use crate::detection::signals::ScoreFeatures;
use crate::detection::score::clamp01;
use crate::ml::{MlScorer, MlServiceStatus};

struct HealthState {
    healthy: bool,
    checked_at: Option<Instant>,
}

pub struct HttpMlScorer {
    pub base_url: String,
    pub timeout: Duration,
    pub health_timeout: Duration,
    pub health_interval: Duration,
    pub client: reqwest::Client,
    health: Arc<RwLock<HealthState>>,
}

impl HttpMlScorer {
    pub fn new(cfg: &AppConfig) -> Self {
        HttpMlScorer {
            base_url: cfg.ml_service_base.clone(),
            timeout: Duration::from_millis(cfg.ml_timeout_ms),
            health_timeout: Duration::from_millis(cfg.ml_health_timeout_ms),
            health_interval: Duration::from_secs(cfg.ml_health_interval_secs),
            client: reqwest::Client::new(),
            health: Arc::new(RwLock::new(HealthState {
                healthy: false,
                checked_at: None,
            })),
        }
    }

    // Probes at most once per interval; predict failures shorten the
    // effective cooldown by marking the service unhealthy immediately.
    async fn healthy(&self) -> bool {
        {
            let state = self.health.read().await;
            if let Some(checked_at) = state.checked_at {
                if checked_at.elapsed() <= self.health_interval {
                    return state.healthy;
                }
            }
        }

        let healthy = match self
            .client
            .get(format!("{}/health", self.base_url))
            .timeout(self.health_timeout)
            .send()
            .await
        {
            Ok(r) => r.status().is_success(),
            Err(e) => {
                tracing::warn!(error = %e, "ml health probe failed");
                false
            }
        };
        self.mark(healthy).await;
        healthy
    }

    async fn mark(&self, healthy: bool) {
        let mut state = self.health.write().await;
        state.healthy = healthy;
        state.checked_at = Some(Instant::now());
    }
}

pub fn parse_prediction(body: &Value) -> Option<f64> {
    if let Some(score) = body.get("score").and_then(Value::as_f64) {
        return Some(score);
    }
    if let Some(probability) = body.get("probability").and_then(Value::as_f64) {
        return Some(probability);
    }
    if let Some(first) = body.as_array().and_then(|a| a.first()).and_then(Value::as_f64) {
        return Some(first);
    }
    None
}

#[async_trait::async_trait]
impl MlScorer for HttpMlScorer {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn predict(&self, features: &ScoreFeatures) -> Result<f64> {
        if !self.healthy().await {
            bail!("ml service unhealthy");
        }

        let resp = self
            .client
            .post(format!("{}/predict", self.base_url))
            .json(features)
            .timeout(self.timeout)
            .send()
            .await;

        match resp {
            Ok(r) if r.status().is_success() => {
                let body: Value = r.json().await.unwrap_or_default();
                match parse_prediction(&body) {
                    Some(score) => {
                        self.mark(true).await;
                        Ok(clamp01(score))
                    }
                    None => {
                        self.mark(false).await;
                        bail!("ml service returned unrecognized payload")
                    }
                }
            }
            Ok(r) => {
                self.mark(false).await;
                bail!("ml service returned HTTP {}", r.status().as_u16())
            }
            Err(e) => {
                self.mark(false).await;
                Err(e.into())
            }
        }
    }

    async fn status(&self) -> MlServiceStatus {
        let state = self.health.read().await;
        MlServiceStatus {
            healthy: state.healthy,
            last_checked_secs_ago: state.checked_at.map(|t| t.elapsed().as_secs()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_known_prediction_shapes() {
        assert_eq!(parse_prediction(&json!({"score": 0.42})), Some(0.42));
        assert_eq!(parse_prediction(&json!({"probability": 0.9})), Some(0.9));
        assert_eq!(parse_prediction(&json!([0.7, 0.1])), Some(0.7));
        assert_eq!(parse_prediction(&json!({"label": "bot"})), None);
        assert_eq!(parse_prediction(&json!([])), None);
    }
}

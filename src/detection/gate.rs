use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::detection::signals::ScoreFeatures;

pub const ML_REASON_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy)]
pub struct GateThresholds {
    pub block: f64,
    pub verify: f64,
    pub log: f64,
}

impl Default for GateThresholds {
    fn default() -> Self {
        GateThresholds {
            block: 0.6,
            verify: 0.3,
            log: 0.3,
        }
    }
}

impl GateThresholds {
    pub fn from_config(cfg: &AppConfig) -> Self {
        GateThresholds {
            block: cfg.block_threshold,
            verify: cfg.verify_threshold,
            log: cfg.log_threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateOutcome {
    Allow,
    RequireVerification,
    Block,
}

pub fn decide(score: f64, thresholds: &GateThresholds) -> GateOutcome {
    if score >= thresholds.block {
        GateOutcome::Block
    } else if score >= thresholds.verify {
        GateOutcome::RequireVerification
    } else {
        GateOutcome::Allow
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    HeadlessBrowser,
    MissingJsChallenge,
    RapidPurchase,
    MultipleDevices,
    UnusualTiming,
    SuspiciousPattern,
    GeoMismatch,
    SuspiciousUserAgent,
    MlModelHighRisk,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::HeadlessBrowser => "headless_browser",
            ReasonCode::MissingJsChallenge => "missing_js_challenge",
            ReasonCode::RapidPurchase => "rapid_purchase",
            ReasonCode::MultipleDevices => "multiple_devices",
            ReasonCode::UnusualTiming => "unusual_timing",
            ReasonCode::SuspiciousPattern => "suspicious_pattern",
            ReasonCode::GeoMismatch => "geo_mismatch",
            ReasonCode::SuspiciousUserAgent => "suspicious_user_agent",
            ReasonCode::MlModelHighRisk => "ml_model_high_risk",
        }
    }
}

// Recomputed wholesale on every scoring pass; order is part of the contract.
pub fn detection_reasons(features: &ScoreFeatures, ml_score: Option<f64>) -> Vec<ReasonCode> {
    let mut reasons = Vec::new();
    if features.headless {
        reasons.push(ReasonCode::HeadlessBrowser);
    }
    if features.missing_js {
        reasons.push(ReasonCode::MissingJsChallenge);
    }
    if features.rapid_purchase {
        reasons.push(ReasonCode::RapidPurchase);
    }
    if features.multiple_devices {
        reasons.push(ReasonCode::MultipleDevices);
    }
    if features.unusual_timing {
        reasons.push(ReasonCode::UnusualTiming);
    }
    if features.suspicious_pattern {
        reasons.push(ReasonCode::SuspiciousPattern);
    }
    if features.geo_mismatch {
        reasons.push(ReasonCode::GeoMismatch);
    }
    if features.suspicious_ua {
        reasons.push(ReasonCode::SuspiciousUserAgent);
    }
    if ml_score.is_some_and(|s| s >= ML_REASON_THRESHOLD) {
        reasons.push(ReasonCode::MlModelHighRisk);
    }
    reasons
}

pub fn reason_strings(features: &ScoreFeatures, ml_score: Option<f64>) -> Vec<String> {
    detection_reasons(features, ml_score)
        .iter()
        .map(|r| r.as_str().to_string())
        .collect()
}

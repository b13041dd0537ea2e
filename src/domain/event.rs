use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspiciousReason {
    Blocklist,
    PaymentBlocked,
    SuspectedBot,
    BotDetected,
    MlHighRisk,
    PaymentCompleted,
    PaymentFailed,
}

impl SuspiciousReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuspiciousReason::Blocklist => "blocklist",
            SuspiciousReason::PaymentBlocked => "payment_blocked",
            SuspiciousReason::SuspectedBot => "suspected_bot",
            SuspiciousReason::BotDetected => "bot_detected",
            SuspiciousReason::MlHighRisk => "ml_high_risk",
            SuspiciousReason::PaymentCompleted => "payment_completed",
            SuspiciousReason::PaymentFailed => "payment_failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SuspiciousEvent {
    pub id: i64,
    pub ip: String,
    pub user_id: Option<Uuid>,
    pub user_agent: String,
    pub path: String,
    pub method: String,
    pub reason: String,
    pub score: Option<f64>,
    pub meta: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSuspiciousEvent {
    pub ip: String,
    pub user_id: Option<Uuid>,
    pub user_agent: String,
    pub path: String,
    pub method: String,
    pub reason: SuspiciousReason,
    pub score: Option<f64>,
    pub meta: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockEntry {
    pub id: i64,
    pub ip: Option<String>,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuspiciousBroadcast {
    pub id: i64,
    pub ip: String,
    pub path: String,
    pub score: Option<f64>,
    pub reason: String,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentBroadcast {
    pub transaction_id: Uuid,
    pub status: String,
    pub bot_score: f64,
    pub amount: f64,
    pub currency: String,
    pub platform: String,
    pub ip: String,
    pub user_id: Uuid,
}

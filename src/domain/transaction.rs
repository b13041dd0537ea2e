use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ticketmaster,
    Eventbrite,
    Stubhub,
    Seatgeek,
    Vividseats,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ticketmaster => "ticketmaster",
            Platform::Eventbrite => "eventbrite",
            Platform::Stubhub => "stubhub",
            Platform::Seatgeek => "seatgeek",
            Platform::Vividseats => "vividseats",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Inr,
    Usd,
    Eur,
    Gbp,
    Cad,
    Aud,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Inr => "INR",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Cad => "CAD",
            Currency::Aud => "AUD",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    Paypal,
    ApplePay,
    GooglePay,
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::DebitCard => "debit_card",
            PaymentMethod::Paypal => "paypal",
            PaymentMethod::ApplePay => "apple_pay",
            PaymentMethod::GooglePay => "google_pay",
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Blocked,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Processing => "processing",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Blocked => "blocked",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed | TransactionStatus::Failed | TransactionStatus::Blocked
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStep {
    BotDetection,
    Captcha,
    PhoneVerification,
    EmailVerification,
    IdentityVerification,
    PaymentVerification,
}

impl VerificationStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStep::BotDetection => "bot_detection",
            VerificationStep::Captcha => "captcha",
            VerificationStep::PhoneVerification => "phone_verification",
            VerificationStep::EmailVerification => "email_verification",
            VerificationStep::IdentityVerification => "identity_verification",
            VerificationStep::PaymentVerification => "payment_verification",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationAttempt {
    pub step: VerificationStep,
    pub passed: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub details: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeoInfo {
    pub country: Option<String>,
    pub city: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskFactors {
    pub headless_browser: bool,
    pub missing_js_challenge: bool,
    pub suspicious_user_agent: bool,
    pub rapid_purchase: bool,
    pub multiple_devices: bool,
    pub device_fingerprint_match: bool,
    pub unusual_timing: bool,
    pub suspicious_pattern: bool,
    pub geo_mismatch: bool,
    pub payment_behavior: bool,
    pub heuristic_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ml_score: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub session_id: String,
    pub ticket_id: String,
    pub platform: Platform,
    pub amount: f64,
    pub currency: Currency,
    pub status: TransactionStatus,
    pub bot_score: f64,
    pub detection_reasons: Vec<String>,
    pub risk_factors: Value,
    pub verification_steps: Vec<VerificationAttempt>,
    pub payment_method: PaymentMethod,
    pub ip: String,
    pub user_agent: String,
    pub geo: GeoInfo,
    pub device_fingerprint: String,
    pub metadata: Value,
    pub ml_processed: Option<bool>,
    pub ml_score: Option<f64>,
    pub ml_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InitiatePaymentRequest {
    pub platform: Platform,
    pub ticket_id: String,
    pub amount: f64,
    pub currency: Option<Currency>,
    pub payment_method: PaymentMethod,
    pub session_id: Option<String>,
    pub ticket_type: Option<String>,
    pub device_fingerprint: Option<String>,
    pub geo: Option<GeoInfo>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessPaymentRequest {
    pub transaction_id: Uuid,
    pub verification_data: Option<VerificationData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerificationData {
    pub step: VerificationStep,
    pub passed: bool,
    #[serde(default)]
    pub details: Value,
}

#[derive(Debug, Serialize)]
pub struct InitiateAccepted {
    pub message: String,
    pub transaction_id: Uuid,
    pub session_id: String,
    pub status: TransactionStatus,
    pub bot_score: f64,
    pub ml_processing: String,
}

#[derive(Debug, Serialize)]
pub struct InitiateVerificationRequired {
    pub message: String,
    pub reason: String,
    pub transaction_id: Uuid,
    pub bot_score: f64,
    pub requires_verification: bool,
    pub verification_steps: Vec<VerificationStep>,
}

#[derive(Debug, Serialize)]
pub struct InitiateBlocked {
    pub error: String,
    pub reason: String,
    pub bot_score: f64,
    pub detection_reasons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<Uuid>,
    pub requires_verification: bool,
    pub verification_steps: Vec<VerificationStep>,
}

#[derive(Debug, Serialize)]
pub struct BlocklistedResponse {
    pub error: String,
    pub reason: String,
}

#[derive(Debug)]
pub enum InitiateOutcome {
    Admitted(InitiateAccepted),
    VerificationRequired(InitiateVerificationRequired),
    BotDetected(InitiateBlocked),
    Blocklisted(BlocklistedResponse),
}

#[derive(Debug, Serialize)]
pub struct PaymentResult {
    pub success: bool,
    pub amount: f64,
    pub currency: Currency,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct StepsOutstanding {
    pub message: String,
    pub transaction_id: Uuid,
    pub completed_steps: Vec<VerificationStep>,
    pub required_steps: Vec<VerificationStep>,
}

#[derive(Debug, Serialize)]
pub struct PaymentFinalized {
    pub message: String,
    pub transaction_id: Uuid,
    pub status: TransactionStatus,
    pub bot_score: f64,
    pub detection_reasons: Vec<String>,
    pub payment: PaymentResult,
}

#[derive(Debug)]
pub enum ProcessOutcome {
    Outstanding(StepsOutstanding),
    Finalized(PaymentFinalized),
}

#[derive(Debug, Serialize)]
pub struct TransactionSnapshot {
    pub transaction_id: Uuid,
    pub status: TransactionStatus,
    pub amount: f64,
    pub currency: Currency,
    pub platform: Platform,
    pub ticket_id: String,
    pub bot_score: f64,
    pub detection_reasons: Vec<String>,
    pub verification_steps: Vec<VerificationAttempt>,
    pub ml_processed: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Transaction> for TransactionSnapshot {
    fn from(tx: &Transaction) -> Self {
        TransactionSnapshot {
            transaction_id: tx.id,
            status: tx.status,
            amount: tx.amount,
            currency: tx.currency,
            platform: tx.platform,
            ticket_id: tx.ticket_id.clone(),
            bot_score: tx.bot_score,
            detection_reasons: tx.detection_reasons.clone(),
            verification_steps: tx.verification_steps.clone(),
            ml_processed: tx.ml_processed,
            created_at: tx.created_at,
            updated_at: tx.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub platform: Option<Platform>,
    pub status: Option<TransactionStatus>,
}

#[derive(Debug, Serialize)]
pub struct HistoryItem {
    pub transaction_id: Uuid,
    pub ticket_id: String,
    pub platform: Platform,
    pub amount: f64,
    pub currency: Currency,
    pub status: TransactionStatus,
    pub bot_score: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct HistoryPage {
    pub payments: Vec<HistoryItem>,
    pub total: i64,
    pub total_pages: i64,
    pub current_page: u32,
    pub total_amount: f64,
}

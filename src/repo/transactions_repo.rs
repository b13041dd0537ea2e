use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::transaction::{
    Currency, GeoInfo, PaymentMethod, Platform, Transaction, TransactionStatus,
    VerificationAttempt,
};

pub struct TransactionInput {
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
}

#[derive(Clone)]
pub struct TransactionsRepo {
    pub pool: PgPool,
}

impl TransactionsRepo {
    pub async fn insert(&self, input: &TransactionInput) -> Result<Transaction> {
        let row = sqlx::query(
            r#"
            INSERT INTO transactions (
                id, user_id, session_id, ticket_id, platform, amount, currency,
                status, bot_score, detection_reasons, risk_factors, verification_steps,
                payment_method, ip, user_agent, geo, device_fingerprint, metadata
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7,
                $8, $9, $10, $11, $12,
                $13, $14, $15, $16, $17, $18
            )
            RETURNING *
            "#,
        )
        .bind(input.id)
        .bind(input.user_id)
        .bind(&input.session_id)
        .bind(&input.ticket_id)
        .bind(input.platform.as_str())
        .bind(input.amount)
        .bind(input.currency.as_str())
        .bind(input.status.as_str())
        .bind(input.bot_score)
        .bind(&input.detection_reasons)
        .bind(&input.risk_factors)
        .bind(serde_json::to_value(&input.verification_steps)?)
        .bind(input.payment_method.as_str())
        .bind(&input.ip)
        .bind(&input.user_agent)
        .bind(serde_json::to_value(&input.geo)?)
        .bind(&input.device_fingerprint)
        .bind(&input.metadata)
        .fetch_one(&self.pool)
        .await?;

        Ok(map_transaction(&row))
    }

    pub async fn find_owned(&self, id: Uuid, user_id: Uuid) -> Result<Option<Transaction>> {
        let row = sqlx::query("SELECT * FROM transactions WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| map_transaction(&r)))
    }

    pub async fn find_active_owned(&self, id: Uuid, user_id: Uuid) -> Result<Option<Transaction>> {
        let row = sqlx::query(
            r#"
            SELECT * FROM transactions
            WHERE id = $1 AND user_id = $2 AND status IN ('pending', 'processing')
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| map_transaction(&r)))
    }

    // Atomic append so two concurrent verification submissions both land.
    pub async fn append_verification_step(
        &self,
        id: Uuid,
        user_id: Uuid,
        attempt: &VerificationAttempt,
    ) -> Result<Option<Transaction>> {
        let row = sqlx::query(
            r#"
            UPDATE transactions
            SET verification_steps = verification_steps || $3::jsonb, updated_at = now()
            WHERE id = $1 AND user_id = $2 AND status IN ('pending', 'processing')
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(serde_json::to_value(vec![attempt])?)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| map_transaction(&r)))
    }

    pub async fn count_recent_same_platform(
        &self,
        user_id: Uuid,
        platform: Platform,
        since: DateTime<Utc>,
    ) -> Result<i64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS cnt FROM transactions
            WHERE user_id = $1 AND platform = $2 AND created_at > $3
              AND status IN ('completed', 'processing')
            "#,
        )
        .bind(user_id)
        .bind(platform.as_str())
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("cnt"))
    }

    pub async fn count_recent_other_fingerprints(
        &self,
        user_id: Uuid,
        fingerprint: &str,
        since: DateTime<Utc>,
    ) -> Result<i64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS cnt FROM transactions
            WHERE user_id = $1 AND device_fingerprint <> $2 AND created_at > $3
            "#,
        )
        .bind(user_id)
        .bind(fingerprint)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("cnt"))
    }

    pub async fn fingerprint_seen_since(
        &self,
        fingerprint: &str,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM transactions WHERE device_fingerprint = $1 AND created_at > $2
            ) AS present
            "#,
        )
        .bind(fingerprint)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("present"))
    }

    // Guarded transition out of the active states; terminal rows are
    // never touched again.
    pub async fn finalize(
        &self,
        id: Uuid,
        status: TransactionStatus,
        metadata_patch: Value,
    ) -> Result<Option<Transaction>> {
        let row = sqlx::query(
            r#"
            UPDATE transactions
            SET status = $2, metadata = metadata || $3::jsonb, updated_at = now()
            WHERE id = $1 AND status IN ('pending', 'processing')
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(metadata_patch)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| map_transaction(&r)))
    }

    pub async fn auto_complete_if_pending(&self, id: Uuid, reason: &str) -> Result<bool> {
        let patch = json!({
            "auto_completed": true,
            "auto_completed_at": Utc::now(),
            "reason": reason,
        });
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET status = 'completed', metadata = metadata || $2::jsonb, updated_at = now()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(patch)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn apply_rescore(
        &self,
        id: Uuid,
        score: f64,
        reasons: &[String],
        ml_score: Option<f64>,
    ) -> Result<Option<TransactionStatus>> {
        let row = sqlx::query(
            r#"
            UPDATE transactions
            SET bot_score = $2, detection_reasons = $3, ml_processed = true,
                ml_score = $4, ml_error = NULL,
                risk_factors = risk_factors || $5::jsonb, updated_at = now()
            WHERE id = $1 AND status IN ('pending', 'processing')
            RETURNING status
            "#,
        )
        .bind(id)
        .bind(score)
        .bind(reasons)
        .bind(ml_score)
        .bind(json!({ "ml_score": ml_score }))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| parse_status(r.get("status"))))
    }

    pub async fn mark_rescore_failed(&self, id: Uuid, error: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET ml_processed = false, ml_error = $2, updated_at = now()
            WHERE id = $1 AND status IN ('pending', 'processing')
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn history(
        &self,
        user_id: Uuid,
        platform: Option<Platform>,
        status: Option<TransactionStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM transactions
            WHERE user_id = $1
              AND ($2::text IS NULL OR platform = $2)
              AND ($3::text IS NULL OR status = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(user_id)
        .bind(platform.map(|p| p.as_str()))
        .bind(status.map(|s| s.as_str()))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(map_transaction).collect())
    }

    pub async fn history_count(
        &self,
        user_id: Uuid,
        platform: Option<Platform>,
        status: Option<TransactionStatus>,
    ) -> Result<i64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS cnt FROM transactions
            WHERE user_id = $1
              AND ($2::text IS NULL OR platform = $2)
              AND ($3::text IS NULL OR status = $3)
            "#,
        )
        .bind(user_id)
        .bind(platform.map(|p| p.as_str()))
        .bind(status.map(|s| s.as_str()))
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("cnt"))
    }

    pub async fn total_completed_amount(&self, user_id: Uuid) -> Result<f64> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(amount), 0) AS total FROM transactions
            WHERE user_id = $1 AND status = 'completed'
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("total"))
    }
}

fn map_transaction(r: &PgRow) -> Transaction {
    let verification_steps: Value = r.get("verification_steps");
    let geo: Value = r.get("geo");
    Transaction {
        id: r.get("id"),
        user_id: r.get("user_id"),
        session_id: r.get("session_id"),
        ticket_id: r.get("ticket_id"),
        platform: parse_platform(r.get("platform")),
        amount: r.get("amount"),
        currency: parse_currency(r.get("currency")),
        status: parse_status(r.get("status")),
        bot_score: r.get("bot_score"),
        detection_reasons: r.get("detection_reasons"),
        risk_factors: r.get("risk_factors"),
        verification_steps: serde_json::from_value(verification_steps).unwrap_or_default(),
        payment_method: parse_method(r.get("payment_method")),
        ip: r.get("ip"),
        user_agent: r.get("user_agent"),
        geo: serde_json::from_value(geo).unwrap_or_default(),
        device_fingerprint: r.get("device_fingerprint"),
        metadata: r.get("metadata"),
        ml_processed: r.get("ml_processed"),
        ml_score: r.get("ml_score"),
        ml_error: r.get("ml_error"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

fn parse_status(s: &str) -> TransactionStatus {
    match s {
        "pending" => TransactionStatus::Pending,
        "processing" => TransactionStatus::Processing,
        "completed" => TransactionStatus::Completed,
        "blocked" => TransactionStatus::Blocked,
        _ => TransactionStatus::Failed,
    }
}

fn parse_platform(s: &str) -> Platform {
    match s {
        "eventbrite" => Platform::Eventbrite,
        "stubhub" => Platform::Stubhub,
        "seatgeek" => Platform::Seatgeek,
        "vividseats" => Platform::Vividseats,
        _ => Platform::Ticketmaster,
    }
}

fn parse_currency(s: &str) -> Currency {
    match s {
        "USD" => Currency::Usd,
        "EUR" => Currency::Eur,
        "GBP" => Currency::Gbp,
        "CAD" => Currency::Cad,
        "AUD" => Currency::Aud,
        _ => Currency::Inr,
    }
}

fn parse_method(s: &str) -> PaymentMethod {
    match s {
        "debit_card" => PaymentMethod::DebitCard,
        "paypal" => PaymentMethod::Paypal,
        "apple_pay" => PaymentMethod::ApplePay,
        "google_pay" => PaymentMethod::GooglePay,
        "bank_transfer" => PaymentMethod::BankTransfer,
        _ => PaymentMethod::CreditCard,
    }
}

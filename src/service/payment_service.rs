use chrono::{Duration, Timelike, Utc};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::detection::gate::{self, GateOutcome, GateThresholds};
use crate::detection::score::{heuristic_score, SignalWeights};
use crate::detection::signals::{self, HistorySignals, RequestMeta};
use crate::detection::telemetry::BehaviorTelemetry;
use crate::domain::event::{NewSuspiciousEvent, PaymentBroadcast, SuspiciousBroadcast, SuspiciousReason};
use crate::domain::transaction::{
    BlocklistedResponse, Currency, HistoryItem, HistoryPage, HistoryQuery, InitiateAccepted,
    InitiateBlocked, InitiateOutcome, InitiatePaymentRequest, InitiateVerificationRequired,
    PaymentFinalized, PaymentResult, ProcessOutcome, ProcessPaymentRequest, RiskFactors,
    StepsOutstanding, Transaction, TransactionSnapshot, TransactionStatus, VerificationAttempt,
    VerificationStep,
};
use crate::error::ApiError;
use crate::queue::rescore_queue::RescoreQueue;
use crate::repo::block_list_repo::BlockListRepo;
use crate::repo::suspicious_events_repo::SuspiciousEventsRepo;
use crate::repo::transactions_repo::{TransactionInput, TransactionsRepo};
use crate::service::geo::GeoResolver;
use crate::service::realtime::RealtimeEmitter;
use crate::verification;

#[derive(Clone)]
pub struct PaymentService {
    pub transactions_repo: TransactionsRepo,
    pub suspicious_repo: SuspiciousEventsRepo,
    pub block_list_repo: BlockListRepo,
    pub geo: GeoResolver,
    pub telemetry: Arc<dyn BehaviorTelemetry>,
    pub emitter: RealtimeEmitter,
    pub queue: RescoreQueue,
    pub weights: SignalWeights,
    pub thresholds: GateThresholds,
    pub max_payment_amount: f64,
    pub auto_complete_secs: u64,
    pub simulated_processing_ms: u64,
}

pub async fn record_suspicious(
    repo: &SuspiciousEventsRepo,
    emitter: &RealtimeEmitter,
    event: NewSuspiciousEvent,
) {
    match repo.insert(&event).await {
        Ok(stored) => {
            emitter
                .emit_suspicious(&SuspiciousBroadcast {
                    id: stored.id,
                    ip: stored.ip.clone(),
                    path: stored.path.clone(),
                    score: stored.score,
                    reason: stored.reason.clone(),
                    user_agent: stored.user_agent.clone(),
                })
                .await;
        }
        Err(e) => {
            tracing::warn!(error = %e, reason = event.reason.as_str(), "suspicious event write failed");
        }
    }
}

impl PaymentService {
    pub async fn initiate(
        &self,
        user_id: Uuid,
        meta: RequestMeta,
        req: InitiatePaymentRequest,
    ) -> Result<InitiateOutcome, ApiError> {
        validate_request(&req, self.max_payment_amount)?;

        let now = Utc::now();
        let local_hour = chrono::Local::now().hour();
        let currency = req.currency.unwrap_or(Currency::Inr);
        let fingerprint = req
            .device_fingerprint
            .clone()
            .unwrap_or_else(|| meta.fingerprint());

        let geo = match &req.geo {
            Some(hint) => hint.clone(),
            None => self.geo.lookup(&meta.ip).await,
        };

        let rapid_count = self
            .transactions_repo
            .count_recent_same_platform(user_id, req.platform, now - Duration::minutes(5))
            .await?;
        let device_count = self
            .transactions_repo
            .count_recent_other_fingerprints(user_id, &fingerprint, now - Duration::hours(1))
            .await?;
        let fingerprint_match = self
            .transactions_repo
            .fingerprint_seen_since(&fingerprint, now - Duration::hours(1))
            .await?;
        let history = HistorySignals {
            rapid_purchase: signals::rapid_purchase(rapid_count),
            multiple_devices: signals::multiple_devices(device_count),
            fingerprint_match,
        };

        let behavior = self.telemetry.sample();
        let features = signals::assemble(
            &meta,
            geo.country.as_deref(),
            history,
            behavior,
            req.amount,
            req.platform,
            local_hour,
            now,
        );
        let score = heuristic_score(&features, &self.weights);
        let reasons = gate::reason_strings(&features, None);

        // The block list overrides whatever the scorer said.
        if self
            .block_list_repo
            .is_blocked(&meta.ip, Some(user_id))
            .await?
        {
            record_suspicious(
                &self.suspicious_repo,
                &self.emitter,
                NewSuspiciousEvent {
                    ip: meta.ip.clone(),
                    user_id: Some(user_id),
                    user_agent: meta.user_agent.clone(),
                    path: meta.path.clone(),
                    method: meta.method.clone(),
                    reason: SuspiciousReason::PaymentBlocked,
                    score: Some(1.0),
                    meta: json!({
                        "heuristic_score": score,
                        "detection_reasons": reasons,
                        "platform": req.platform.as_str(),
                        "amount": req.amount,
                    }),
                },
            )
            .await;
            tracing::info!(ip = %meta.ip, %user_id, "payment rejected by block list");
            return Ok(InitiateOutcome::Blocklisted(BlocklistedResponse {
                error: "Payment blocked".to_string(),
                reason: "blocked".to_string(),
            }));
        }

        let decision = gate::decide(score, &self.thresholds);
        let status = match decision {
            GateOutcome::Block => TransactionStatus::Blocked,
            _ => TransactionStatus::Pending,
        };

        let risk_factors = RiskFactors {
            headless_browser: features.headless,
            missing_js_challenge: features.missing_js,
            suspicious_user_agent: features.suspicious_ua,
            rapid_purchase: features.rapid_purchase,
            multiple_devices: features.multiple_devices,
            device_fingerprint_match: features.device_fingerprint_match,
            unusual_timing: features.unusual_timing,
            suspicious_pattern: features.suspicious_pattern,
            geo_mismatch: features.geo_mismatch,
            payment_behavior: features.payment_behavior,
            heuristic_score: score,
            ml_score: None,
        };

        let initial_step = VerificationAttempt {
            step: VerificationStep::BotDetection,
            passed: score < self.thresholds.block,
            timestamp: now,
            details: json!({
                "score": score,
                "reasons": reasons,
                "method": "heuristic",
            }),
        };

        let session_id = req
            .session_id
            .clone()
            .unwrap_or_else(|| generate_session_id(now.timestamp_millis()));

        let tx = self
            .transactions_repo
            .insert(&TransactionInput {
                id: Uuid::new_v4(),
                user_id,
                session_id: session_id.clone(),
                ticket_id: req.ticket_id.clone(),
                platform: req.platform,
                amount: req.amount,
                currency,
                status,
                bot_score: score,
                detection_reasons: reasons.clone(),
                risk_factors: serde_json::to_value(&risk_factors).map_err(anyhow::Error::from)?,
                verification_steps: vec![initial_step],
                payment_method: req.payment_method,
                ip: meta.ip.clone(),
                user_agent: meta.user_agent.clone(),
                geo,
                device_fingerprint: fingerprint,
                metadata: req.metadata.clone().unwrap_or_else(|| json!({})),
            })
            .await?;

        if score >= self.thresholds.log {
            let reason = if decision == GateOutcome::Block {
                SuspiciousReason::BotDetected
            } else {
                SuspiciousReason::SuspectedBot
            };
            record_suspicious(
                &self.suspicious_repo,
                &self.emitter,
                NewSuspiciousEvent {
                    ip: meta.ip.clone(),
                    user_id: Some(user_id),
                    user_agent: meta.user_agent.clone(),
                    path: meta.path.clone(),
                    method: meta.method.clone(),
                    reason,
                    score: Some(score),
                    meta: json!({
                        "transaction_id": tx.id,
                        "detection_reasons": reasons,
                    }),
                },
            )
            .await;
        }

        tracing::info!(
            transaction_id = %tx.id,
            %user_id,
            score,
            outcome = ?decision,
            "payment admission decision"
        );

        match decision {
            GateOutcome::Block => Ok(InitiateOutcome::BotDetected(InitiateBlocked {
                error: "Payment blocked due to suspicious activity".to_string(),
                reason: "bot_detected".to_string(),
                bot_score: score,
                detection_reasons: reasons,
                transaction_id: Some(tx.id),
                requires_verification: true,
                verification_steps: verification::required_steps(score, self.thresholds.block),
            })),
            GateOutcome::RequireVerification => {
                self.queue.enqueue(tx.id, user_id, features).await;
                Ok(InitiateOutcome::VerificationRequired(
                    InitiateVerificationRequired {
                        message: "Additional verification required".to_string(),
                        reason: "medium_risk".to_string(),
                        transaction_id: tx.id,
                        bot_score: score,
                        requires_verification: true,
                        verification_steps: vec![VerificationStep::Captcha],
                    },
                ))
            }
            GateOutcome::Allow => {
                self.queue.enqueue(tx.id, user_id, features).await;
                self.schedule_auto_complete(tx.id);
                Ok(InitiateOutcome::Admitted(InitiateAccepted {
                    message: "Payment initiated successfully".to_string(),
                    transaction_id: tx.id,
                    session_id,
                    status: tx.status,
                    bot_score: score,
                    ml_processing: "queued".to_string(),
                }))
            }
        }
    }

    fn schedule_auto_complete(&self, transaction_id: Uuid) {
        let repo = self.transactions_repo.clone();
        let delay = std::time::Duration::from_secs(self.auto_complete_secs);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match repo
                .auto_complete_if_pending(transaction_id, "timeout_auto_completion")
                .await
            {
                Ok(true) => tracing::info!(%transaction_id, "transaction auto-completed"),
                Ok(false) => {}
                Err(e) => tracing::warn!(%transaction_id, error = %e, "auto-completion failed"),
            }
        });
    }

    pub async fn process(
        &self,
        user_id: Uuid,
        req: ProcessPaymentRequest,
    ) -> Result<ProcessOutcome, ApiError> {
        let not_found = || ApiError::NotFound("Transaction not found or already processed".into());

        let tx = self
            .transactions_repo
            .find_active_owned(req.transaction_id, user_id)
            .await?
            .ok_or_else(not_found)?;

        let tx = match &req.verification_data {
            Some(data) => {
                let attempt = VerificationAttempt {
                    step: data.step,
                    passed: data.passed,
                    timestamp: Utc::now(),
                    details: data.details.clone(),
                };
                self.transactions_repo
                    .append_verification_step(req.transaction_id, user_id, &attempt)
                    .await?
                    .ok_or_else(not_found)?
            }
            None => tx,
        };

        let check = verification::evaluate(tx.bot_score, self.thresholds.block, &tx.verification_steps);
        if !check.satisfied {
            return Ok(ProcessOutcome::Outstanding(StepsOutstanding {
                message: "Additional verification required".to_string(),
                transaction_id: tx.id,
                completed_steps: check.completed,
                required_steps: check.required,
            }));
        }

        let payment = self.simulate_payment(&tx).await;
        let new_status = if payment.success {
            TransactionStatus::Completed
        } else {
            TransactionStatus::Failed
        };

        let final_tx = self
            .transactions_repo
            .finalize(
                tx.id,
                new_status,
                json!({
                    "payment_result": payment,
                    "processed_at": payment.processed_at,
                }),
            )
            .await?
            .ok_or_else(not_found)?;

        let reason = if payment.success {
            SuspiciousReason::PaymentCompleted
        } else {
            SuspiciousReason::PaymentFailed
        };
        record_suspicious(
            &self.suspicious_repo,
            &self.emitter,
            NewSuspiciousEvent {
                ip: final_tx.ip.clone(),
                user_id: Some(user_id),
                user_agent: final_tx.user_agent.clone(),
                path: "/payment/process".to_string(),
                method: "POST".to_string(),
                reason,
                score: Some(final_tx.bot_score),
                meta: json!({
                    "transaction_id": final_tx.id,
                    "amount": final_tx.amount,
                    "success": payment.success,
                }),
            },
        )
        .await;

        self.emitter
            .emit_payment(&PaymentBroadcast {
                transaction_id: final_tx.id,
                status: final_tx.status.as_str().to_string(),
                bot_score: final_tx.bot_score,
                amount: final_tx.amount,
                currency: final_tx.currency.as_str().to_string(),
                platform: final_tx.platform.as_str().to_string(),
                ip: final_tx.ip.clone(),
                user_id,
            })
            .await;

        tracing::info!(
            transaction_id = %final_tx.id,
            success = payment.success,
            "payment finalized"
        );

        Ok(ProcessOutcome::Finalized(PaymentFinalized {
            message: if payment.success {
                "Payment completed successfully".to_string()
            } else {
                "Payment failed".to_string()
            },
            transaction_id: final_tx.id,
            status: final_tx.status,
            bot_score: final_tx.bot_score,
            detection_reasons: final_tx.detection_reasons.clone(),
            payment,
        }))
    }

    async fn simulate_payment(&self, tx: &Transaction) -> PaymentResult {
        tokio::time::sleep(std::time::Duration::from_millis(self.simulated_processing_ms)).await;
        PaymentResult {
            success: tx.amount < self.max_payment_amount,
            amount: tx.amount,
            currency: tx.currency,
            processed_at: Utc::now(),
        }
    }

    pub async fn status(
        &self,
        user_id: Uuid,
        transaction_id: Uuid,
    ) -> Result<TransactionSnapshot, ApiError> {
        let tx = self
            .transactions_repo
            .find_owned(transaction_id, user_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Transaction not found".into()))?;
        Ok(TransactionSnapshot::from(&tx))
    }

    pub async fn history(
        &self,
        user_id: Uuid,
        query: HistoryQuery,
    ) -> Result<HistoryPage, ApiError> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(10).clamp(1, 100) as i64;
        let offset = (page as i64 - 1) * limit;

        let items = self
            .transactions_repo
            .history(user_id, query.platform, query.status, limit, offset)
            .await?;
        let total = self
            .transactions_repo
            .history_count(user_id, query.platform, query.status)
            .await?;
        let total_amount = self
            .transactions_repo
            .total_completed_amount(user_id)
            .await?;

        Ok(HistoryPage {
            payments: items
                .iter()
                .map(|t| HistoryItem {
                    transaction_id: t.id,
                    ticket_id: t.ticket_id.clone(),
                    platform: t.platform,
                    amount: t.amount,
                    currency: t.currency,
                    status: t.status,
                    bot_score: t.bot_score,
                    created_at: t.created_at,
                })
                .collect(),
            total,
            total_pages: (total + limit - 1) / limit,
            current_page: page,
            total_amount,
        })
    }
}

fn generate_session_id(now_ms: i64) -> String {
    let nonce = Uuid::new_v4().simple().to_string();
    format!("sess_{}_{}", now_ms, &nonce[..8])
}

const TICKET_PREFIXES: [&str; 3] = ["STD", "VIP", "PRM"];
const TICKET_VENUES: [&str; 5] = ["TM", "EB", "SH", "SG", "VS"];

pub fn valid_ticket_id(ticket_id: &str) -> bool {
    let mut parts = ticket_id.split('-');
    let (Some(prefix), Some(venue), Some(serial), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    TICKET_PREFIXES.contains(&prefix)
        && TICKET_VENUES.contains(&venue)
        && serial.len() == 5
        && serial.chars().all(|c| c.is_ascii_digit())
}

fn validate_request(req: &InitiatePaymentRequest, max_amount: f64) -> Result<(), ApiError> {
    if !req.amount.is_finite() || req.amount <= 0.0 {
        return Err(ApiError::validation("amount must be positive"));
    }
    if req.amount > max_amount {
        return Err(ApiError::validation_with(
            "amount exceeds the allowed maximum",
            json!({ "max_amount": max_amount }),
        ));
    }
    if ((req.amount * 100.0).round() - req.amount * 100.0).abs() > 1e-6 {
        return Err(ApiError::validation(
            "amount supports at most two decimal places",
        ));
    }
    if !valid_ticket_id(&req.ticket_id) {
        return Err(ApiError::validation_with(
            "ticket_id is not a recognized ticket reference",
            json!({ "expected_format": "(STD|VIP|PRM)-(TM|EB|SH|SG|VS)-NNNNN" }),
        ));
    }
    if let Some(session_id) = &req.session_id {
        if session_id.is_empty() {
            return Err(ApiError::validation("session_id must not be empty"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transaction::{PaymentMethod, Platform};

    fn request(amount: f64, ticket_id: &str) -> InitiatePaymentRequest {
        InitiatePaymentRequest {
            platform: Platform::Ticketmaster,
            ticket_id: ticket_id.to_string(),
            amount,
            currency: None,
            payment_method: PaymentMethod::CreditCard,
            session_id: None,
            ticket_type: None,
            device_fingerprint: None,
            geo: None,
            metadata: None,
        }
    }

    #[test]
    fn ticket_id_format() {
        assert!(valid_ticket_id("STD-TM-12345"));
        assert!(valid_ticket_id("VIP-SG-00001"));
        assert!(valid_ticket_id("PRM-VS-99999"));
        assert!(!valid_ticket_id("STD-TM-1234"));
        assert!(!valid_ticket_id("std-tm-12345"));
        assert!(!valid_ticket_id("STD-XX-12345"));
        assert!(!valid_ticket_id("STD-TM-12345-EXTRA"));
        assert!(!valid_ticket_id("STDTM12345"));
    }

    #[test]
    fn amount_validation() {
        assert!(validate_request(&request(150.0, "STD-TM-12345"), 10_000.0).is_ok());
        assert!(validate_request(&request(150.55, "STD-TM-12345"), 10_000.0).is_ok());
        assert!(validate_request(&request(0.0, "STD-TM-12345"), 10_000.0).is_err());
        assert!(validate_request(&request(-5.0, "STD-TM-12345"), 10_000.0).is_err());
        assert!(validate_request(&request(10_000.5, "STD-TM-12345"), 10_000.0).is_err());
        assert!(validate_request(&request(12.345, "STD-TM-12345"), 10_000.0).is_err());
        assert!(validate_request(&request(f64::NAN, "STD-TM-12345"), 10_000.0).is_err());
    }

    #[test]
    fn session_ids_have_the_expected_shape() {
        let id = generate_session_id(1_700_000_000_000);
        assert!(id.starts_with("sess_1700000000000_"));
        assert_eq!(id.len(), "sess_1700000000000_".len() + 8);
    }
}

use serde_json::json;
use std::sync::Arc;

use crate::detection::gate::{self, GateThresholds};
use crate::detection::score::SignalWeights;
use crate::domain::event::{NewSuspiciousEvent, SuspiciousReason};
use crate::domain::transaction::TransactionStatus;
use crate::ml::blend::blended_score;
use crate::ml::MlScorer;
use crate::queue::rescore_queue::{retry_delay, RescoreJob, RescoreQueue};
use crate::repo::suspicious_events_repo::SuspiciousEventsRepo;
use crate::repo::transactions_repo::TransactionsRepo;
use crate::service::payment_service::record_suspicious;
use crate::service::realtime::RealtimeEmitter;

#[derive(Clone)]
pub struct RescoreWorker {
    pub queue: RescoreQueue,
    pub transactions_repo: TransactionsRepo,
    pub suspicious_repo: SuspiciousEventsRepo,
    pub emitter: RealtimeEmitter,
    pub scorer: Arc<dyn MlScorer>,
    pub weights: SignalWeights,
    pub thresholds: GateThresholds,
    pub retry_delay_ms: u64,
    pub poll_ms: u64,
}

impl RescoreWorker {
    pub async fn run(self) {
        tracing::info!(
            scorer = self.scorer.name(),
            concurrency = self.queue.concurrency,
            "rescore worker started"
        );
        loop {
            while let Some(job) = self.queue.claim().await {
                let worker = self.clone();
                tokio::spawn(async move {
                    worker.process(job).await;
                    worker.queue.release().await;
                });
            }
            tokio::time::sleep(std::time::Duration::from_millis(self.poll_ms)).await;
        }
    }

    async fn process(&self, mut job: RescoreJob) {
        job.attempts += 1;
        let blend = blended_score(self.scorer.as_ref(), &job.features, &self.weights).await;

        match self.apply(&job, blend.score, blend.ml_score).await {
            Ok(applied) => {
                if applied {
                    tracing::info!(
                        transaction_id = %job.transaction_id,
                        score = blend.score,
                        used_ml = blend.used_ml,
                        attempts = job.attempts,
                        "rescore applied"
                    );
                } else {
                    tracing::debug!(
                        transaction_id = %job.transaction_id,
                        "rescore skipped, transaction already settled"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    transaction_id = %job.transaction_id,
                    attempts = job.attempts,
                    error = %e,
                    "rescore attempt failed"
                );
                if job.attempts >= self.queue.max_attempts {
                    if let Err(mark_err) = self
                        .transactions_repo
                        .mark_rescore_failed(job.transaction_id, &e.to_string())
                        .await
                    {
                        tracing::error!(
                            transaction_id = %job.transaction_id,
                            error = %mark_err,
                            "failed to record rescore failure"
                        );
                    }
                } else {
                    let queue = self.queue.clone();
                    let delay = retry_delay(job.attempts, self.retry_delay_ms);
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        queue.requeue_front(job).await;
                    });
                }
            }
        }
    }

    async fn apply(
        &self,
        job: &RescoreJob,
        score: f64,
        ml_score: Option<f64>,
    ) -> anyhow::Result<bool> {
        let reasons = gate::reason_strings(&job.features, ml_score);
        let status = self
            .transactions_repo
            .apply_rescore(job.transaction_id, score, &reasons, ml_score)
            .await?;

        let Some(status) = status else {
            return Ok(false);
        };

        if score < self.thresholds.verify && status == TransactionStatus::Pending {
            self.transactions_repo
                .auto_complete_if_pending(job.transaction_id, "low_risk_auto_completion")
                .await?;
        }

        if score >= self.thresholds.block {
            record_suspicious(
                &self.suspicious_repo,
                &self.emitter,
                NewSuspiciousEvent {
                    ip: job.features.ip.clone(),
                    user_id: Some(job.user_id),
                    user_agent: job.features.user_agent.clone(),
                    path: "/payment/initiate".to_string(),
                    method: "POST".to_string(),
                    reason: SuspiciousReason::MlHighRisk,
                    score: Some(score),
                    meta: json!({
                        "transaction_id": job.transaction_id,
                        "ml_score": ml_score,
                    }),
                },
            )
            .await;
            tracing::info!(
                transaction_id = %job.transaction_id,
                score,
                "rescore crossed the block threshold"
            );
        }

        Ok(true)
    }
}

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use ticketguard::detection::gate::{decide, GateOutcome, GateThresholds};
use ticketguard::detection::score::{heuristic_score, SignalWeights};
use ticketguard::detection::signals::ScoreFeatures;
use ticketguard::detection::telemetry::BehaviorSample;
use ticketguard::domain::transaction::Platform;
use ticketguard::ml::blend::blended_score;
use ticketguard::ml::mock::{FixedScorer, UnreachableScorer};
use ticketguard::ml::MlScorer;
use ticketguard::queue::rescore_queue::RescoreQueue;

#[tokio::test]
async fn a_rescored_bot_job_crosses_the_block_threshold() {
    let queue = RescoreQueue::new(2, 3);
    let tx_id = Uuid::new_v4();
    queue.enqueue(tx_id, Uuid::new_v4(), bot_features()).await;

    let job = queue.claim().await.unwrap();
    assert_eq!(job.transaction_id, tx_id);
    assert_eq!(job.attempts, 0);

    let scorer: Arc<dyn MlScorer> = Arc::new(FixedScorer { score: 1.0 });
    let weights = SignalWeights::default();
    let blend = blended_score(scorer.as_ref(), &job.features, &weights).await;

    assert!(blend.used_ml);
    assert_eq!(blend.ml_score, Some(1.0));
    assert_eq!(decide(blend.score, &thresholds()), GateOutcome::Block);
}

#[tokio::test]
async fn a_clean_job_rescored_low_clears_for_auto_completion() {
    let queue = RescoreQueue::new(2, 3);
    queue
        .enqueue(Uuid::new_v4(), Uuid::new_v4(), clean_features())
        .await;

    let job = queue.claim().await.unwrap();
    let scorer: Arc<dyn MlScorer> = Arc::new(FixedScorer { score: 0.0 });
    let weights = SignalWeights::default();
    let blend = blended_score(scorer.as_ref(), &job.features, &weights).await;

    let t = thresholds();
    assert!(blend.score < t.verify, "rescored at {}", blend.score);
    assert_eq!(decide(blend.score, &t), GateOutcome::Allow);
}

#[tokio::test]
async fn fallback_rescoring_never_moves_the_score() {
    let scorer: Arc<dyn MlScorer> = Arc::new(UnreachableScorer);
    let weights = SignalWeights::default();
    let features = clean_features();

    let blend = blended_score(scorer.as_ref(), &features, &weights).await;
    assert!(!blend.used_ml);
    assert_eq!(blend.ml_score, None);
    assert_eq!(blend.score, heuristic_score(&features, &weights));
}

#[tokio::test]
async fn scorer_health_reflects_reachability() {
    assert!(FixedScorer { score: 0.5 }.status().await.healthy);
    assert!(!UnreachableScorer.status().await.healthy);
}

fn thresholds() -> GateThresholds {
    GateThresholds {
        block: 0.6,
        verify: 0.3,
        log: 0.3,
    }
}

fn clean_features() -> ScoreFeatures {
    let behavior = BehaviorSample::human();
    ScoreFeatures {
        headless: false,
        missing_js: false,
        suspicious_ua: false,
        suspicious_pattern: false,
        geo_mismatch: false,
        rapid_purchase: false,
        multiple_devices: false,
        device_fingerprint_match: false,
        unusual_timing: false,
        payment_behavior: false,
        amount: 150.0,
        platform: Platform::Ticketmaster,
        ip: "10.0.0.1".to_string(),
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/120.0 Safari/537.36"
            .to_string(),
        session_duration_secs: behavior.session_duration_secs,
        click_pattern: behavior.click_pattern,
        typing_speed_wpm: behavior.typing_speed_wpm,
        mouse_movement: behavior.mouse_movement,
        captured_at: Utc::now(),
    }
}

fn bot_features() -> ScoreFeatures {
    ScoreFeatures {
        headless: true,
        missing_js: true,
        suspicious_ua: true,
        user_agent: "HeadlessChrome/119.0".to_string(),
        ip: "203.0.113.9".to_string(),
        ..clean_features()
    }
}

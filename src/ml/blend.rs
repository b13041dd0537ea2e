use chrono::{DateTime, Utc};

use crate::detection::score::{clamp01, heuristic_score, stable_unit, SignalWeights};
use crate::detection::signals::ScoreFeatures;
use crate::ml::MlScorer;

pub const HEURISTIC_WEIGHT: f64 = 0.6;
pub const ML_WEIGHT: f64 = 0.4;

#[derive(Debug, Clone, Copy)]
pub struct Blend {
    pub score: f64,
    pub ml_score: Option<f64>,
    pub used_ml: bool,
}

// Derived from the frozen capture time so a job rescored twice lands on
// the same adjustment.
pub fn time_adjustment(captured_at: DateTime<Utc>) -> f64 {
    let millis = (captured_at.timestamp_millis().rem_euclid(1000)) as f64;
    (millis / 1000.0 - 0.5) * 0.1
}

pub async fn blended_score(
    scorer: &dyn MlScorer,
    features: &ScoreFeatures,
    weights: &SignalWeights,
) -> Blend {
    let heuristic = heuristic_score(features, weights);

    match scorer.predict(features).await {
        Ok(ml) => {
            let ml = clamp01(ml);
            let base = heuristic * HEURISTIC_WEIGHT + ml * ML_WEIGHT;
            let stable_adj =
                (stable_unit("blend", &features.ip, &features.user_agent) - 0.5) * 0.15;
            let score = base + time_adjustment(features.captured_at) + stable_adj;
            if !score.is_finite() {
                tracing::warn!("non-finite blended score, using fallback");
                return Blend {
                    score: 0.3,
                    ml_score: Some(ml),
                    used_ml: true,
                };
            }
            Blend {
                score: clamp01(score),
                ml_score: Some(ml),
                used_ml: true,
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "ml scoring unavailable, falling back to heuristic");
            Blend {
                score: heuristic,
                ml_score: None,
                used_ml: false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::telemetry::BehaviorSample;
    use crate::domain::transaction::Platform;
    use crate::ml::mock::{FixedScorer, UnreachableScorer};
    use chrono::Utc;

    fn features() -> ScoreFeatures {
        let behavior = BehaviorSample::human();
        ScoreFeatures {
            headless: false,
            missing_js: true,
            suspicious_ua: false,
            suspicious_pattern: false,
            geo_mismatch: false,
            rapid_purchase: false,
            multiple_devices: false,
            device_fingerprint_match: false,
            unusual_timing: false,
            payment_behavior: false,
            amount: 250.0,
            platform: Platform::Ticketmaster,
            ip: "198.51.100.7".to_string(),
            user_agent: "Mozilla/5.0 Chrome/120.0 Safari/537.36".to_string(),
            session_duration_secs: behavior.session_duration_secs,
            click_pattern: behavior.click_pattern,
            typing_speed_wpm: behavior.typing_speed_wpm,
            mouse_movement: behavior.mouse_movement,
            captured_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn unreachable_scorer_falls_back_to_heuristic() {
        let f = features();
        let weights = SignalWeights::default();
        let blend = blended_score(&UnreachableScorer, &f, &weights).await;
        assert!(!blend.used_ml);
        assert_eq!(blend.ml_score, None);
        assert_eq!(blend.score, heuristic_score(&f, &weights));
    }

    #[tokio::test]
    async fn blend_stays_near_the_weighted_combination() {
        let f = features();
        let weights = SignalWeights::default();
        let scorer = FixedScorer { score: 0.9 };
        let blend = blended_score(&scorer, &f, &weights).await;
        assert!(blend.used_ml);
        assert_eq!(blend.ml_score, Some(0.9));

        let base = heuristic_score(&f, &weights) * HEURISTIC_WEIGHT + 0.9 * ML_WEIGHT;
        assert!((blend.score - base).abs() <= 0.125 + 1e-9);
        assert!((0.0..=1.0).contains(&blend.score));
    }

    #[tokio::test]
    async fn blend_is_deterministic_for_a_frozen_snapshot() {
        let f = features();
        let weights = SignalWeights::default();
        let scorer = FixedScorer { score: 0.4 };
        let a = blended_score(&scorer, &f, &weights).await;
        let b = blended_score(&scorer, &f, &weights).await;
        assert_eq!(a.score, b.score);
    }

    #[test]
    fn time_adjustment_is_bounded() {
        let adj = time_adjustment(Utc::now());
        assert!((-0.05..0.05).contains(&adj));
    }
}

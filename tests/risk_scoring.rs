use chrono::Utc;
use proptest::prelude::*;
use ticketguard::detection::gate::{self, GateOutcome, GateThresholds};
use ticketguard::detection::score::{heuristic_score, SignalWeights};
use ticketguard::detection::signals::ScoreFeatures;
use ticketguard::detection::telemetry::{BehaviorSample, ClickPattern, MouseMovement};
use ticketguard::domain::transaction::Platform;

proptest! {
    #[test]
    fn heuristic_score_stays_in_unit_interval(
        headless in any::<bool>(),
        missing_js in any::<bool>(),
        suspicious_ua in any::<bool>(),
        suspicious_pattern in any::<bool>(),
        geo_mismatch in any::<bool>(),
        rapid_purchase in any::<bool>(),
        multiple_devices in any::<bool>(),
        device_fingerprint_match in any::<bool>(),
        unusual_timing in any::<bool>(),
        payment_behavior in any::<bool>(),
        amount in 0.01f64..20_000.0,
        session in 0.0f64..4_000.0,
        typing in 0.0f64..400.0,
        automated in any::<bool>(),
        linear in any::<bool>(),
        platform_idx in 0u8..5,
        ip in "[0-9]{1,3}\\.[0-9]{1,3}\\.[0-9]{1,3}\\.[0-9]{1,3}",
        ua in "[ -~]{0,64}",
    ) {
        let features = ScoreFeatures {
            headless,
            missing_js,
            suspicious_ua,
            suspicious_pattern,
            geo_mismatch,
            rapid_purchase,
            multiple_devices,
            device_fingerprint_match,
            unusual_timing,
            payment_behavior,
            amount,
            platform: platform(platform_idx),
            ip,
            user_agent: ua,
            session_duration_secs: session,
            typing_speed_wpm: typing,
            click_pattern: if automated { ClickPattern::Automated } else { ClickPattern::Human },
            mouse_movement: if linear { MouseMovement::Linear } else { MouseMovement::Natural },
            captured_at: Utc::now(),
        };
        let score = heuristic_score(&features, &SignalWeights::default());
        prop_assert!((0.0..=1.0).contains(&score), "score {} out of range", score);
    }
}

#[test]
fn human_checkout_is_admitted() {
    let features = human_features(150.0);
    let score = heuristic_score(&features, &SignalWeights::default());
    assert!(score < 0.3, "human checkout scored {score}");
    assert_eq!(
        gate::decide(score, &GateThresholds::default()),
        GateOutcome::Allow
    );
    assert!(gate::reason_strings(&features, None).is_empty());
}

#[test]
fn headless_client_without_js_is_blocked() {
    let mut features = human_features(500.0);
    features.headless = true;
    features.missing_js = true;
    features.suspicious_ua = true;
    features.user_agent = "HeadlessChrome/119.0".to_string();

    let score = heuristic_score(&features, &SignalWeights::default());
    assert!(score >= 0.6, "headless client scored {score}");
    assert_eq!(
        gate::decide(score, &GateThresholds::default()),
        GateOutcome::Block
    );

    let reasons = gate::reason_strings(&features, None);
    assert!(reasons.contains(&"headless_browser".to_string()));
    assert!(reasons.contains(&"missing_js_challenge".to_string()));
}

#[test]
fn rapid_purchases_raise_the_score_and_the_reason() {
    let calm = human_features(150.0);
    let mut rushed = calm.clone();
    rushed.rapid_purchase = true;

    let weights = SignalWeights::default();
    let delta = heuristic_score(&rushed, &weights) - heuristic_score(&calm, &weights);
    assert!(delta >= weights.rapid_purchase, "rapid purchase delta {delta}");
    assert!(gate::reason_strings(&rushed, None).contains(&"rapid_purchase".to_string()));
}

#[test]
fn scoring_is_reproducible_for_the_same_request() {
    let mut features = human_features(2_500.0);
    features.geo_mismatch = true;
    let weights = SignalWeights::default();
    let first = heuristic_score(&features, &weights);
    for _ in 0..10 {
        assert_eq!(first, heuristic_score(&features, &weights));
    }
}

fn platform(idx: u8) -> Platform {
    match idx % 5 {
        0 => Platform::Ticketmaster,
        1 => Platform::Eventbrite,
        2 => Platform::Stubhub,
        3 => Platform::Seatgeek,
        _ => Platform::Vividseats,
    }
}

fn human_features(amount: f64) -> ScoreFeatures {
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
        amount,
        platform: Platform::Ticketmaster,
        ip: "10.0.0.1".to_string(),
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/120.0 Safari/537.36"
            .to_string(),
        session_duration_secs: behavior.session_duration_secs,
        typing_speed_wpm: behavior.typing_speed_wpm,
        click_pattern: behavior.click_pattern,
        mouse_movement: behavior.mouse_movement,
        captured_at: Utc::now(),
    }
}

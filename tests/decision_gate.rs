use ticketguard::detection::gate::{decide, reason_strings, GateOutcome, GateThresholds};
use ticketguard::detection::signals::ScoreFeatures;
use ticketguard::detection::telemetry::{BehaviorSample, ClickPattern, MouseMovement};
use ticketguard::domain::transaction::{Platform, VerificationStep};
use ticketguard::verification::required_steps;

#[test]
fn custom_thresholds_shift_the_boundaries() {
    let t = GateThresholds {
        block: 0.8,
        verify: 0.5,
        log: 0.4,
    };
    assert_eq!(decide(0.49, &t), GateOutcome::Allow);
    assert_eq!(decide(0.5, &t), GateOutcome::RequireVerification);
    assert_eq!(decide(0.79, &t), GateOutcome::RequireVerification);
    assert_eq!(decide(0.8, &t), GateOutcome::Block);
}

#[test]
fn step_ladder_follows_the_block_boundary() {
    assert_eq!(
        required_steps(0.6, 0.6),
        vec![
            VerificationStep::BotDetection,
            VerificationStep::Captcha,
            VerificationStep::PhoneVerification,
        ]
    );
    assert_eq!(
        required_steps(0.599_999, 0.6),
        vec![VerificationStep::BotDetection, VerificationStep::Captcha]
    );
    assert_eq!(
        required_steps(0.0, 0.6),
        vec![VerificationStep::BotDetection, VerificationStep::Captcha]
    );
}

#[test]
fn stored_reason_strings_use_snake_case_codes() {
    let features = all_signals();
    assert_eq!(
        reason_strings(&features, Some(0.9)),
        vec![
            "headless_browser",
            "missing_js_challenge",
            "rapid_purchase",
            "multiple_devices",
            "unusual_timing",
            "suspicious_pattern",
            "geo_mismatch",
            "suspicious_user_agent",
            "ml_model_high_risk",
        ]
    );
}

#[test]
fn quiet_requests_carry_no_reasons() {
    let mut features = all_signals();
    features.headless = false;
    features.missing_js = false;
    features.suspicious_ua = false;
    features.suspicious_pattern = false;
    features.geo_mismatch = false;
    features.rapid_purchase = false;
    features.multiple_devices = false;
    features.unusual_timing = false;
    assert!(reason_strings(&features, Some(0.2)).is_empty());
}

fn all_signals() -> ScoreFeatures {
    let behavior = BehaviorSample::human();
    ScoreFeatures {
        headless: true,
        missing_js: true,
        suspicious_ua: true,
        suspicious_pattern: true,
        geo_mismatch: true,
        rapid_purchase: true,
        multiple_devices: true,
        device_fingerprint_match: true,
        unusual_timing: true,
        payment_behavior: true,
        amount: 4_500.0,
        platform: Platform::Stubhub,
        ip: "203.0.113.9".to_string(),
        user_agent: "python-requests/2.31".to_string(),
        session_duration_secs: behavior.session_duration_secs,
        typing_speed_wpm: behavior.typing_speed_wpm,
        click_pattern: ClickPattern::Automated,
        mouse_movement: MouseMovement::Linear,
        captured_at: chrono::Utc::now(),
    }
}

use std::hash::{Hash, Hasher};

use crate::detection::signals::ScoreFeatures;
use crate::detection::telemetry::{ClickPattern, MouseMovement};
use crate::domain::transaction::Platform;

#[derive(Debug, Clone)]
pub struct SignalWeights {
    pub headless: f64,
    pub missing_js: f64,
    pub suspicious_pattern: f64,
    pub rapid_purchase: f64,
    pub multiple_devices: f64,
    pub geo_mismatch: f64,
    pub suspicious_ua: f64,
    pub payment_behavior: f64,
    pub device_fingerprint_match: f64,
    pub unusual_timing: f64,
    pub signal_jitter: f64,
    pub platform_jitter: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        SignalWeights {
            headless: 0.50,
            missing_js: 0.45,
            suspicious_pattern: 0.42,
            rapid_purchase: 0.38,
            multiple_devices: 0.34,
            geo_mismatch: 0.30,
            suspicious_ua: 0.30,
            payment_behavior: 0.30,
            device_fingerprint_match: 0.25,
            unusual_timing: 0.22,
            signal_jitter: 0.05,
            platform_jitter: 0.02,
        }
    }
}

pub fn clamp01(v: f64) -> f64 {
    if v < 0.0 {
        0.0
    } else if v > 1.0 {
        1.0
    } else {
        v
    }
}

// Stable per-request jitter in [0, 1): identical (key, ip, ua) always
// produce the same offset, so repeated identical requests score identically.
pub fn stable_unit(key: &str, ip: &str, user_agent: &str) -> f64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    key.hash(&mut hasher);
    ip.hash(&mut hasher);
    user_agent.hash(&mut hasher);
    (hasher.finish() % 1000) as f64 / 1000.0
}

fn jitter(key: &str, ip: &str, ua: &str, span: f64) -> f64 {
    stable_unit(key, ip, ua) * span
}

pub fn platform_base(platform: Platform) -> f64 {
    match platform {
        Platform::Ticketmaster => 0.05,
        Platform::Eventbrite => 0.08,
        Platform::Seatgeek => 0.10,
        Platform::Vividseats => 0.10,
        Platform::Stubhub => 0.12,
    }
}

fn amount_term(amount: f64, ip: &str, ua: &str) -> f64 {
    if amount > 5000.0 {
        0.15 + jitter("amount_high", ip, ua, 0.10)
    } else if amount > 1000.0 {
        0.10 + jitter("amount_mid", ip, ua, 0.05)
    } else {
        0.05 + jitter("amount_low", ip, ua, 0.05)
    }
}

fn session_term(duration_secs: f64) -> f64 {
    if duration_secs < 30.0 {
        0.2
    } else if duration_secs < 120.0 {
        0.1
    } else {
        0.05
    }
}

pub fn ip_variation(ip: &str) -> f64 {
    let sum: u32 = ip.split('.').filter_map(|o| o.parse::<u32>().ok()).sum();
    (sum % 100) as f64 / 100.0 * 0.1
}

pub fn ua_variation(user_agent: &str) -> f64 {
    let sum: u32 = user_agent.chars().map(|c| c as u32).sum();
    (sum % 50) as f64 / 100.0 * 0.1
}

pub fn heuristic_score(features: &ScoreFeatures, weights: &SignalWeights) -> f64 {
    let ip = &features.ip;
    let ua = &features.user_agent;
    let span = weights.signal_jitter;

    let mut score = 0.0;
    if features.headless {
        score += weights.headless + jitter("headless", ip, ua, span);
    }
    if features.missing_js {
        score += weights.missing_js + jitter("missing_js", ip, ua, span);
    }
    if features.suspicious_pattern {
        score += weights.suspicious_pattern + jitter("suspicious_pattern", ip, ua, span);
    }
    if features.rapid_purchase {
        score += weights.rapid_purchase + jitter("rapid_purchase", ip, ua, span);
    }
    if features.multiple_devices {
        score += weights.multiple_devices + jitter("multiple_devices", ip, ua, span);
    }
    if features.geo_mismatch {
        score += weights.geo_mismatch + jitter("geo_mismatch", ip, ua, span);
    }
    if features.suspicious_ua {
        score += weights.suspicious_ua + jitter("suspicious_ua", ip, ua, span);
    }
    if features.payment_behavior {
        score += weights.payment_behavior + jitter("payment_behavior", ip, ua, span);
    }
    if features.device_fingerprint_match {
        score += weights.device_fingerprint_match + jitter("fingerprint_match", ip, ua, span);
    }
    if features.unusual_timing {
        score += weights.unusual_timing + jitter("unusual_timing", ip, ua, span);
    }

    score += amount_term(features.amount, ip, ua);
    score += platform_base(features.platform) + jitter("platform", ip, ua, weights.platform_jitter);
    score += session_term(features.session_duration_secs);

    if features.click_pattern == ClickPattern::Automated {
        score += 0.15;
    }
    if features.typing_speed_wpm > 200.0 {
        score += 0.1;
    }
    if features.mouse_movement == MouseMovement::Linear {
        score += 0.1;
    }

    score += ip_variation(ip);
    score += ua_variation(ua);

    if !score.is_finite() {
        tracing::warn!(ip = %ip, "non-finite heuristic score, using fallback");
        return 0.3;
    }
    clamp01(score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::telemetry::BehaviorSample;
    use chrono::Utc;

    fn features(amount: f64, platform: Platform) -> ScoreFeatures {
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
            payment_behavior: amount > 1000.0,
            amount,
            platform,
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

    #[test]
    fn human_profile_scores_below_verify_threshold() {
        let score = heuristic_score(&features(150.0, Platform::Ticketmaster), &SignalWeights::default());
        assert!(score < 0.3, "human profile scored {score}");
        assert!(score > 0.0);
    }

    #[test]
    fn headless_with_missing_js_crosses_block_threshold() {
        let mut f = features(500.0, Platform::Eventbrite);
        f.headless = true;
        f.suspicious_ua = true;
        f.missing_js = true;
        f.user_agent = "HeadlessChrome/119.0".to_string();
        let score = heuristic_score(&f, &SignalWeights::default());
        assert!(score >= 0.6, "headless bot scored {score}");
    }

    #[test]
    fn score_is_deterministic_for_identical_requests() {
        let f = features(2500.0, Platform::Stubhub);
        let w = SignalWeights::default();
        assert_eq!(heuristic_score(&f, &w), heuristic_score(&f, &w));
    }

    #[test]
    fn rapid_purchase_raises_score() {
        let base = features(150.0, Platform::Ticketmaster);
        let mut flagged = base.clone();
        flagged.rapid_purchase = true;
        let w = SignalWeights::default();
        let delta = heuristic_score(&flagged, &w) - heuristic_score(&base, &w);
        assert!(delta >= w.rapid_purchase, "delta {delta}");
    }

    #[test]
    fn everything_fired_still_clamps_to_one() {
        let mut f = features(9999.0, Platform::Stubhub);
        f.headless = true;
        f.missing_js = true;
        f.suspicious_ua = true;
        f.suspicious_pattern = true;
        f.geo_mismatch = true;
        f.rapid_purchase = true;
        f.multiple_devices = true;
        f.device_fingerprint_match = true;
        f.unusual_timing = true;
        f.session_duration_secs = 5.0;
        f.click_pattern = ClickPattern::Automated;
        f.typing_speed_wpm = 400.0;
        f.mouse_movement = MouseMovement::Linear;
        assert_eq!(heuristic_score(&f, &SignalWeights::default()), 1.0);
    }

    #[test]
    fn variation_terms_stay_bounded() {
        assert!(ip_variation("255.255.255.255") <= 0.1);
        assert!(ip_variation("not-an-ip") == 0.0);
        assert!(ip_variation("2001:db8::1") == 0.0);
        assert!(ua_variation("Mozilla/5.0 (X11; Linux x86_64) Firefox/121.0") < 0.05);
    }

    #[test]
    fn stable_unit_varies_by_key_and_stays_in_range() {
        let a = stable_unit("headless", "1.2.3.4", "ua");
        let b = stable_unit("missing_js", "1.2.3.4", "ua");
        assert!((0.0..1.0).contains(&a));
        assert!((0.0..1.0).contains(&b));
        assert_eq!(a, stable_unit("headless", "1.2.3.4", "ua"));
    }
}

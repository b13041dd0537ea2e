use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

use crate::detection::telemetry::{BehaviorSample, ClickPattern, MouseMovement};
use crate::domain::transaction::Platform;

const HEADLESS_MARKERS: [&str; 7] = [
    "headless",
    "phantom",
    "puppeteer",
    "spider",
    "selenium",
    "webdriver",
    "automation",
];

const BOT_MARKERS: [&str; 8] = [
    "bot", "crawler", "scraper", "python", "curl", "wget", "postman", "insomnia",
];

const BROWSER_FAMILIES: [&str; 6] = ["chrome", "firefox", "safari", "edge", "opera", "msie"];

pub fn is_headless_ua(user_agent: &str) -> bool {
    let ua = user_agent.to_lowercase();
    HEADLESS_MARKERS.iter().any(|m| ua.contains(m))
}

pub fn is_suspicious_ua(user_agent: &str) -> bool {
    if user_agent.is_empty() {
        return true;
    }
    let ua = user_agent.to_lowercase();
    if HEADLESS_MARKERS.iter().any(|m| ua.contains(m)) {
        return true;
    }
    if BOT_MARKERS.iter().any(|m| ua.contains(m)) {
        return true;
    }
    !BROWSER_FAMILIES.iter().any(|f| ua.contains(f))
}

pub fn has_suspicious_pattern(referer: Option<&str>, origin: Option<&str>) -> bool {
    match (referer, origin) {
        (None, None) => true,
        (Some(r), _) => {
            let r = r.to_lowercase();
            r.contains("localhost") || r.contains("127.0.0.1") || r.contains("test.com")
        }
        _ => false,
    }
}

// Half-open window: hour 6 is already morning traffic.
pub fn is_unusual_hour(hour: u32) -> bool {
    (3..6).contains(&hour)
}

pub fn is_geo_mismatch(expected_country: Option<&str>, country: Option<&str>) -> bool {
    match (expected_country, country) {
        (Some(expected), Some(actual)) => !expected.eq_ignore_ascii_case(actual),
        _ => false,
    }
}

pub fn rapid_purchase(recent_same_platform: i64) -> bool {
    recent_same_platform >= 3
}

pub fn multiple_devices(recent_other_fingerprints: i64) -> bool {
    recent_other_fingerprints >= 2
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HistorySignals {
    pub rapid_purchase: bool,
    pub multiple_devices: bool,
    pub fingerprint_match: bool,
}

#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub ip: String,
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
    pub accept_encoding: String,
    pub dnt: String,
    pub screen_resolution: String,
    pub timezone: String,
    pub referer: Option<String>,
    pub origin: Option<String>,
    pub js_ok: Option<String>,
    pub expected_country: Option<String>,
    pub session_start_ms: Option<i64>,
    pub path: String,
    pub method: String,
}

pub fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .unwrap_or("unknown")
        .to_string()
}

fn header_string(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn header_opt(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

impl RequestMeta {
    pub fn from_headers(headers: &HeaderMap, ip: String, path: String, method: String) -> Self {
        RequestMeta {
            ip,
            user_agent: header_string(headers, "user-agent"),
            accept: header_string(headers, "accept"),
            accept_language: header_string(headers, "accept-language"),
            accept_encoding: header_string(headers, "accept-encoding"),
            dnt: header_string(headers, "dnt"),
            screen_resolution: header_string(headers, "x-screen-resolution"),
            timezone: header_string(headers, "x-timezone"),
            referer: header_opt(headers, "referer"),
            origin: header_opt(headers, "origin"),
            js_ok: header_opt(headers, "x-js-ok"),
            expected_country: header_opt(headers, "x-expected-country"),
            session_start_ms: header_opt(headers, "x-session-start").and_then(|v| v.parse().ok()),
            path,
            method,
        }
    }

    pub fn missing_js(&self) -> bool {
        self.js_ok.as_deref() != Some("1")
    }

    pub fn fingerprint(&self) -> String {
        let raw = format!(
            "{}|{}|{}|{}|{}|{}|{}",
            self.accept,
            self.accept_language,
            self.accept_encoding,
            self.dnt,
            self.user_agent,
            self.screen_resolution,
            self.timezone
        );
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        raw.hash(&mut hasher);
        format!("fp_{:016x}", hasher.finish())
    }

    pub fn session_duration_secs(&self, now_ms: i64, fallback: f64) -> f64 {
        match self.session_start_ms {
            Some(start) if start <= now_ms => (now_ms - start) as f64 / 1000.0,
            Some(_) => 0.0,
            None => fallback,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreFeatures {
    pub headless: bool,
    pub missing_js: bool,
    pub suspicious_ua: bool,
    pub suspicious_pattern: bool,
    pub geo_mismatch: bool,
    pub rapid_purchase: bool,
    pub multiple_devices: bool,
    pub device_fingerprint_match: bool,
    pub unusual_timing: bool,
    pub payment_behavior: bool,
    pub amount: f64,
    pub platform: Platform,
    pub ip: String,
    pub user_agent: String,
    pub session_duration_secs: f64,
    pub click_pattern: ClickPattern,
    pub typing_speed_wpm: f64,
    pub mouse_movement: MouseMovement,
    pub captured_at: DateTime<Utc>,
}

pub fn assemble(
    meta: &RequestMeta,
    country: Option<&str>,
    history: HistorySignals,
    behavior: BehaviorSample,
    amount: f64,
    platform: Platform,
    local_hour: u32,
    now: DateTime<Utc>,
) -> ScoreFeatures {
    ScoreFeatures {
        headless: is_headless_ua(&meta.user_agent),
        missing_js: meta.missing_js(),
        suspicious_ua: is_suspicious_ua(&meta.user_agent),
        suspicious_pattern: has_suspicious_pattern(meta.referer.as_deref(), meta.origin.as_deref()),
        geo_mismatch: is_geo_mismatch(meta.expected_country.as_deref(), country),
        rapid_purchase: history.rapid_purchase,
        multiple_devices: history.multiple_devices,
        device_fingerprint_match: history.fingerprint_match,
        unusual_timing: is_unusual_hour(local_hour),
        payment_behavior: amount > 1000.0,
        amount,
        platform,
        ip: meta.ip.clone(),
        user_agent: meta.user_agent.clone(),
        session_duration_secs: meta.session_duration_secs(
            now.timestamp_millis(),
            behavior.session_duration_secs,
        ),
        click_pattern: behavior.click_pattern,
        typing_speed_wpm: behavior.typing_speed_wpm,
        mouse_movement: behavior.mouse_movement,
        captured_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_markers_are_case_insensitive() {
        assert!(is_headless_ua("Mozilla/5.0 HeadlessChrome/119.0"));
        assert!(is_headless_ua("Puppeteer/21.0"));
        assert!(is_headless_ua("selenium-webdriver"));
        assert!(!is_headless_ua(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36"
        ));
    }

    #[test]
    fn bot_tooling_is_suspicious() {
        assert!(is_suspicious_ua("python-requests/2.31"));
        assert!(is_suspicious_ua("curl/8.4.0"));
        assert!(is_suspicious_ua("PostmanRuntime/7.36"));
        assert!(is_suspicious_ua(""));
    }

    #[test]
    fn unknown_family_is_suspicious() {
        assert!(is_suspicious_ua("TotallyLegitBrowser/1.0"));
        assert!(!is_suspicious_ua(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) Gecko/20100101 Firefox/121.0"
        ));
    }

    #[test]
    fn suspicious_pattern_requires_missing_or_local_referer() {
        assert!(has_suspicious_pattern(None, None));
        assert!(has_suspicious_pattern(Some("http://localhost:3000/x"), None));
        assert!(has_suspicious_pattern(
            Some("https://test.com/buy"),
            Some("https://test.com")
        ));
        assert!(!has_suspicious_pattern(
            Some("https://tickets.example.com/event"),
            None
        ));
        assert!(!has_suspicious_pattern(None, Some("https://app.example.com")));
    }

    #[test]
    fn unusual_hour_window_is_half_open() {
        assert!(!is_unusual_hour(2));
        assert!(is_unusual_hour(3));
        assert!(is_unusual_hour(5));
        assert!(!is_unusual_hour(6));
        assert!(!is_unusual_hour(14));
    }

    #[test]
    fn geo_mismatch_needs_both_sides() {
        assert!(is_geo_mismatch(Some("IN"), Some("US")));
        assert!(!is_geo_mismatch(Some("IN"), Some("in")));
        assert!(!is_geo_mismatch(Some("IN"), None));
        assert!(!is_geo_mismatch(None, Some("US")));
    }

    #[test]
    fn history_thresholds() {
        assert!(!rapid_purchase(2));
        assert!(rapid_purchase(3));
        assert!(!multiple_devices(1));
        assert!(multiple_devices(2));
    }

    #[test]
    fn fingerprint_is_stable_and_header_sensitive() {
        let mut headers = HeaderMap::new();
        headers.insert("user-agent", "Mozilla/5.0 Chrome/120".parse().unwrap());
        headers.insert("accept", "application/json".parse().unwrap());
        let a = RequestMeta::from_headers(&headers, "1.2.3.4".into(), "/p".into(), "POST".into());
        let b = RequestMeta::from_headers(&headers, "1.2.3.4".into(), "/p".into(), "POST".into());
        assert_eq!(a.fingerprint(), b.fingerprint());

        headers.insert("x-timezone", "Asia/Kolkata".parse().unwrap());
        let c = RequestMeta::from_headers(&headers, "1.2.3.4".into(), "/p".into(), "POST".into());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn missing_js_only_cleared_by_exact_header() {
        let mut headers = HeaderMap::new();
        let m = RequestMeta::from_headers(&headers, "ip".into(), "/p".into(), "POST".into());
        assert!(m.missing_js());

        headers.insert("x-js-ok", "0".parse().unwrap());
        let m = RequestMeta::from_headers(&headers, "ip".into(), "/p".into(), "POST".into());
        assert!(m.missing_js());

        headers.insert("x-js-ok", "1".parse().unwrap());
        let m = RequestMeta::from_headers(&headers, "ip".into(), "/p".into(), "POST".into());
        assert!(!m.missing_js());
    }

    #[test]
    fn session_duration_prefers_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-session-start", "1000".parse().unwrap());
        let m = RequestMeta::from_headers(&headers, "ip".into(), "/p".into(), "POST".into());
        assert_eq!(m.session_duration_secs(31_000, 42.0), 30.0);
        assert_eq!(m.session_duration_secs(500, 42.0), 0.0);

        let headers = HeaderMap::new();
        let m = RequestMeta::from_headers(&headers, "ip".into(), "/p".into(), "POST".into());
        assert_eq!(m.session_duration_secs(31_000, 42.0), 42.0);
    }
}

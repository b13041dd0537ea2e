use crate::domain::transaction::{VerificationAttempt, VerificationStep};

// Required steps derive from the score at check time, not at admission:
// an async rescore that crosses the block threshold tightens the set.
pub fn required_steps(bot_score: f64, block_threshold: f64) -> Vec<VerificationStep> {
    if bot_score >= block_threshold {
        vec![
            VerificationStep::BotDetection,
            VerificationStep::Captcha,
            VerificationStep::PhoneVerification,
        ]
    } else {
        vec![VerificationStep::BotDetection, VerificationStep::Captcha]
    }
}

pub fn completed_steps(attempts: &[VerificationAttempt]) -> Vec<VerificationStep> {
    let mut completed = Vec::new();
    for attempt in attempts {
        if attempt.passed && !completed.contains(&attempt.step) {
            completed.push(attempt.step);
        }
    }
    completed
}

#[derive(Debug, Clone)]
pub struct VerificationCheck {
    pub satisfied: bool,
    pub completed: Vec<VerificationStep>,
    pub required: Vec<VerificationStep>,
}

pub fn evaluate(
    bot_score: f64,
    block_threshold: f64,
    attempts: &[VerificationAttempt],
) -> VerificationCheck {
    let required = required_steps(bot_score, block_threshold);
    let completed = completed_steps(attempts);
    let satisfied = required.iter().all(|step| completed.contains(step));
    VerificationCheck {
        satisfied,
        completed,
        required,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn attempt(step: VerificationStep, passed: bool) -> VerificationAttempt {
        VerificationAttempt {
            step,
            passed,
            timestamp: Utc::now(),
            details: json!({}),
        }
    }

    #[test]
    fn high_scores_require_phone_verification() {
        assert_eq!(
            required_steps(0.6, 0.6),
            vec![
                VerificationStep::BotDetection,
                VerificationStep::Captcha,
                VerificationStep::PhoneVerification
            ]
        );
        assert_eq!(
            required_steps(0.59, 0.6),
            vec![VerificationStep::BotDetection, VerificationStep::Captcha]
        );
    }

    #[test]
    fn a_step_completes_on_any_passing_attempt() {
        let attempts = vec![
            attempt(VerificationStep::Captcha, false),
            attempt(VerificationStep::Captcha, true),
            attempt(VerificationStep::Captcha, false),
        ];
        assert_eq!(completed_steps(&attempts), vec![VerificationStep::Captcha]);
    }

    #[test]
    fn appending_failures_never_uncompletes() {
        let mut attempts = vec![
            attempt(VerificationStep::BotDetection, true),
            attempt(VerificationStep::Captcha, true),
        ];
        let before = completed_steps(&attempts);
        attempts.push(attempt(VerificationStep::Captcha, false));
        attempts.push(attempt(VerificationStep::PhoneVerification, false));
        let after = completed_steps(&attempts);
        for step in &before {
            assert!(after.contains(step));
        }
    }

    #[test]
    fn medium_tier_finishes_with_captcha() {
        let attempts = vec![
            attempt(VerificationStep::BotDetection, true),
            attempt(VerificationStep::Captcha, true),
        ];
        let check = evaluate(0.45, 0.6, &attempts);
        assert!(check.satisfied);

        let check = evaluate(0.45, 0.6, &attempts[..1]);
        assert!(!check.satisfied);
        assert_eq!(check.required, vec![
            VerificationStep::BotDetection,
            VerificationStep::Captcha
        ]);
    }

    #[test]
    fn high_tier_still_blocked_without_phone() {
        let attempts = vec![
            attempt(VerificationStep::BotDetection, true),
            attempt(VerificationStep::Captcha, true),
        ];
        let check = evaluate(0.75, 0.6, &attempts);
        assert!(!check.satisfied);
        assert!(check
            .required
            .contains(&VerificationStep::PhoneVerification));

        let mut attempts = attempts;
        attempts.push(attempt(VerificationStep::PhoneVerification, true));
        assert!(evaluate(0.75, 0.6, &attempts).satisfied);
    }

    #[test]
    fn failed_attempts_are_still_recorded_semantics() {
        let attempts = vec![attempt(VerificationStep::Captcha, false)];
        let check = evaluate(0.4, 0.6, &attempts);
        assert!(check.completed.is_empty());
        assert!(!check.satisfied);
    }
}

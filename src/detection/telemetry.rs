use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClickPattern {
    Automated,
    Human,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseMovement {
    Linear,
    Natural,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BehaviorSample {
    pub session_duration_secs: f64,
    pub click_pattern: ClickPattern,
    pub typing_speed_wpm: f64,
    pub mouse_movement: MouseMovement,
}

pub trait BehaviorTelemetry: Send + Sync {
    fn sample(&self) -> BehaviorSample;
}

// Stand-in until clients report real interaction telemetry.
pub struct SyntheticTelemetry;

impl BehaviorTelemetry for SyntheticTelemetry {
    fn sample(&self) -> BehaviorSample {
        let mut rng = rand::thread_rng();
        BehaviorSample {
            session_duration_secs: rng.gen::<f64>() * 300.0,
            click_pattern: if rng.gen::<f64>() > 0.8 {
                ClickPattern::Automated
            } else {
                ClickPattern::Human
            },
            typing_speed_wpm: rng.gen::<f64>() * 100.0,
            mouse_movement: if rng.gen::<f64>() > 0.9 {
                MouseMovement::Linear
            } else {
                MouseMovement::Natural
            },
        }
    }
}

pub struct FixedTelemetry(pub BehaviorSample);

impl BehaviorTelemetry for FixedTelemetry {
    fn sample(&self) -> BehaviorSample {
        self.0
    }
}

impl BehaviorSample {
    pub fn human() -> Self {
        BehaviorSample {
            session_duration_secs: 300.0,
            click_pattern: ClickPattern::Human,
            typing_speed_wpm: 60.0,
            mouse_movement: MouseMovement::Natural,
        }
    }
}

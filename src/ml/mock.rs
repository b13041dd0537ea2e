use anyhow::{bail, Result};

use crate::detection::signals::ScoreFeatures;
use crate::detection::score::clamp01;
use crate::ml::{MlScorer, MlServiceStatus};

pub struct FixedScorer {
    pub score: f64,
}

#[async_trait::async_trait]
impl MlScorer for FixedScorer {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn predict(&self, _features: &ScoreFeatures) -> Result<f64> {
        Ok(clamp01(self.score))
    }

    async fn status(&self) -> MlServiceStatus {
        MlServiceStatus {
            healthy: true,
            last_checked_secs_ago: Some(0),
        }
    }
}

pub struct UnreachableScorer;

#[async_trait::async_trait]
impl MlScorer for UnreachableScorer {
    fn name(&self) -> &'static str {
        "unreachable"
    }

    async fn predict(&self, _features: &ScoreFeatures) -> Result<f64> {
        bail!("ml service unreachable")
    }

    async fn status(&self) -> MlServiceStatus {
        MlServiceStatus {
            healthy: false,
            last_checked_secs_ago: None,
        }
    }
}

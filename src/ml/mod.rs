use anyhow::Result;
use serde::Serialize;

use crate::detection::signals::ScoreFeatures;

pub mod blend;
pub mod http_scorer;
pub mod mock;

#[derive(Debug, Clone, Serialize)]
pub struct MlServiceStatus {
    pub healthy: bool,
    pub last_checked_secs_ago: Option<u64>,
}

#[async_trait::async_trait]
pub trait MlScorer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn predict(&self, features: &ScoreFeatures) -> Result<f64>;

    async fn status(&self) -> MlServiceStatus;
}

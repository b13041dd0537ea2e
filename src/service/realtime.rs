use anyhow::Result;

use crate::domain::event::{PaymentBroadcast, SuspiciousBroadcast};

// Fire-and-forget: dashboards losing an event must never affect the
// payment path.
#[derive(Clone)]
pub struct RealtimeEmitter {
    pub redis_client: redis::Client,
    pub suspicious_channel: String,
    pub payment_channel: String,
}

impl RealtimeEmitter {
    pub async fn emit_suspicious(&self, event: &SuspiciousBroadcast) {
        let payload = match serde_json::to_string(event) {
            Ok(p) => p,
            Err(_) => return,
        };
        if let Err(e) = self.publish(&self.suspicious_channel, payload).await {
            tracing::warn!(error = %e, "suspicious broadcast failed");
        }
    }

    pub async fn emit_payment(&self, event: &PaymentBroadcast) {
        let payload = match serde_json::to_string(event) {
            Ok(p) => p,
            Err(_) => return,
        };
        if let Err(e) = self.publish(&self.payment_channel, payload).await {
            tracing::warn!(error = %e, "payment broadcast failed");
        }
    }

    async fn publish(&self, channel: &str, payload: String) -> Result<()> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let _: i64 = redis::cmd("PUBLISH")
            .arg(channel)
            .arg(payload)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}

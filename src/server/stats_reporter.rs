use crate::application_port::RequestScope;
use crate::domain_port::{JtiStats, RevocationRegistry};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Periodically logs registry statistics, off the request path.
pub struct StatsReporter {
    registry: Arc<dyn RevocationRegistry>,
    interval: Duration,
    instance_id: String,
    cancellation_token: CancellationToken,
}

impl StatsReporter {
    pub fn new(
        registry: Arc<dyn RevocationRegistry>,
        interval: Duration,
        instance_id: &str,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            registry,
            interval,
            instance_id: instance_id.to_owned(),
            cancellation_token,
        }
    }

    async fn tick_once(&self) -> anyhow::Result<JtiStats> {
        // The scan may take a while; give it the whole interval.
        let scope = RequestScope::new(self.cancellation_token.child_token(), self.interval);
        let stats = scope.run(self.registry.stats()).await?;
        tracing::info!(
            instance_id = %self.instance_id,
            active = stats.active_count,
            revoked = stats.revoked_count,
            total = stats.total_count,
            "jti registry stats"
        );
        Ok(stats)
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => {
                    tracing::info!("StatsReporter shutting down...");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.tick_once().await {
                        tracing::error!("StatsReporter error: {:#}", e);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_model::Jti;
    use crate::infra_memory::MemoryRevocationRegistry;
    use chrono::Utc;

    #[tokio::test]
    async fn reports_registry_counts() {
        let registry = Arc::new(MemoryRevocationRegistry::default());
        let jti = Jti::generate();
        let exp = Utc::now() + chrono::Duration::minutes(10);
        registry.record_jti(&jti, exp).await.unwrap();
        registry.record_jti(&Jti::generate(), exp).await.unwrap();
        registry.revoke_jti(&jti, exp).await.unwrap();

        let reporter = StatsReporter::new(
            registry,
            Duration::from_secs(1),
            "test",
            CancellationToken::new(),
        );
        let stats = reporter.tick_once().await.unwrap();
        assert_eq!(stats.active_count, 1);
        assert_eq!(stats.revoked_count, 1);
        assert_eq!(stats.total_count, 2);
    }

    #[tokio::test]
    async fn stops_on_cancellation() {
        let cancel = CancellationToken::new();
        let reporter = StatsReporter::new(
            Arc::new(MemoryRevocationRegistry::default()),
            Duration::from_millis(10),
            "test",
            cancel.clone(),
        );
        let handle = tokio::spawn(async move { reporter.run().await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}

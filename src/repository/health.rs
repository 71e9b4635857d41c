use crate::repository::cache::LookupCache;
use crate::repository::store::{HealthTarget, RecordStore};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

/// How many probes may be in flight at once during a pass.
const CONCURRENT_PROBES: usize = 8;

/// Probe timeouts below this are meaningless; the floor wins.
const MIN_TIMEOUT_MS: u64 = 250;

#[derive(Clone, Debug, serde::Deserialize)]
pub struct Config {
    #[serde(default = "Config::default_interval_seconds")]
    pub interval_seconds: u64,
    #[serde(default = "Config::default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval_seconds: Self::default_interval_seconds(),
            timeout_ms: Self::default_timeout_ms(),
        }
    }
}

impl Config {
    pub fn default_interval_seconds() -> u64 {
        10
    }

    pub fn default_timeout_ms() -> u64 {
        3000
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(MIN_TIMEOUT_MS))
    }

    pub fn build(
        self,
        store: Arc<dyn RecordStore + Send + Sync>,
        cache: Arc<LookupCache>,
    ) -> Result<HealthChecker, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(self.timeout()).build()?;
        Ok(HealthChecker {
            store,
            cache,
            client,
            interval: self.interval(),
        })
    }
}

/// Background task probing every record that carries a health URL. A
/// record is healthy iff the GET comes back with a status below 500;
/// timeouts and transport failures count as unhealthy.
pub struct HealthChecker {
    store: Arc<dyn RecordStore + Send + Sync>,
    cache: Arc<LookupCache>,
    client: reqwest::Client,
    interval: Duration,
}

fn truncate_error(error: String) -> String {
    error.chars().take(255).collect()
}

impl HealthChecker {
    async fn probe(&self, target: &HealthTarget) -> (bool, Option<String>) {
        match self.client.get(&target.url).send().await {
            Ok(response) if response.status().as_u16() < 500 => (true, None),
            Ok(response) => (
                false,
                Some(format!("status {}", response.status().as_u16())),
            ),
            Err(error) => (false, Some(truncate_error(error.to_string()))),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn pass(&self) {
        let targets = match self.store.health_targets().await {
            Ok(targets) => targets,
            Err(error) => {
                tracing::error!("unable to list health targets: {error:?}");
                return;
            }
        };
        if targets.is_empty() {
            return;
        }

        let results: Vec<(i64, bool, Option<String>)> = futures::stream::iter(targets.iter())
            .map(|target| async move {
                let (healthy, error) = self.probe(target).await;
                (target.record_id, healthy, error)
            })
            .buffer_unordered(CONCURRENT_PROBES)
            .collect()
            .await;

        let mut unhealthy = 0usize;
        for (record_id, healthy, error) in &results {
            if !healthy {
                unhealthy += 1;
                tracing::warn!("record {record_id} unhealthy: {error:?}");
            }
            if let Err(error) = self
                .store
                .update_health(*record_id, *healthy, error.as_deref())
                .await
            {
                tracing::error!("unable to persist health of record {record_id}: {error:?}");
            }
        }

        // the serving path reads health through the cache, so stale
        // entries have to go now rather than at TTL expiry
        self.cache.clear();
        tracing::info!(
            "health pass complete: {} probed, {} unhealthy",
            results.len(),
            unhealthy
        );
    }

    pub async fn run(&self) {
        if self.interval.is_zero() {
            tracing::info!("health checker disabled");
            std::future::pending::<()>().await;
        }
        let mut interval = tokio::time::interval(self.interval);
        loop {
            interval.tick().await;
            self.pass().await;
        }
    }
}

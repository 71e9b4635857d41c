use crate::model::record::StoredRecord;
use moka::future::Cache;
use std::ops::Add;
use std::time::{Duration, SystemTime};

#[derive(Clone, Debug, serde::Deserialize)]
pub struct Config {
    #[serde(default = "Config::default_size")]
    pub size: u64,
    #[serde(default = "Config::default_ttl_seconds")]
    pub ttl_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            size: Self::default_size(),
            ttl_seconds: Self::default_ttl_seconds(),
        }
    }
}

impl Config {
    pub fn default_size() -> u64 {
        10_000
    }

    pub fn default_ttl_seconds() -> u64 {
        5
    }

    pub fn build(self) -> LookupCache {
        LookupCache::new(self.size, Duration::from_secs(self.ttl_seconds))
    }
}

/// In-memory layer in front of the store's name lookup. Entries hold
/// the unfiltered row list, so one entry answers any qtype from any
/// client; selection runs on every read. A zero TTL disables the cache
/// entirely.
pub struct LookupCache {
    inner: Cache<String, (SystemTime, Vec<StoredRecord>)>,
    ttl: Duration,
}

impl LookupCache {
    fn new(size: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::new(size),
            ttl,
        }
    }

    #[tracing::instrument(skip(self, records))]
    pub async fn persist(&self, fqdn: &str, records: Vec<StoredRecord>) {
        if self.ttl.is_zero() {
            return;
        }
        let deadline = SystemTime::now().add(self.ttl);
        self.inner.insert(fqdn.to_string(), (deadline, records)).await;
    }

    #[tracing::instrument(skip(self))]
    pub async fn request(&self, fqdn: &str) -> Option<Vec<StoredRecord>> {
        if self.ttl.is_zero() {
            return None;
        }
        let key = fqdn.to_string();
        if let Some((until, records)) = self.inner.get(&key) {
            if until > SystemTime::now() {
                tracing::debug!("found in cache");
                Some(records)
            } else {
                tracing::debug!("found in cache but expired");
                self.inner.invalidate(&key).await;
                None
            }
        } else {
            tracing::debug!("not found in cache");
            None
        }
    }

    /// Whole-cache invalidation, the primitive every write path uses.
    pub fn clear(&self) {
        self.inner.invalidate_all();
    }
}

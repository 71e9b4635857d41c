use dashmap::DashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

#[derive(Clone, Debug, serde::Deserialize)]
pub struct Config {
    #[serde(default = "Config::default_qps")]
    pub qps: f64,
    #[serde(default = "Config::default_burst")]
    pub burst: f64,
    #[serde(default = "Config::default_block_seconds")]
    pub block_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            qps: Self::default_qps(),
            burst: Self::default_burst(),
            block_seconds: Self::default_block_seconds(),
        }
    }
}

impl Config {
    pub fn default_qps() -> f64 {
        200.0
    }

    pub fn default_burst() -> f64 {
        400.0
    }

    pub fn default_block_seconds() -> u64 {
        10
    }

    pub fn build(self) -> RateLimiter {
        RateLimiter::new(self.qps, self.burst, Duration::from_secs(self.block_seconds))
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last: Instant,
    blocked_until: Option<Instant>,
}

/// Token bucket per source address with a cool-down block. The table
/// would otherwise grow one entry per spoofed source, so a periodic
/// sweep drops buckets idle longer than ten block periods.
pub struct RateLimiter {
    inner: DashMap<IpAddr, Bucket>,
    qps: f64,
    burst: f64,
    block: Duration,
}

impl RateLimiter {
    fn new(qps: f64, burst: f64, block: Duration) -> Self {
        Self {
            inner: DashMap::new(),
            qps,
            burst,
            block,
        }
    }

    /// Whether a datagram from `source` may be answered.
    pub fn check(&self, source: IpAddr) -> bool {
        self.check_at(source, Instant::now())
    }

    fn check_at(&self, source: IpAddr, now: Instant) -> bool {
        let mut bucket = self.inner.entry(source).or_insert_with(|| Bucket {
            tokens: self.burst,
            last: now,
            blocked_until: None,
        });

        if let Some(until) = bucket.blocked_until {
            if now < until {
                return false;
            }
            bucket.blocked_until = None;
        }

        let elapsed = now.saturating_duration_since(bucket.last).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.qps).min(self.burst);
        bucket.last = now;

        if bucket.tokens < 1.0 {
            bucket.blocked_until = Some(now + self.block);
            return false;
        }
        bucket.tokens -= 1.0;
        true
    }

    fn sweep_at(&self, now: Instant) {
        let idle = self.block * 10;
        self.inner.retain(|_, bucket| {
            now.saturating_duration_since(bucket.last) < idle
                || bucket.blocked_until.map_or(false, |until| until > now)
        });
    }

    /// Periodic eviction of idle buckets; cancelled with the rest of the
    /// process on shutdown.
    pub async fn run(&self) {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        interval.tick().await;
        loop {
            interval.tick().await;
            self.sweep_at(Instant::now());
            tracing::debug!("rate limit table holds {} sources", self.inner.len());
        }
    }
}

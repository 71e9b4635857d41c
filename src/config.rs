use crate::repository::{cache, health, ratelimit};
use crate::service::database;
use std::net::IpAddr;
use std::path::PathBuf;

/// Process configuration, read from `DNS_*` environment variables. The
/// field names mirror the variable names with the prefix stripped, so
/// `DNS_CACHE_TTL_SECONDS` lands in `cache_ttl_seconds`.
#[derive(Debug, serde::Deserialize)]
pub struct Config {
    #[serde(default = "crate::dns::config::Config::default_host")]
    pub host: IpAddr,
    #[serde(default = "crate::dns::config::Config::default_port")]
    pub port: u16,
    #[serde(default = "Config::default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "cache::Config::default_ttl_seconds")]
    pub cache_ttl_seconds: u64,
    #[serde(default = "health::Config::default_interval_seconds")]
    pub health_check_interval_seconds: u64,
    #[serde(default = "health::Config::default_timeout_ms")]
    pub health_check_timeout_ms: u64,
    #[serde(default = "ratelimit::Config::default_qps")]
    pub rate_limit_qps: f64,
    #[serde(default = "ratelimit::Config::default_burst")]
    pub rate_limit_burst: f64,
    #[serde(default = "ratelimit::Config::default_block_seconds")]
    pub rate_limit_block_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: crate::dns::config::Config::default_host(),
            port: crate::dns::config::Config::default_port(),
            db_path: Self::default_db_path(),
            cache_ttl_seconds: cache::Config::default_ttl_seconds(),
            health_check_interval_seconds: health::Config::default_interval_seconds(),
            health_check_timeout_ms: health::Config::default_timeout_ms(),
            rate_limit_qps: ratelimit::Config::default_qps(),
            rate_limit_burst: ratelimit::Config::default_burst(),
            rate_limit_block_seconds: ratelimit::Config::default_block_seconds(),
        }
    }
}

impl Config {
    fn default_db_path() -> PathBuf {
        PathBuf::from("./data/dns.sqlite")
    }

    pub fn load() -> Self {
        let conf = ::config::Config::builder()
            .add_source(::config::Environment::with_prefix("DNS").try_parsing(true))
            .build()
            .expect("unable to read environment configuration");
        conf.try_deserialize()
            .expect("configuration format invalid")
    }

    pub fn dns(&self) -> crate::dns::config::Config {
        crate::dns::config::Config {
            host: self.host,
            port: self.port,
        }
    }

    pub fn database(&self) -> database::Config {
        database::Config {
            path: self.db_path.clone(),
        }
    }

    pub fn cache(&self) -> cache::Config {
        cache::Config {
            size: cache::Config::default_size(),
            ttl_seconds: self.cache_ttl_seconds,
        }
    }

    pub fn health(&self) -> health::Config {
        health::Config {
            interval_seconds: self.health_check_interval_seconds,
            timeout_ms: self.health_check_timeout_ms,
        }
    }

    pub fn rate_limit(&self) -> ratelimit::Config {
        ratelimit::Config {
            qps: self.rate_limit_qps,
            burst: self.rate_limit_burst,
            block_seconds: self.rate_limit_block_seconds,
        }
    }
}

use crate::repository::store::SqliteRecordStore;
use clap::Args;
use shepherd_server::UdpServer;
use std::sync::Arc;

pub mod config;
pub mod error;
pub mod handler;
pub mod selection;

/// Starts the DNS server, the core of the machine
#[derive(Args, Debug)]
pub struct Command;

impl Command {
    pub async fn run(&self, config: crate::config::Config) {
        tracing::info!("preparing dns server");
        let pool = config
            .database()
            .build()
            .await
            .expect("unable to open the record store");
        crate::service::database::migrate(&pool)
            .await
            .expect("unable to run database migration");

        let store = Arc::new(SqliteRecordStore::new(pool.clone()));
        let cache = Arc::new(config.cache().build());
        let limiter = Arc::new(config.rate_limit().build());
        let checker = config
            .health()
            .build(store.clone(), cache.clone())
            .expect("unable to build health checker");

        let handler = handler::DnsHandler::new(store, cache, limiter.clone());
        let server = UdpServer::new(config.dns().address(), handler);

        tokio::select! {
            result = server.run() => {
                if let Err(error) = result {
                    tracing::error!("dns server stopped: {error:?}");
                }
            }
            _ = checker.run() => {}
            _ = limiter.run() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
            }
        }
        pool.close().await;
    }
}

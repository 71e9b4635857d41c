use crate::repository::ddns::DdnsService;
use clap::Args;
use std::sync::Arc;

/// Replaces the A-record a dynamic-DNS credential is bound to
#[derive(Args, Debug)]
pub struct Command {
    /// The opaque credential secret
    token: String,
    /// The new IPv4 address
    #[arg(short, long)]
    ip: String,
    /// Recorded in the audit trail
    #[arg(long, default_value = "shepherd-cli")]
    user_agent: String,
}

impl Command {
    pub async fn run(&self, config: crate::config::Config) {
        let pool = config
            .database()
            .build()
            .await
            .expect("unable to open the record store");
        crate::service::database::migrate(&pool)
            .await
            .expect("unable to run database migration");

        // this process has its own empty cache; the serving process
        // converges within its cache TTL
        let cache = Arc::new(config.cache().build());
        let service = DdnsService::new(pool, cache);
        match service
            .update(&self.token, Some(&self.ip), None, None, &self.user_agent)
            .await
        {
            Ok(outcome) => {
                println!(
                    "{} -> {} (changed: {})",
                    outcome.fqdn, outcome.ip, outcome.changed
                );
            }
            Err(error) => {
                eprintln!("update failed: {error}");
                std::process::exit(1);
            }
        }
    }
}

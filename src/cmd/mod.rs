pub mod ddns;

use clap::{Parser, Subcommand};

/// Authoritative DNS server with weighted, geo-targeted and health-checked routing
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    inner: Commands,
}

impl Args {
    pub async fn run(self) {
        let config = crate::config::Config::load();
        match self.inner {
            Commands::Serve(inner) => inner.run(config).await,
            Commands::Ddns(inner) => inner.run(config).await,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start the UDP DNS server
    Serve(crate::dns::Command),
    /// Apply a dynamic-DNS update through a credential
    Ddns(ddns::Command),
}

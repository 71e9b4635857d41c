use clap::Parser;

#[tokio::main]
async fn main() {
    shepherd::init_logs();
    shepherd::cmd::Args::parse().run().await;
}

use anyhow::Result;
use clap::Parser;
use telegram_client::TelegramClient;
use tilradar_workers::collector::MessageCollector;
use tilradar_workers::{Config, Pass};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Message collector: harvests recent posts from discovered channels.
#[derive(Parser)]
struct Args {
    /// Run a single pass and exit instead of looping.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("tilradar=info".parse()?))
        .init();

    let args = Args::parse();

    info!("Tilradar message collector starting...");

    let config = Config::collector_from_env();
    config.log_redacted();

    let mut conn = tilradar_store::connect(&config.database_url).await?;
    tilradar_store::migrate(&mut conn).await?;
    drop(conn);

    let api = TelegramClient::new(config.gateway_url.clone(), config.gateway_token.clone());
    let collector = MessageCollector::new(api, &config);

    if args.once {
        let outcome = collector.pass().await?;
        info!(worked = matches!(outcome, Pass::Worked), "Single pass complete");
        return Ok(());
    }

    collector.run().await
}

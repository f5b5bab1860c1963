use anyhow::Result;
use clap::Parser;
use langid_client::LangIdClient;
use tilradar_workers::classifier::Classifier;
use tilradar_workers::{Config, Pass};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Classifier: scores harvested messages for target-language content.
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

    info!("Tilradar classifier starting...");

    let config = Config::classifier_from_env();
    config.log_redacted();

    let mut conn = tilradar_store::connect(&config.database_url).await?;
    tilradar_store::migrate(&mut conn).await?;
    drop(conn);

    let model = LangIdClient::new(config.langid_url.clone());
    let classifier = Classifier::new(model, &config);

    if args.once {
        let outcome = classifier.pass().await?;
        info!(worked = matches!(outcome, Pass::Worked), "Single pass complete");
        return Ok(());
    }

    classifier.run().await
}

use anyhow::Result;
use clap::Parser;
use tilradar_store::{channel, ExclusionFlag};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Register or adjust a seed channel so the workers have somewhere to start.
#[derive(Parser)]
struct Args {
    /// Platform-assigned channel id.
    #[arg(long)]
    channel_id: i64,

    /// Public handle of the channel.
    #[arg(long)]
    username: String,

    /// Display title; defaults to the handle.
    #[arg(long)]
    title: Option<String>,

    /// Subscriber count to record until the first real sighting.
    #[arg(long, default_value_t = 0)]
    subscribers: i64,

    /// Mark the channel as confirmed in the target population.
    #[arg(long, conflicts_with = "excluded")]
    confirmed: bool,

    /// Mark the channel as excluded from the target population.
    #[arg(long)]
    excluded: bool,

    #[arg(long, env = "DATABASE_URL")]
    database_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("tilradar=info".parse()?))
        .init();

    let args = Args::parse();

    let flag = if args.confirmed {
        ExclusionFlag::Confirmed
    } else if args.excluded {
        ExclusionFlag::Excluded
    } else {
        ExclusionFlag::Unvetted
    };

    let mut conn = tilradar_store::connect(&args.database_url).await?;
    tilradar_store::migrate(&mut conn).await?;

    channel::upsert_seed(
        &mut conn,
        args.channel_id,
        &args.username,
        args.title.as_deref(),
        args.subscribers,
        flag,
    )
    .await?;

    info!(
        channel_id = args.channel_id,
        username = %args.username,
        flag = flag.as_i16(),
        "Seed channel registered"
    );
    Ok(())
}

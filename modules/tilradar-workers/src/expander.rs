use std::time::Duration;

use sqlx::Connection;
use tilradar_store::{channel, recommendation};
use tracing::{debug, error, info};

use crate::error::WorkerError;
use crate::throttle;
use crate::traits::ChannelApi;
use crate::{Config, Pass};

/// Grows the channel frontier: picks the best unexpanded seed, asks the
/// platform who it recommends, and records the answers.
pub struct FrontierExpander<A> {
    api: A,
    database_url: String,
    min_subscribers: i64,
    delay_base: Duration,
    delay_jitter: Duration,
    idle: Duration,
}

impl<A: ChannelApi> FrontierExpander<A> {
    pub fn new(api: A, config: &Config) -> Self {
        Self {
            api,
            database_url: config.database_url.clone(),
            min_subscribers: config.min_subscribers,
            delay_base: Duration::from_secs(config.api_delay_base_secs),
            delay_jitter: Duration::from_secs(config.api_delay_jitter_secs),
            idle: Duration::from_secs(config.idle_secs),
        }
    }

    /// Run until the process is stopped or the platform orders a cool-down.
    pub async fn run(&self) -> anyhow::Result<()> {
        info!(min_subscribers = self.min_subscribers, "Frontier expander running");
        loop {
            match self.pass().await {
                Ok(Pass::Worked) => {}
                Ok(Pass::NoWork) => {
                    debug!("No expandable seed, waiting");
                }
                Err(WorkerError::RateLimited { retry_after }) => {
                    error!(retry_after, "Platform rate limit hit, exiting for cool-down");
                    anyhow::bail!("platform rate limit: cool down {retry_after}s");
                }
                Err(err) => {
                    error!(error = %err, "Expansion pass failed, seed left unclaimed");
                }
            }
            tokio::time::sleep(self.idle).await;
        }
    }

    /// One unit of work: expand a single seed's recommendations.
    ///
    /// Everything the pass writes (registry upserts, graph edges, the claim)
    /// commits atomically, so a crash mid-pass leaves the seed reclaimable.
    pub async fn pass(&self) -> Result<Pass, WorkerError> {
        let mut conn = tilradar_store::connect(&self.database_url).await?;

        let Some(seed) = channel::next_expansion_seed(&mut conn, self.min_subscribers).await?
        else {
            return Ok(Pass::NoWork);
        };

        throttle::pre_call_delay(self.delay_base, self.delay_jitter).await;

        let sightings = self.api.recommended_channels(&seed.username).await?;

        let mut tx = conn.begin().await?;
        let registered = channel::upsert_sightings(&mut *tx, &sightings).await?;
        let recommended_ids: Vec<i64> = sightings.iter().map(|s| s.channel_id).collect();
        let new_edges =
            recommendation::insert_edges(&mut *tx, seed.channel_id, &recommended_ids).await?;
        channel::mark_recommendations_claimed(&mut *tx, seed.channel_id).await?;
        tx.commit().await?;

        info!(
            seed = seed.channel_id,
            username = %seed.username,
            returned = sightings.len(),
            registered,
            new_edges,
            "Expanded recommendation frontier"
        );
        Ok(Pass::Worked)
    }
}

use std::time::Duration;

use sqlx::Connection;
use tilradar_store::{channel, message, MessageSighting};
use tracing::{debug, error, info};

use crate::error::WorkerError;
use crate::throttle;
use crate::traits::ChannelApi;
use crate::{Config, Pass};

/// Harvests one channel's recent messages per pass and claims the channel.
pub struct MessageCollector<A> {
    api: A,
    database_url: String,
    min_subscribers: i64,
    fetch_limit: u32,
    delay_base: Duration,
    delay_jitter: Duration,
    idle: Duration,
}

impl<A: ChannelApi> MessageCollector<A> {
    pub fn new(api: A, config: &Config) -> Self {
        Self {
            api,
            database_url: config.database_url.clone(),
            min_subscribers: config.min_subscribers,
            fetch_limit: config.batch_limit,
            delay_base: Duration::from_secs(config.api_delay_base_secs),
            delay_jitter: Duration::from_secs(config.api_delay_jitter_secs),
            idle: Duration::from_secs(config.idle_secs),
        }
    }

    /// Run until the process is stopped or the platform orders a cool-down.
    pub async fn run(&self) -> anyhow::Result<()> {
        info!(
            min_subscribers = self.min_subscribers,
            fetch_limit = self.fetch_limit,
            "Message collector running"
        );
        loop {
            match self.pass().await {
                Ok(Pass::Worked) => {}
                Ok(Pass::NoWork) => {
                    debug!("No harvestable channel, waiting");
                }
                Err(WorkerError::RateLimited { retry_after }) => {
                    error!(retry_after, "Platform rate limit hit, exiting for cool-down");
                    anyhow::bail!("platform rate limit: cool down {retry_after}s");
                }
                Err(err) => {
                    error!(error = %err, "Harvest pass failed, channel left unclaimed");
                }
            }
            tokio::time::sleep(self.idle).await;
        }
    }

    /// One unit of work: harvest a single channel's recent messages.
    ///
    /// A failed fetch writes nothing, so the channel stays eligible for the
    /// next pass. On success the inserts and the claim commit together.
    pub async fn pass(&self) -> Result<Pass, WorkerError> {
        let mut conn = tilradar_store::connect(&self.database_url).await?;

        let Some(target) = channel::next_harvest_target(&mut conn, self.min_subscribers).await?
        else {
            return Ok(Pass::NoWork);
        };

        throttle::pre_call_delay(self.delay_base, self.delay_jitter).await;

        let fetched = self
            .api
            .recent_messages(&target.username, self.fetch_limit)
            .await?;
        let total = fetched.len();
        let own: Vec<MessageSighting> = fetched.into_iter().filter(|m| !m.forwarded).collect();
        let forwarded_dropped = total - own.len();

        let mut tx = conn.begin().await?;
        let inserted = message::insert_sightings(&mut *tx, target.channel_id, &own).await?;
        channel::mark_messages_claimed(&mut *tx, target.channel_id).await?;
        tx.commit().await?;

        info!(
            channel = target.channel_id,
            username = %target.username,
            fetched = total,
            forwarded_dropped,
            inserted,
            "Harvested channel messages"
        );
        Ok(Pass::Worked)
    }
}

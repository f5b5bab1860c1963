use std::time::Duration;

use sqlx::Connection;
use tilradar_store::{channel, message, ScoredMessage};
use tracing::{error, info};

use crate::error::WorkerError;
use crate::score;
use crate::traits::LanguageId;
use crate::{Config, Pass};

/// Languages ranked per prediction request.
const RANKING_DEPTH: u32 = 10;

/// Backoff after a database failure, shorter than the idle wait so a blip
/// does not stall the backlog.
const DB_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Scores unanalyzed messages channel by channel and rolls the results up
/// into per-channel aggregates.
pub struct Classifier<L> {
    model: L,
    database_url: String,
    target_lang: String,
    batch_limit: i64,
    idle: Duration,
}

impl<L: LanguageId> Classifier<L> {
    pub fn new(model: L, config: &Config) -> Self {
        Self {
            model,
            database_url: config.database_url.clone(),
            target_lang: config.target_lang.clone(),
            batch_limit: i64::from(config.batch_limit),
            idle: Duration::from_secs(config.idle_secs),
        }
    }

    /// Run until the process is stopped. Drains the backlog without pausing
    /// between batches; idles only when nothing is left to score.
    pub async fn run(&self) -> anyhow::Result<()> {
        info!(
            target_lang = %self.target_lang,
            batch_limit = self.batch_limit,
            "Classifier running"
        );
        loop {
            match self.pass().await {
                Ok(Pass::Worked) => {}
                Ok(Pass::NoWork) => {
                    tokio::time::sleep(self.idle).await;
                }
                Err(WorkerError::Database(err)) => {
                    error!(error = %err, "Scoring pass rolled back, batch stays eligible");
                    tokio::time::sleep(DB_RETRY_BACKOFF).await;
                }
                Err(err) => {
                    error!(error = %err, "Scoring pass failed, batch stays eligible");
                    tokio::time::sleep(self.idle).await;
                }
            }
        }
    }

    /// One unit of work: score the busiest channel's next batch.
    ///
    /// The score writes and the aggregate refresh commit atomically, so the
    /// rolled-up mean and count never drift from the per-message scores.
    pub async fn pass(&self) -> Result<Pass, WorkerError> {
        let mut conn = tilradar_store::connect(&self.database_url).await?;

        let Some(channel_id) = message::busiest_backlog_channel(&mut conn).await? else {
            return Ok(Pass::NoWork);
        };

        let pending = message::fetch_unanalyzed(&mut conn, channel_id, self.batch_limit).await?;
        if pending.is_empty() {
            // Raced another pass; the backlog emptied between the two reads.
            return Ok(Pass::Worked);
        }

        let texts: Vec<String> = pending.iter().map(|m| flatten(&m.text)).collect();
        let rankings = self.model.rank_languages(&texts, RANKING_DEPTH).await?;
        if rankings.len() != pending.len() {
            return Err(WorkerError::Model(format!(
                "ranking count {} does not match batch size {}",
                rankings.len(),
                pending.len()
            )));
        }

        let scores: Vec<ScoredMessage> = pending
            .iter()
            .zip(rankings.iter())
            .map(|(m, ranking)| ScoredMessage {
                id: m.id,
                channel_id: m.channel_id,
                score: score::target_score(ranking, &self.target_lang),
            })
            .collect();

        let mut tx = conn.begin().await?;
        let scored = message::apply_scores(&mut *tx, &scores).await?;
        channel::refresh_content_purity(&mut *tx, channel_id).await?;
        tx.commit().await?;

        info!(
            channel = channel_id,
            scored,
            "Scored message batch and refreshed channel purity"
        );
        Ok(Pass::Worked)
    }
}

/// The model treats newlines as document boundaries; flatten them to spaces.
fn flatten(text: &str) -> String {
    text.replace('\n', " ")
}

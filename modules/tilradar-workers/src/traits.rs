//! Seams between the workers and their external collaborators. The real
//! clients implement these; tests substitute fixed-response fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use langid_client::LangIdClient;
use telegram_client::{GatewayChannel, GatewayMessage, Media, TelegramClient};
use tilradar_store::{ChannelSighting, MediaType, MessageSighting};

use crate::error::WorkerError;
use crate::score;

/// Ranked language guesses for one text: (bare language code, probability).
pub type LanguageRanking = Vec<(String, f32)>;

/// Platform lookups the discovery workers need.
#[async_trait]
pub trait ChannelApi: Send + Sync {
    /// Channels the platform recommends alongside `username`'s channel.
    async fn recommended_channels(
        &self,
        username: &str,
    ) -> Result<Vec<ChannelSighting>, WorkerError>;

    /// The most recent posts of `username`'s channel, forwards included.
    async fn recent_messages(
        &self,
        username: &str,
        limit: u32,
    ) -> Result<Vec<MessageSighting>, WorkerError>;
}

/// Language identification over batches of texts.
#[async_trait]
pub trait LanguageId: Send + Sync {
    /// Rank the `k` most likely languages per text, one ranking per input
    /// text, in input order.
    async fn rank_languages(
        &self,
        texts: &[String],
        k: u32,
    ) -> Result<Vec<LanguageRanking>, WorkerError>;
}

#[async_trait]
impl ChannelApi for TelegramClient {
    async fn recommended_channels(
        &self,
        username: &str,
    ) -> Result<Vec<ChannelSighting>, WorkerError> {
        let channels = self.channel_recommendations(username).await?;
        Ok(channels.into_iter().map(channel_sighting).collect())
    }

    async fn recent_messages(
        &self,
        username: &str,
        limit: u32,
    ) -> Result<Vec<MessageSighting>, WorkerError> {
        let messages = TelegramClient::recent_messages(self, username, limit).await?;
        Ok(messages.into_iter().map(message_sighting).collect())
    }
}

#[async_trait]
impl LanguageId for LangIdClient {
    async fn rank_languages(
        &self,
        texts: &[String],
        k: u32,
    ) -> Result<Vec<LanguageRanking>, WorkerError> {
        let predictions = self.predict(texts, k).await?;
        Ok(predictions
            .into_iter()
            .map(|ranking| {
                ranking
                    .into_iter()
                    .map(|p| (score::bare_code(&p.label).to_string(), p.prob))
                    .collect()
            })
            .collect())
    }
}

fn channel_sighting(ch: GatewayChannel) -> ChannelSighting {
    ChannelSighting {
        channel_id: ch.id,
        title: ch.title,
        username: ch.username,
        observed_at: from_unix_or_now(ch.date),
        access_handle: ch.access_hash,
        subscriber_count: ch.participants_count.unwrap_or(0),
        linked_secondary_id: ch.linked_monoforum_id,
    }
}

fn message_sighting(msg: GatewayMessage) -> MessageSighting {
    MessageSighting {
        id: msg.id,
        posted_at: from_unix_or_now(msg.date),
        text: msg.text,
        media_type: media_label(msg.media),
        forwarded: msg.fwd_from.is_some(),
    }
}

fn from_unix_or_now(secs: Option<i64>) -> DateTime<Utc> {
    secs.and_then(|s| DateTime::from_timestamp(s, 0))
        .unwrap_or_else(Utc::now)
}

/// Classify the wire media object into the stored label set. No attachment
/// means a plain text post.
fn media_label(media: Option<Media>) -> MediaType {
    match media {
        None => MediaType::Text,
        Some(Media::Photo) => MediaType::Photo,
        Some(Media::Video) => MediaType::Video,
        Some(Media::Document) => MediaType::Document,
        Some(Media::Audio) => MediaType::Audio,
        Some(Media::Voice) => MediaType::Voice,
        Some(Media::VideoNote) => MediaType::VideoNote,
        Some(Media::Sticker) => MediaType::Sticker,
        Some(Media::Animation) => MediaType::Animation,
        Some(Media::Poll) => MediaType::Poll,
        Some(Media::Contact) => MediaType::Contact,
        Some(Media::Location) => MediaType::Location,
        Some(Media::WebPage) => MediaType::WebPage,
        Some(Media::Unknown) => MediaType::Other,
    }
}

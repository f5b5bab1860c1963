use chrono::{DateTime, Utc};
use sqlx::PgConnection;

/// Closed label set for message attachments. `Text` means no attachment at
/// all; `Other` covers attachment kinds the gateway grew after this list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Text,
    Photo,
    Video,
    Document,
    Audio,
    Voice,
    VideoNote,
    Sticker,
    Animation,
    Poll,
    Contact,
    Location,
    WebPage,
    Other,
}

impl MediaType {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Text => "text",
            MediaType::Photo => "photo",
            MediaType::Video => "video",
            MediaType::Document => "document",
            MediaType::Audio => "audio",
            MediaType::Voice => "voice",
            MediaType::VideoNote => "video_note",
            MediaType::Sticker => "sticker",
            MediaType::Animation => "animation",
            MediaType::Poll => "poll",
            MediaType::Contact => "contact",
            MediaType::Location => "location",
            MediaType::WebPage => "web_page",
            MediaType::Other => "other",
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A post as fetched from the platform, before filtering and storage.
#[derive(Debug, Clone)]
pub struct MessageSighting {
    pub id: i64,
    pub posted_at: DateTime<Utc>,
    /// None for pure-media posts. Such rows are stored but never scored.
    pub text: Option<String>,
    pub media_type: MediaType,
    /// Forwarded posts are not authored by the channel under study and are
    /// dropped before storage.
    pub forwarded: bool,
}

/// A message awaiting classification.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PendingMessage {
    pub id: i64,
    pub channel_id: i64,
    pub text: String,
}

/// A computed score ready to be written back.
#[derive(Debug, Clone, Copy)]
pub struct ScoredMessage {
    pub id: i64,
    pub channel_id: i64,
    /// Share of target-language content, 0 to 100.
    pub score: i16,
}

/// Insert harvested messages for a channel, skipping ids already stored.
/// Returns the number of newly inserted rows.
pub async fn insert_sightings(
    conn: &mut PgConnection,
    channel_id: i64,
    sightings: &[MessageSighting],
) -> Result<u64, sqlx::Error> {
    let mut inserted = 0;
    for m in sightings {
        let result = sqlx::query(
            r#"
            INSERT INTO messages (id, channel_id, posted_at, text, media_type)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id, channel_id) DO NOTHING
            "#,
        )
        .bind(m.id)
        .bind(channel_id)
        .bind(m.posted_at)
        .bind(&m.text)
        .bind(m.media_type.as_str())
        .execute(&mut *conn)
        .await?;
        inserted += result.rows_affected();
    }
    Ok(inserted)
}

/// The channel with the most unanalyzed, non-empty messages.
pub async fn busiest_backlog_channel(
    conn: &mut PgConnection,
) -> Result<Option<i64>, sqlx::Error> {
    let row = sqlx::query_as::<_, (i64,)>(
        r#"
        SELECT channel_id
        FROM messages
        WHERE analyzed = FALSE
          AND text IS NOT NULL
          AND text <> ''
        GROUP BY channel_id
        ORDER BY COUNT(*) DESC
        LIMIT 1
        "#,
    )
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.map(|(id,)| id))
}

/// Fetch a channel's oldest unanalyzed messages, bounded by `limit`.
pub async fn fetch_unanalyzed(
    conn: &mut PgConnection,
    channel_id: i64,
    limit: i64,
) -> Result<Vec<PendingMessage>, sqlx::Error> {
    sqlx::query_as::<_, PendingMessage>(
        r#"
        SELECT id, channel_id, text
        FROM messages
        WHERE channel_id = $1
          AND analyzed = FALSE
          AND text IS NOT NULL
          AND text <> ''
        ORDER BY posted_at, id
        LIMIT $2
        "#,
    )
    .bind(channel_id)
    .bind(limit)
    .fetch_all(&mut *conn)
    .await
}

/// Write a batch of scores in one statement and mark the rows analyzed.
/// Returns the number of rows updated.
pub async fn apply_scores(
    conn: &mut PgConnection,
    scores: &[ScoredMessage],
) -> Result<u64, sqlx::Error> {
    if scores.is_empty() {
        return Ok(0);
    }
    let ids: Vec<i64> = scores.iter().map(|s| s.id).collect();
    let channel_ids: Vec<i64> = scores.iter().map(|s| s.channel_id).collect();
    let values: Vec<i16> = scores.iter().map(|s| s.score).collect();
    let result = sqlx::query(
        r#"
        UPDATE messages AS m SET
            score = u.score,
            analyzed = TRUE
        FROM (
            SELECT unnest($1::BIGINT[]) AS id,
                   unnest($2::BIGINT[]) AS channel_id,
                   unnest($3::SMALLINT[]) AS score
        ) AS u
        WHERE m.id = u.id
          AND m.channel_id = u.channel_id
        "#,
    )
    .bind(&ids)
    .bind(&channel_ids)
    .bind(&values)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::debug;

/// Tri-state population vetting for a channel. Set by operators and offline
/// review, never by the workers themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i16)]
pub enum ExclusionFlag {
    /// Discovered but not yet reviewed.
    Unvetted = 0,
    /// Reviewed and ruled out of the target population.
    Excluded = 1,
    /// Reviewed and confirmed in the target population.
    Confirmed = 2,
}

impl ExclusionFlag {
    pub fn as_i16(self) -> i16 {
        self as i16
    }
}

/// A channel as observed on the platform during frontier expansion.
#[derive(Debug, Clone)]
pub struct ChannelSighting {
    pub channel_id: i64,
    pub title: String,
    /// Channels without a handle cannot be looked up later; they are skipped
    /// from the registry, though the graph still records edges to them.
    pub username: Option<String>,
    pub observed_at: DateTime<Utc>,
    pub access_handle: Option<i64>,
    pub subscriber_count: i64,
    pub linked_secondary_id: Option<i64>,
}

/// A full registry row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Channel {
    pub channel_id: i64,
    pub title: String,
    pub observed_at: DateTime<Utc>,
    pub access_handle: Option<i64>,
    pub username: String,
    pub subscriber_count: i64,
    pub linked_secondary_id: Option<i64>,
    pub repeat_count: i32,
    pub exclusion_flag: i16,
    pub purity_by_graph: f64,
    pub purity_by_content: f64,
    pub recs_claimed: bool,
    /// 0 = never harvested; 1 = harvest claimed; overwritten with the
    /// analyzed-message count once the classifier aggregates the channel.
    pub messages_claimed: i64,
}

/// The identity a worker needs to process one channel.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SeedChannel {
    pub channel_id: i64,
    pub username: String,
}

/// Upsert freshly sighted channels into the registry.
///
/// A re-sighting refreshes only the volatile fields (subscriber count,
/// linked secondary id) and bumps `repeat_count`; title, claim flags and
/// purity scores are left alone. Sightings without a username are skipped.
/// Returns the number of rows written.
pub async fn upsert_sightings(
    conn: &mut PgConnection,
    sightings: &[ChannelSighting],
) -> Result<u64, sqlx::Error> {
    let mut written = 0;
    for s in sightings {
        let Some(username) = s.username.as_deref() else {
            debug!(channel_id = s.channel_id, "Sighting has no username, not registered");
            continue;
        };
        let result = sqlx::query(
            r#"
            INSERT INTO channels
                (channel_id, title, observed_at, access_handle, username,
                 subscriber_count, linked_secondary_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (channel_id) DO UPDATE SET
                subscriber_count = EXCLUDED.subscriber_count,
                linked_secondary_id = EXCLUDED.linked_secondary_id,
                repeat_count = channels.repeat_count + 1
            "#,
        )
        .bind(s.channel_id)
        .bind(&s.title)
        .bind(s.observed_at)
        .bind(s.access_handle)
        .bind(username)
        .bind(s.subscriber_count)
        .bind(s.linked_secondary_id)
        .execute(&mut *conn)
        .await?;
        written += result.rows_affected();
    }
    Ok(written)
}

/// Pick the next seed for frontier expansion: the largest confirmed channel
/// whose recommendations have not been claimed.
pub async fn next_expansion_seed(
    conn: &mut PgConnection,
    min_subscribers: i64,
) -> Result<Option<SeedChannel>, sqlx::Error> {
    sqlx::query_as::<_, SeedChannel>(
        r#"
        SELECT channel_id, username
        FROM channels
        WHERE recs_claimed = FALSE
          AND exclusion_flag = $1
          AND subscriber_count >= $2
        ORDER BY subscriber_count DESC
        LIMIT 1
        "#,
    )
    .bind(ExclusionFlag::Confirmed.as_i16())
    .bind(min_subscribers)
    .fetch_optional(&mut *conn)
    .await
}

/// Pick the next channel to harvest messages from: the largest not-excluded
/// channel nobody has claimed for harvesting.
pub async fn next_harvest_target(
    conn: &mut PgConnection,
    min_subscribers: i64,
) -> Result<Option<SeedChannel>, sqlx::Error> {
    sqlx::query_as::<_, SeedChannel>(
        r#"
        SELECT channel_id, username
        FROM channels
        WHERE messages_claimed = 0
          AND exclusion_flag <> $1
          AND subscriber_count >= $2
        ORDER BY subscriber_count DESC
        LIMIT 1
        "#,
    )
    .bind(ExclusionFlag::Excluded.as_i16())
    .bind(min_subscribers)
    .fetch_optional(&mut *conn)
    .await
}

/// Mark a seed's recommendations as fetched. Committed together with the
/// sightings and edges of the same pass.
pub async fn mark_recommendations_claimed(
    conn: &mut PgConnection,
    channel_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE channels SET recs_claimed = TRUE WHERE channel_id = $1")
        .bind(channel_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Mark a channel's harvest as claimed. Committed together with the message
/// inserts of the same pass.
pub async fn mark_messages_claimed(
    conn: &mut PgConnection,
    channel_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE channels SET messages_claimed = 1 WHERE channel_id = $1")
        .bind(channel_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Recompute a channel's content purity from its analyzed messages: the mean
/// score lands in `purity_by_content`, the analyzed count in
/// `messages_claimed`. A channel with no analyzed messages is left alone.
pub async fn refresh_content_purity(
    conn: &mut PgConnection,
    channel_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE channels SET
            purity_by_content = agg.mean_score,
            messages_claimed = agg.analyzed_count
        FROM (
            SELECT AVG(score)::DOUBLE PRECISION AS mean_score,
                   COUNT(*) AS analyzed_count
            FROM messages
            WHERE channel_id = $1
              AND analyzed = TRUE
              AND text IS NOT NULL
              AND text <> ''
        ) AS agg
        WHERE channels.channel_id = $1
          AND agg.analyzed_count > 0
        "#,
    )
    .bind(channel_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Register or adjust a seed channel by operator decree. Unlike sighting
/// upserts this may rewrite the username and the vetting flag.
pub async fn upsert_seed(
    conn: &mut PgConnection,
    channel_id: i64,
    username: &str,
    title: Option<&str>,
    subscriber_count: i64,
    flag: ExclusionFlag,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO channels
            (channel_id, title, observed_at, username, subscriber_count, exclusion_flag)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (channel_id) DO UPDATE SET
            username = EXCLUDED.username,
            subscriber_count = EXCLUDED.subscriber_count,
            exclusion_flag = EXCLUDED.exclusion_flag
        "#,
    )
    .bind(channel_id)
    .bind(title.unwrap_or(username))
    .bind(Utc::now())
    .bind(username)
    .bind(subscriber_count)
    .bind(flag.as_i16())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Fetch one registry row.
pub async fn fetch(
    conn: &mut PgConnection,
    channel_id: i64,
) -> Result<Option<Channel>, sqlx::Error> {
    sqlx::query_as::<_, Channel>(
        r#"
        SELECT channel_id, title, observed_at, access_handle, username,
               subscriber_count, linked_secondary_id, repeat_count,
               exclusion_flag, purity_by_graph, purity_by_content,
               recs_claimed, messages_claimed
        FROM channels
        WHERE channel_id = $1
        "#,
    )
    .bind(channel_id)
    .fetch_optional(&mut *conn)
    .await
}

//! Integration tests for the three worker loops, run against the real store
//! with fake platform and model clients.
//! Requires a Postgres instance. Set DATABASE_TEST_URL or these tests are skipped.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Connection, PgConnection};
use tilradar_store::{channel, ChannelSighting, ExclusionFlag, MediaType, MessageSighting};
use tilradar_workers::classifier::Classifier;
use tilradar_workers::collector::MessageCollector;
use tilradar_workers::expander::FrontierExpander;
use tilradar_workers::traits::{ChannelApi, LanguageId, LanguageRanking};
use tilradar_workers::{Config, Pass, WorkerError};
use tokio::sync::Mutex;

// Tests share one database; serialize them so truncation does not race.
static DB_LOCK: Mutex<()> = Mutex::const_new(());

async fn test_db() -> Option<(String, PgConnection)> {
    let url = std::env::var("DATABASE_TEST_URL").ok()?;
    let mut conn = PgConnection::connect(&url).await.ok()?;
    tilradar_store::MIGRATOR.run(&mut conn).await.ok()?;
    sqlx::query("TRUNCATE channels, messages, recommendations")
        .execute(&mut conn)
        .await
        .ok()?;
    Some((url, conn))
}

fn test_config(database_url: &str) -> Config {
    Config {
        database_url: database_url.to_string(),
        gateway_url: String::new(),
        gateway_token: String::new(),
        langid_url: String::new(),
        target_lang: "kk".to_string(),
        min_subscribers: 1_000,
        batch_limit: 100,
        api_delay_base_secs: 0,
        api_delay_jitter_secs: 0,
        idle_secs: 0,
    }
}

fn ts(offset_secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + offset_secs, 0).unwrap()
}

fn channel_sighting(id: i64, username: Option<&str>, subscribers: i64) -> ChannelSighting {
    ChannelSighting {
        channel_id: id,
        title: format!("Channel {id}"),
        username: username.map(str::to_string),
        observed_at: ts(0),
        access_handle: Some(id * 7),
        subscriber_count: subscribers,
        linked_secondary_id: None,
    }
}

fn message_sighting(
    id: i64,
    text: Option<&str>,
    media_type: MediaType,
    forwarded: bool,
) -> MessageSighting {
    MessageSighting {
        id,
        posted_at: ts(id * 60),
        text: text.map(str::to_string),
        media_type,
        forwarded,
    }
}

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Serves fixed responses regardless of the username asked about.
struct StaticApi {
    channels: Vec<ChannelSighting>,
    messages: Vec<MessageSighting>,
}

#[async_trait]
impl ChannelApi for StaticApi {
    async fn recommended_channels(
        &self,
        _username: &str,
    ) -> Result<Vec<ChannelSighting>, WorkerError> {
        Ok(self.channels.clone())
    }

    async fn recent_messages(
        &self,
        _username: &str,
        limit: u32,
    ) -> Result<Vec<MessageSighting>, WorkerError> {
        Ok(self.messages.iter().take(limit as usize).cloned().collect())
    }
}

/// Answers every call with a hard rate limit.
struct RateLimitedApi {
    retry_after: u64,
}

#[async_trait]
impl ChannelApi for RateLimitedApi {
    async fn recommended_channels(
        &self,
        _username: &str,
    ) -> Result<Vec<ChannelSighting>, WorkerError> {
        Err(WorkerError::RateLimited {
            retry_after: self.retry_after,
        })
    }

    async fn recent_messages(
        &self,
        _username: &str,
        _limit: u32,
    ) -> Result<Vec<MessageSighting>, WorkerError> {
        Err(WorkerError::RateLimited {
            retry_after: self.retry_after,
        })
    }
}

/// Answers every call with a transient failure.
struct FlakyApi;

#[async_trait]
impl ChannelApi for FlakyApi {
    async fn recommended_channels(
        &self,
        _username: &str,
    ) -> Result<Vec<ChannelSighting>, WorkerError> {
        Err(WorkerError::Platform("gateway unreachable".into()))
    }

    async fn recent_messages(
        &self,
        _username: &str,
        _limit: u32,
    ) -> Result<Vec<MessageSighting>, WorkerError> {
        Err(WorkerError::Platform("gateway unreachable".into()))
    }
}

/// Rankings looked up by exact text; unknown texts rank nothing.
struct TableModel(HashMap<String, LanguageRanking>);

#[async_trait]
impl LanguageId for TableModel {
    async fn rank_languages(
        &self,
        texts: &[String],
        _k: u32,
    ) -> Result<Vec<LanguageRanking>, WorkerError> {
        Ok(texts
            .iter()
            .map(|t| self.0.get(t).cloned().unwrap_or_default())
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Frontier expander
// ---------------------------------------------------------------------------

#[tokio::test]
async fn expander_registers_recommendations_edges_and_claim_atomically() {
    let _guard = DB_LOCK.lock().await;
    let Some((url, mut conn)) = test_db().await else {
        return;
    };

    channel::upsert_seed(&mut conn, 3, "seed_c", None, 50_000, ExclusionFlag::Confirmed)
        .await
        .unwrap();

    let api = StaticApi {
        channels: vec![
            channel_sighting(4, Some("tiny_d"), 900),
            channel_sighting(5, Some("huge_e"), 2_000_000),
            channel_sighting(6, None, 10_000),
        ],
        messages: Vec::new(),
    };
    let expander = FrontierExpander::new(api, &test_config(&url));

    assert_eq!(expander.pass().await.unwrap(), Pass::Worked);

    // Every returned channel with a username lands in the registry, even the
    // one below the expansion threshold.
    assert!(channel::fetch(&mut conn, 4).await.unwrap().is_some());
    assert!(channel::fetch(&mut conn, 5).await.unwrap().is_some());
    assert!(channel::fetch(&mut conn, 6).await.unwrap().is_none());

    // The graph records all three, the skipped one included.
    let edges = sqlx::query_as::<_, (i64,)>(
        "SELECT COUNT(*) FROM recommendations WHERE seed_channel_id = 3",
    )
    .fetch_one(&mut conn)
    .await
    .unwrap()
    .0;
    assert_eq!(edges, 3);

    let seed = channel::fetch(&mut conn, 3).await.unwrap().unwrap();
    assert!(seed.recs_claimed);

    // Newly discovered channels are unvetted, so nothing is left to expand.
    assert_eq!(expander.pass().await.unwrap(), Pass::NoWork);
}

#[tokio::test]
async fn expander_flood_wait_exits_without_claiming() {
    let _guard = DB_LOCK.lock().await;
    let Some((url, mut conn)) = test_db().await else {
        return;
    };

    channel::upsert_seed(&mut conn, 3, "seed_c", None, 50_000, ExclusionFlag::Confirmed)
        .await
        .unwrap();

    let expander = FrontierExpander::new(RateLimitedApi { retry_after: 77 }, &test_config(&url));

    let err = expander.pass().await.unwrap_err();
    assert!(matches!(err, WorkerError::RateLimited { retry_after: 77 }));

    // Nothing was written: the seed stays claimable for the restarted worker.
    let seed = channel::fetch(&mut conn, 3).await.unwrap().unwrap();
    assert!(!seed.recs_claimed);
    let edges = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM recommendations")
        .fetch_one(&mut conn)
        .await
        .unwrap()
        .0;
    assert_eq!(edges, 0);

    // The run loop surfaces the rate limit as a terminal error.
    let result = tokio::time::timeout(Duration::from_secs(5), expander.run()).await;
    assert!(result.expect("run() must exit on a flood wait").is_err());
}

#[tokio::test]
async fn expander_transient_failure_leaves_seed_for_retry() {
    let _guard = DB_LOCK.lock().await;
    let Some((url, mut conn)) = test_db().await else {
        return;
    };

    channel::upsert_seed(&mut conn, 3, "seed_c", None, 50_000, ExclusionFlag::Confirmed)
        .await
        .unwrap();

    let broken = FrontierExpander::new(FlakyApi, &test_config(&url));
    let err = broken.pass().await.unwrap_err();
    assert!(matches!(err, WorkerError::Platform(_)));
    assert!(!channel::fetch(&mut conn, 3).await.unwrap().unwrap().recs_claimed);

    // The same seed is picked up once the gateway recovers.
    let healed = FrontierExpander::new(
        StaticApi {
            channels: vec![channel_sighting(4, Some("tiny_d"), 900)],
            messages: Vec::new(),
        },
        &test_config(&url),
    );
    assert_eq!(healed.pass().await.unwrap(), Pass::Worked);
    assert!(channel::fetch(&mut conn, 3).await.unwrap().unwrap().recs_claimed);
}

// ---------------------------------------------------------------------------
// Message collector
// ---------------------------------------------------------------------------

#[tokio::test]
async fn collector_drops_forwards_and_claims_channel() {
    let _guard = DB_LOCK.lock().await;
    let Some((url, mut conn)) = test_db().await else {
        return;
    };

    channel::upsert_seed(&mut conn, 9, "big_channel", None, 40_000, ExclusionFlag::Unvetted)
        .await
        .unwrap();

    let api = StaticApi {
        channels: Vec::new(),
        messages: vec![
            message_sighting(1, Some("бірінші хабар"), MediaType::Text, false),
            message_sighting(2, None, MediaType::Photo, false),
            message_sighting(3, Some("бөтен хабар"), MediaType::Text, true),
            message_sighting(4, Some(""), MediaType::WebPage, false),
        ],
    };
    let collector = MessageCollector::new(api, &test_config(&url));

    assert_eq!(collector.pass().await.unwrap(), Pass::Worked);

    let stored = sqlx::query_as::<_, (i64, String)>(
        "SELECT id, media_type FROM messages WHERE channel_id = 9 ORDER BY id",
    )
    .fetch_all(&mut conn)
    .await
    .unwrap();
    assert_eq!(
        stored,
        vec![
            (1, "text".to_string()),
            (2, "photo".to_string()),
            (4, "web_page".to_string()),
        ],
        "the forwarded post is never persisted"
    );

    let row = channel::fetch(&mut conn, 9).await.unwrap().unwrap();
    assert_eq!(row.messages_claimed, 1);

    // The channel is claimed, so the next pass finds nothing.
    assert_eq!(collector.pass().await.unwrap(), Pass::NoWork);
}

#[tokio::test]
async fn collector_flood_wait_writes_nothing_and_exits() {
    let _guard = DB_LOCK.lock().await;
    let Some((url, mut conn)) = test_db().await else {
        return;
    };

    channel::upsert_seed(&mut conn, 9, "big_channel", None, 40_000, ExclusionFlag::Unvetted)
        .await
        .unwrap();

    let collector = MessageCollector::new(RateLimitedApi { retry_after: 120 }, &test_config(&url));

    let err = collector.pass().await.unwrap_err();
    assert!(matches!(err, WorkerError::RateLimited { retry_after: 120 }));

    // No partial rows and no claim: the channel is retried after restart.
    let row = channel::fetch(&mut conn, 9).await.unwrap().unwrap();
    assert_eq!(row.messages_claimed, 0);
    let count = sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM messages")
        .fetch_one(&mut conn)
        .await
        .unwrap()
        .0;
    assert_eq!(count, 0);

    let result = tokio::time::timeout(Duration::from_secs(5), collector.run()).await;
    assert!(result.expect("run() must exit on a flood wait").is_err());
}

#[tokio::test]
async fn collector_transient_failure_leaves_channel_unclaimed() {
    let _guard = DB_LOCK.lock().await;
    let Some((url, mut conn)) = test_db().await else {
        return;
    };

    channel::upsert_seed(&mut conn, 9, "big_channel", None, 40_000, ExclusionFlag::Unvetted)
        .await
        .unwrap();

    let broken = MessageCollector::new(FlakyApi, &test_config(&url));
    assert!(matches!(
        broken.pass().await.unwrap_err(),
        WorkerError::Platform(_)
    ));
    let row = channel::fetch(&mut conn, 9).await.unwrap().unwrap();
    assert_eq!(row.messages_claimed, 0);

    let healed = MessageCollector::new(
        StaticApi {
            channels: Vec::new(),
            messages: vec![message_sighting(1, Some("хабар"), MediaType::Text, false)],
        },
        &test_config(&url),
    );
    assert_eq!(healed.pass().await.unwrap(), Pass::Worked);
    let row = channel::fetch(&mut conn, 9).await.unwrap().unwrap();
    assert_eq!(row.messages_claimed, 1);
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

#[tokio::test]
async fn classifier_scores_batch_and_rolls_up_channel_purity() {
    let _guard = DB_LOCK.lock().await;
    let Some((url, mut conn)) = test_db().await else {
        return;
    };

    channel::upsert_seed(&mut conn, 70, "scored", None, 40_000, ExclusionFlag::Unvetted)
        .await
        .unwrap();
    channel::mark_messages_claimed(&mut conn, 70).await.unwrap();

    let batch = vec![
        message_sighting(1, Some("қазақша мәтін"), MediaType::Text, false),
        message_sighting(2, Some("аралас текст"), MediaType::Text, false),
        message_sighting(3, Some("english only"), MediaType::Text, false),
        message_sighting(4, None, MediaType::Photo, false),
    ];
    tilradar_store::message::insert_sightings(&mut conn, 70, &batch)
        .await
        .unwrap();

    let model = TableModel(HashMap::from([
        (
            "қазақша мәтін".to_string(),
            vec![("kk".to_string(), 0.91), ("ru".to_string(), 0.05)],
        ),
        (
            "аралас текст".to_string(),
            vec![("ru".to_string(), 0.55), ("kk".to_string(), 0.40)],
        ),
        ("english only".to_string(), vec![("en".to_string(), 0.99)]),
    ]));
    let classifier = Classifier::new(model, &test_config(&url));

    assert_eq!(classifier.pass().await.unwrap(), Pass::Worked);

    let scored = sqlx::query_as::<_, (i64, i16, bool)>(
        "SELECT id, score, analyzed FROM messages WHERE channel_id = 70 AND text IS NOT NULL ORDER BY id",
    )
    .fetch_all(&mut conn)
    .await
    .unwrap();
    assert_eq!(scored, vec![(1, 91, true), (2, 40, true), (3, 0, true)]);

    let row = channel::fetch(&mut conn, 70).await.unwrap().unwrap();
    assert!((row.purity_by_content - 131.0 / 3.0).abs() < 1e-9);
    assert_eq!(row.messages_claimed, 3, "claim marker becomes the analyzed count");

    // The media-only post never reached the model and stays unanalyzed.
    let (analyzed,) = sqlx::query_as::<_, (bool,)>(
        "SELECT analyzed FROM messages WHERE channel_id = 70 AND id = 4",
    )
    .fetch_one(&mut conn)
    .await
    .unwrap();
    assert!(!analyzed);

    // Everything scoreable is done; the next pass idles.
    assert_eq!(classifier.pass().await.unwrap(), Pass::NoWork);
}

#[tokio::test]
async fn classifier_model_failure_keeps_batch_eligible() {
    let _guard = DB_LOCK.lock().await;
    let Some((url, mut conn)) = test_db().await else {
        return;
    };

    struct BrokenModel;

    #[async_trait]
    impl LanguageId for BrokenModel {
        async fn rank_languages(
            &self,
            _texts: &[String],
            _k: u32,
        ) -> Result<Vec<LanguageRanking>, WorkerError> {
            Err(WorkerError::Model("sidecar down".into()))
        }
    }

    tilradar_store::message::insert_sightings(
        &mut conn,
        70,
        &[message_sighting(1, Some("қазақша мәтін"), MediaType::Text, false)],
    )
    .await
    .unwrap();

    let classifier = Classifier::new(BrokenModel, &test_config(&url));
    assert!(matches!(
        classifier.pass().await.unwrap_err(),
        WorkerError::Model(_)
    ));

    // Nothing was marked analyzed; the retry scores it.
    let healed = Classifier::new(
        TableModel(HashMap::from([(
            "қазақша мәтін".to_string(),
            vec![("kk".to_string(), 0.8)],
        )])),
        &test_config(&url),
    );
    assert_eq!(healed.pass().await.unwrap(), Pass::Worked);
    let (score,) = sqlx::query_as::<_, (i16,)>(
        "SELECT score FROM messages WHERE channel_id = 70 AND id = 1",
    )
    .fetch_one(&mut conn)
    .await
    .unwrap();
    assert_eq!(score, 80);
}

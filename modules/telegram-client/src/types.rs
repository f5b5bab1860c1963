use serde::Deserialize;

/// Envelope wrapping every gateway response, Bot-API style.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub error_code: Option<u16>,
    pub description: Option<String>,
    pub parameters: Option<ResponseParameters>,
}

/// Extra context the gateway attaches to some failures.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseParameters {
    pub retry_after: Option<u64>,
}

/// A channel as the gateway reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayChannel {
    pub id: i64,
    pub title: String,
    /// Public handle. Private or deleted channels come through without one.
    pub username: Option<String>,
    /// Channel creation time, unix seconds.
    pub date: Option<i64>,
    pub access_hash: Option<i64>,
    pub participants_count: Option<i64>,
    pub linked_monoforum_id: Option<i64>,
}

/// A message as the gateway reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayMessage {
    pub id: i64,
    /// Post time, unix seconds.
    pub date: Option<i64>,
    pub text: Option<String>,
    /// Present when the post was forwarded from elsewhere. The inner shape is
    /// gateway-internal; only presence matters to callers.
    pub fwd_from: Option<serde_json::Value>,
    pub media: Option<Media>,
}

/// Media attachment, tagged by kind. Kinds the gateway grows later
/// deserialize as `Unknown` instead of failing the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Media {
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
    #[serde(other)]
    Unknown,
}

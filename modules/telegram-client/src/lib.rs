pub mod error;
pub mod types;

pub use error::{Result, TelegramError};
pub use types::{GatewayChannel, GatewayMessage, Media};

use serde::de::DeserializeOwned;
use types::Envelope;

/// Error code the gateway uses for a flood wait, mirroring Telegram's own.
const FLOOD_WAIT_CODE: u16 = 429;

pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl TelegramClient {
    pub fn new(base_url: String, token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Channels the platform recommends alongside `username`'s channel.
    pub async fn channel_recommendations(&self, username: &str) -> Result<Vec<GatewayChannel>> {
        let url = format!("{}/channels/{}/recommendations", self.base_url, username);
        self.get(&url).await
    }

    /// The most recent posts of `username`'s channel, newest first.
    pub async fn recent_messages(&self, username: &str, limit: u32) -> Result<Vec<GatewayMessage>> {
        let url = format!(
            "{}/channels/{}/messages?limit={}",
            self.base_url, username, limit
        );
        self.get(&url).await
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        // The gateway wraps errors in the envelope too, but a proxy or load
        // balancer in front of it answers with plain text.
        let envelope: Envelope<T> = match serde_json::from_str(&body) {
            Ok(env) => env,
            Err(err) if status.is_success() => return Err(TelegramError::Parse(err.to_string())),
            Err(_) => {
                return Err(TelegramError::Api {
                    code: status.as_u16(),
                    message: body,
                });
            }
        };

        if envelope.ok {
            return envelope
                .result
                .ok_or_else(|| TelegramError::Parse("ok response without result".to_string()));
        }

        let code = envelope.error_code.unwrap_or(status.as_u16());
        let message = envelope.description.unwrap_or_default();
        if code == FLOOD_WAIT_CODE {
            let retry_after = envelope
                .parameters
                .and_then(|p| p.retry_after)
                .unwrap_or(0);
            tracing::warn!(retry_after, "Gateway demanded a flood wait");
            return Err(TelegramError::FloodWait { retry_after });
        }

        Err(TelegramError::Api { code, message })
    }
}

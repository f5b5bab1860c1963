pub mod error;

pub use error::{LangIdError, Result};

use serde::{Deserialize, Serialize};

/// One ranked language guess for a text, fastText style (`__label__kk`).
#[derive(Debug, Clone, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub prob: f32,
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    texts: &'a [String],
    k: u32,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    predictions: Vec<Vec<Prediction>>,
}

pub struct LangIdClient {
    client: reqwest::Client,
    base_url: String,
}

impl LangIdClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Rank the top `k` languages for each text. The outer response list is
    /// parallel to `texts`; a length mismatch fails the whole call rather
    /// than silently misaligning texts with predictions.
    pub async fn predict(&self, texts: &[String], k: u32) -> Result<Vec<Vec<Prediction>>> {
        let url = format!("{}/predict", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&PredictRequest { texts, k })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LangIdError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: PredictResponse = resp.json().await?;
        if parsed.predictions.len() != texts.len() {
            return Err(LangIdError::Parse(format!(
                "expected {} prediction lists, got {}",
                texts.len(),
                parsed.predictions.len()
            )));
        }
        Ok(parsed.predictions)
    }
}

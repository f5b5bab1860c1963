use langid_client::LangIdError;
use telegram_client::TelegramError;
use thiserror::Error;

/// Failures a worker pass can hit, grouped by the reaction they demand.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The platform ordered a cool-down. The process must stop and let the
    /// supervisor restart it after the wait.
    #[error("Platform rate limit: cool down {retry_after}s")]
    RateLimited { retry_after: u64 },

    /// Retryable platform failure. The unit of work stays unclaimed.
    #[error("Platform request failed: {0}")]
    Platform(String),

    /// Retryable language-model failure. The batch stays unanalyzed.
    #[error("Language model request failed: {0}")]
    Model(String),

    /// Store failure. Any open transaction has already rolled back.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<TelegramError> for WorkerError {
    fn from(err: TelegramError) -> Self {
        match err {
            TelegramError::FloodWait { retry_after } => WorkerError::RateLimited { retry_after },
            other => WorkerError::Platform(other.to_string()),
        }
    }
}

impl From<LangIdError> for WorkerError {
    fn from(err: LangIdError) -> Self {
        WorkerError::Model(err.to_string())
    }
}

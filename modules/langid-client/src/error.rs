use thiserror::Error;

pub type Result<T> = std::result::Result<T, LangIdError>;

#[derive(Debug, Error)]
pub enum LangIdError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Sidecar error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for LangIdError {
    fn from(err: reqwest::Error) -> Self {
        LangIdError::Network(err.to_string())
    }
}

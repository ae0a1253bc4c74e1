use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} returned status {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("{provider} response is missing {field}")]
    MissingField {
        provider: String,
        field: &'static str,
    },

    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

pub type Result<T> = std::result::Result<T, LlmError>;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request to {server} failed: {source}")]
    Http {
        server: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{server} returned {status} for {endpoint}")]
    Status {
        server: String,
        status: u16,
        endpoint: String,
    },

    #[error("failed to decode {endpoint} response from {server}: {message}")]
    Decode {
        server: String,
        endpoint: String,
        message: String,
    },

    #[error("{0}")]
    Other(String),
}

impl SourceError {
    pub fn new(message: impl Into<String>) -> Self {
        SourceError::Other(message.into())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Endpoint not found (404): {0}")]
    NotFound(String),

    #[error("Server error {status} from {url}")]
    ServerError { status: u16, url: String },

    #[error("Unexpected status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("Response body was not valid JSON: {0}")]
    InvalidBody(String),
}

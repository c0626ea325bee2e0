/// Client-side failures.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Client is not configured (gateway URL, domain and key are required)")]
    NotConfigured,

    #[error("Invalid gateway URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gateway rejected the credentials")]
    Unauthorized,

    #[error("Unexpected gateway response: HTTP {0}")]
    UnexpectedStatus(u16),

    #[error("Install failed: {0}")]
    Install(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

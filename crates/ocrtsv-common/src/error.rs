use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrTsvError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Service {endpoint} returned {status}: {body}")]
    Service {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Token alignment failed: {0}")]
    Alignment(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("XML parse error: {0}")]
    Xml(String),

    #[error("TSV error at line {line}: {message}")]
    Tsv { line: usize, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OcrTsvError {
    /// Build a `Service` error from a non-success response, consuming its body.
    pub async fn from_response(endpoint: &str, resp: reqwest::Response) -> Self {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        OcrTsvError::Service {
            endpoint: endpoint.to_string(),
            status,
            body,
        }
    }
}

pub type Result<T> = std::result::Result<T, OcrTsvError>;

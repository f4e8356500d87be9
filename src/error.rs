use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("API error at {endpoint}: {message}")]
    Api { endpoint: String, message: String },

    #[error("Malformed definition file: {0}")]
    Definition(String),
}

pub type Result<T> = std::result::Result<T, ProvisionError>;

//! Errors shared by the serving engine and its adapters.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("invalid request data: {message}")]
    InvalidData { message: String },

    #[error("missing or invalid API key")]
    Unauthorized,

    #[error("cannot satisfy Accept header '{offered}'")]
    NotAcceptable { offered: String },

    #[error("{kind} '{id}' not found")]
    NotFound { kind: String, id: String },

    #[error("upstream registry request failed: {message}")]
    Upstream { message: String },

    #[error("upstream registry returned {status}: {message}")]
    UpstreamStatus { status: u16, message: String },

    #[error("model document is malformed: {message}")]
    Model { message: String },

    #[error("cache error: {0}")]
    Cache(String),

    #[error("index store error: {0}")]
    Index(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl RegistryError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        Self::Upstream {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;

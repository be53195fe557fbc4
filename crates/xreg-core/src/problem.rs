//! RFC-7807 problem documents carrying xRegistry error kinds.
//!
//! Every error response leaves the gateway as a problem document with the
//! xRegistry JSON content type, so clients can parse failures the same way
//! they parse entities.

use crate::error::RegistryError;
use crate::shape::XREGISTRY_CONTENT_TYPE;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const SPEC_ERRORS_BASE: &str =
    "https://github.com/xregistry/spec/blob/main/core/spec.md#error-processing";

/// xRegistry error kinds and their HTTP status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidData,
    Unauthorized,
    NotAcceptable,
    NotFound,
    BadGateway,
    ServerError,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidData => "invalid_data",
            Self::Unauthorized => "unauthorized",
            Self::NotAcceptable => "not_acceptable",
            Self::NotFound => "not_found",
            Self::BadGateway => "bad_gateway",
            Self::ServerError => "server_error",
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            Self::InvalidData => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotAcceptable => StatusCode::NOT_ACCEPTABLE,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::BadGateway => StatusCode::BAD_GATEWAY,
            Self::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn title(self) -> &'static str {
        match self {
            Self::InvalidData => "Invalid request data",
            Self::Unauthorized => "Unauthorized",
            Self::NotAcceptable => "Not acceptable",
            Self::NotFound => "Not found",
            Self::BadGateway => "Upstream registry failure",
            Self::ServerError => "Internal server error",
        }
    }
}

/// RFC-7807 body. `type` is the xRegistry spec anchor for the error kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    #[serde(rename = "type")]
    pub type_uri: String,
    pub title: String,
    pub status: u16,
    pub instance: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Problem {
    pub fn new(kind: ErrorKind, instance: impl Into<String>) -> Self {
        Self {
            type_uri: format!("{SPEC_ERRORS_BASE}-{}", kind.as_str()),
            title: kind.title().to_string(),
            status: kind.status().as_u16(),
            instance: instance.into(),
            detail: None,
            data: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn from_error(err: &RegistryError, instance: &str) -> Self {
        Self::new(kind_for(err), instance).with_detail(err.to_string())
    }
}

impl IntoResponse for Problem {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = serde_json::to_vec(&self).unwrap_or_default();
        (
            status,
            [(header::CONTENT_TYPE, XREGISTRY_CONTENT_TYPE)],
            body,
        )
            .into_response()
    }
}

pub fn kind_for(err: &RegistryError) -> ErrorKind {
    match err {
        RegistryError::InvalidData { .. } => ErrorKind::InvalidData,
        RegistryError::Unauthorized => ErrorKind::Unauthorized,
        RegistryError::NotAcceptable { .. } => ErrorKind::NotAcceptable,
        RegistryError::NotFound { .. } => ErrorKind::NotFound,
        RegistryError::Upstream { .. }
        | RegistryError::UpstreamStatus { .. }
        | RegistryError::Cache(_) => ErrorKind::BadGateway,
        RegistryError::Model { .. }
        | RegistryError::Index(_)
        | RegistryError::Io(_)
        | RegistryError::Json(_) => ErrorKind::ServerError,
    }
}

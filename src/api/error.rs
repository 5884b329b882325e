use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::error::{
    CompileError, ExecutionError, LoadError, ModelError, RetrievalError, StorageError,
};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Model(_) | ApiError::Compile(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Load(LoadError::UnsupportedFormat { .. }) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            ApiError::Load(LoadError::Retrieval {
                source: RetrievalError::NotFound(_),
                ..
            }) => StatusCode::NOT_FOUND,
            ApiError::Load(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Storage(StorageError::AlreadyExists(_)) => StatusCode::CONFLICT,
            ApiError::Storage(StorageError::InvalidFileName(_)) => StatusCode::BAD_REQUEST,
            ApiError::Storage(StorageError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Storage(StorageError::Io { .. }) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Execution(ExecutionError::Timeout { .. }) => StatusCode::REQUEST_TIMEOUT,
            ApiError::Execution(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Model(ModelError::InvalidLimit(_)) => "invalid_limit",
            ApiError::Compile(CompileError::InvalidIdentifier(_)) => "invalid_identifier",
            ApiError::Model(_) => "invalid_model",
            ApiError::Compile(_) => "compile_error",
            ApiError::Load(LoadError::UnsupportedFormat { .. }) => "unsupported_format",
            ApiError::Load(LoadError::Retrieval { .. }) => "retrieval_error",
            ApiError::Load(LoadError::Parse { .. }) => "parse_error",
            ApiError::Storage(_) => "storage_error",
            ApiError::Execution(_) => "execution_error",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = Map::new();
        body.insert("error".into(), json!(self.to_string()));
        body.insert("kind".into(), json!(self.kind()));
        match &self {
            ApiError::Execution(e) => {
                body.insert("sql".into(), json!(e.sql()));
            }
            ApiError::Load(e) => {
                body.insert("file".into(), json!(e.file()));
            }
            _ => {}
        }
        (self.status(), Json(Value::Object(body))).into_response()
    }
}

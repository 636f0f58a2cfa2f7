//! Server error
use axum::{http::StatusCode, response::IntoResponse, Json};

use crate::batch_update::BatchUpdateError;

pub(crate) type HttpResult<T, E = HttpError> = core::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq)]
enum Detail {
    Text(String),
    Json(String),
}

#[derive(Debug, Clone)]
pub(crate) struct HttpError {
    status: StatusCode,
    detail: Option<Detail>,
}

impl HttpError {
    pub fn new(status: StatusCode, message: Option<impl ToString>) -> HttpError {
        Self {
            status,
            detail: message.map(|m| Detail::Text(m.to_string())),
        }
    }

    pub fn unauthorized() -> HttpError {
        Self::new(StatusCode::UNAUTHORIZED, Some("Unauthorized"))
    }

    /// 500 with the message as a JSON string body.
    pub fn internal_server_json(message: impl ToString) -> HttpError {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: Some(Detail::Json(message.to_string())),
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        match self.detail {
            Some(Detail::Text(detail)) => (self.status, detail).into_response(),
            Some(Detail::Json(detail)) => (self.status, Json(detail)).into_response(),
            None => (self.status,).into_response(),
        }
    }
}

impl From<BatchUpdateError> for HttpError {
    fn from(error: BatchUpdateError) -> Self {
        Self::internal_server_json(error)
    }
}

use axum::{http::StatusCode, response::IntoResponse};

use crate::server::http_error::HttpResult;

pub async fn root() -> HttpResult<impl IntoResponse> {
    Ok((StatusCode::OK, "DKIM archive"))
}

use std::{convert::Infallible, sync::Arc, task::Poll};

use axum::{
    http::{header::AUTHORIZATION, HeaderMap, Request},
    response::{IntoResponse, Response},
};
use futures_util::future::BoxFuture;
use tower::{Layer, Service};

use super::http_error::HttpError;
use crate::config::{BatchUpdateConfig, ConfigProvider};

/// A Tower Layer that checks the bearer token against the configured batch update secret.
///
/// The config is resolved once per request. On success it is handed to the handler
/// as a [`BatchUpdateConfig`] request extension.
#[derive(Clone)]
pub struct BatchUpdateAuthLayer {
    config: Arc<dyn ConfigProvider>,
}

impl BatchUpdateAuthLayer {
    pub fn new(config: Arc<dyn ConfigProvider>) -> Self {
        Self { config }
    }
}

impl<S> Layer<S> for BatchUpdateAuthLayer {
    type Service = BatchUpdateAuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BatchUpdateAuthMiddleware {
            inner,
            config: self.config.clone(),
        }
    }
}

/// Middleware that performs the bearer token check.
#[derive(Clone)]
pub struct BatchUpdateAuthMiddleware<S> {
    inner: S,
    config: Arc<dyn ConfigProvider>,
}

/// Whether the `authorization` header carries exactly `Bearer <secret>`.
/// Without a secret nothing is authorized.
fn is_authorized(headers: &HeaderMap, secret: Option<&str>) -> bool {
    let Some(secret) = secret else {
        return false;
    };
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| token == secret)
}

impl<S, ReqBody> Service<Request<ReqBody>> for BatchUpdateAuthMiddleware<S>
where
    S: Service<Request<ReqBody>, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut std::task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let config: BatchUpdateConfig = self.config.resolve();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if !is_authorized(req.headers(), config.secret_token.as_deref()) {
                tracing::warn!("Rejected unauthorized batch update request");
                return Ok(HttpError::unauthorized().into_response());
            }
            req.extensions_mut().insert(config);
            inner.call(req).await
        })
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(authorization: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(authorization).unwrap());
        headers
    }

    #[test]
    fn test_is_authorized() {
        assert!(is_authorized(&headers("Bearer s3cret"), Some("s3cret")));
        assert!(!is_authorized(&headers("Bearer wrong"), Some("s3cret")));
        assert!(!is_authorized(&headers("s3cret"), Some("s3cret")));
        assert!(!is_authorized(&headers("Basic s3cret"), Some("s3cret")));
        assert!(!is_authorized(&headers("Bearer s3cret "), Some("s3cret")));
        assert!(!is_authorized(&HeaderMap::new(), Some("s3cret")));
        assert!(!is_authorized(&headers("Bearer "), None));
        assert!(!is_authorized(&headers("Bearer undefined"), None));
    }
}

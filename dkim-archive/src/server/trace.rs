use std::time::Duration;

use axum::{extract::Request, http::header::USER_AGENT, response::Response, Router};
use tower_http::{
    classify::ServerErrorsFailureClass,
    trace::{
        DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, OnFailure, OnRequest, OnResponse,
        TraceLayer,
    },
};
use tracing::{Level, Span};

/// Paths hit by uptime checks. Their responses are only logged at debug level.
const LIVENESS_PATHS: &[&str] = &["/"];

fn is_liveness_path(path: &str) -> bool {
    LIVENESS_PATHS.contains(&path)
}

/// Name the scheduler calling the endpoint after its user agent.
fn caller(request: &Request) -> &str {
    request
        .headers()
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-")
}

/// Wrap every route in a request span.
///
/// Batch update calls log at info level with the calling scheduler,
/// liveness checks at debug level. Server errors always log at error level.
pub fn with_trace_layer(router: Router) -> Router {
    router.layer(
        TraceLayer::new_for_http()
            .make_span_with(|request: &Request| {
                let path = request.uri().path();
                if is_liveness_path(path) {
                    tracing::span!(Level::DEBUG, "request", path = %path, liveness = true)
                } else {
                    tracing::span!(
                        Level::INFO,
                        "request",
                        method = %request.method(),
                        path = %path,
                        caller = %caller(request),
                    )
                }
            })
            .on_request(|request: &Request, span: &Span| {
                if span.has_field("liveness") {
                    return;
                }
                DefaultOnRequest::new().on_request(request, span);
            })
            .on_response(|response: &Response, latency: Duration, span: &Span| {
                let level = if span.has_field("liveness") {
                    Level::DEBUG
                } else {
                    Level::INFO
                };
                DefaultOnResponse::new()
                    .level(level)
                    .on_response(response, latency, span);
            })
            .on_failure(
                |error: ServerErrorsFailureClass, latency: Duration, span: &Span| {
                    DefaultOnFailure::new().on_failure(error, latency, span);
                },
            ),
    )
}

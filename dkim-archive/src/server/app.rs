use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use axum_server::Handle;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;

use super::app_state::AppState;
use super::auth::BatchUpdateAuthLayer;
use super::routes::{batch_update, root};
use super::trace::with_trace_layer;
use crate::config::ConfigProvider;
use crate::AppContext;

/// Bearer token protected router.
fn create_protected_router(config: Arc<dyn ConfigProvider>) -> Router<AppState> {
    Router::new()
        .route("/api/batch_update", get(batch_update::batch_update))
        .layer(BatchUpdateAuthLayer::new(config))
}

/// Public router without any authentication.
fn create_public_router() -> Router<AppState> {
    Router::new().route("/", get(root::root))
}

/// Create the app
fn create_app(
    state: AppState,
    config: Arc<dyn ConfigProvider>,
) -> axum::routing::IntoMakeService<Router> {
    let app = Router::new()
        .merge(create_protected_router(config))
        .merge(create_public_router())
        .with_state(state)
        .layer(CorsLayer::very_permissive());

    with_trace_layer(app).into_make_service()
}

/// Errors that can occur when building a `DkimArchiveServer`.
#[derive(thiserror::Error, Debug)]
pub enum ServerBuildError {
    /// Failed to bind or start the server.
    #[error("Failed to create server: {0}")]
    Server(anyhow::Error),
}

/// HTTP server exposing the batch update.
///
/// When dropped, the server will stop.
pub struct DkimArchiveServer {
    http_handle: Handle<SocketAddr>,
    join_handle: JoinHandle<()>,
    socket: SocketAddr,
}

impl DkimArchiveServer {
    /// Run the server on the configured listen socket.
    pub async fn start(context: &AppContext) -> Result<Self, ServerBuildError> {
        let state = AppState::new(context.batch_updater());
        let app = create_app(state, context.config_provider.clone());
        let socket = context.config_toml.server.listen_socket;
        let listener = std::net::TcpListener::bind(socket)
            .map_err(|e| ServerBuildError::Server(e.into()))?;
        listener
            .set_nonblocking(true)
            .map_err(|e| ServerBuildError::Server(e.into()))?;
        let socket = listener
            .local_addr()
            .map_err(|e| ServerBuildError::Server(e.into()))?;
        let http_handle = Handle::new();
        let inner_http_handle = http_handle.clone();
        let server =
            axum_server::from_tcp(listener).map_err(|e| ServerBuildError::Server(e.into()))?;
        let join_handle = tokio::spawn(async move {
            server
                .handle(inner_http_handle)
                .serve(app)
                .await
                .unwrap_or_else(|e| tracing::error!("Server error: {}", e));
        });
        tracing::info!("Listening on http://{socket}");
        Ok(Self {
            http_handle,
            join_handle,
            socket,
        })
    }

    /// Get the socket address the server is bound to.
    pub fn listen_socket(&self) -> SocketAddr {
        self.socket
    }
}

impl Drop for DkimArchiveServer {
    fn drop(&mut self) {
        self.http_handle
            .graceful_shutdown(Some(Duration::from_secs(5)));
        self.join_handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use chrono::{Duration as ChronoDuration, Utc};

    use crate::config::{BatchUpdateConfig, ConfigToml, StaticConfigProvider};
    use crate::dns::StaticDkimFetcher;
    use crate::persistence::{MemoryRecordStore, RecordStore};
    use crate::witness::RecordingWitnessGenerator;

    use super::*;

    const SECRET: &str = "test-secret";

    struct Harness {
        store: Arc<MemoryRecordStore>,
        fetcher: Arc<StaticDkimFetcher>,
        witness: Arc<RecordingWitnessGenerator>,
        context: AppContext,
    }

    fn harness(secret_token: Option<&str>, batch_limit: u64) -> Harness {
        let store = Arc::new(MemoryRecordStore::new());
        let fetcher = Arc::new(StaticDkimFetcher::new());
        let witness = Arc::new(RecordingWitnessGenerator::new());
        let config = StaticConfigProvider(BatchUpdateConfig {
            secret_token: secret_token.map(str::to_string),
            batch_limit,
        });
        let context = AppContext::from_parts(
            ConfigToml::test(),
            store.clone(),
            fetcher.clone(),
            witness.clone(),
            Arc::new(config),
        );
        Harness {
            store,
            fetcher,
            witness,
            context,
        }
    }

    fn create_test_server(context: &AppContext) -> TestServer {
        let state = AppState::new(context.batch_updater());
        TestServer::new(create_app(state, context.config_provider.clone())).unwrap()
    }

    #[tokio::test]
    async fn test_root() {
        let h = harness(Some(SECRET), 10);
        let server = create_test_server(&h.context);
        let response = server.get("/").expect_success().await;
        response.assert_status_ok();
    }

    #[tokio::test]
    async fn test_unauthorized_touches_nothing() {
        let h = harness(Some(SECRET), 10);
        h.store
            .create_pair("example.com", "s1", Utc::now() - ChronoDuration::days(2))
            .await
            .unwrap();
        let calls_before = h.store.calls();
        let server = create_test_server(&h.context);

        // No header
        let response = server.get("/api/batch_update").expect_failure().await;
        response.assert_status_unauthorized();
        response.assert_text("Unauthorized");

        // Wrong token
        let response = server
            .get("/api/batch_update")
            .add_header("authorization", "Bearer wrong")
            .expect_failure()
            .await;
        response.assert_status_unauthorized();

        assert_eq!(h.store.calls(), calls_before);
        assert!(h.fetcher.lookups().is_empty());
    }

    #[tokio::test]
    async fn test_missing_secret_rejects_everything() {
        let h = harness(None, 10);
        let server = create_test_server(&h.context);
        for header in ["Bearer ", "Bearer undefined", "Bearer null"] {
            let response = server
                .get("/api/batch_update")
                .add_header("authorization", header)
                .expect_failure()
                .await;
            response.assert_status_unauthorized();
        }
        assert_eq!(h.store.calls(), 0);
    }

    #[tokio::test]
    async fn test_batch_update_success() {
        let h = harness(Some(SECRET), 10);
        let last_update = Utc::now() - ChronoDuration::days(2);
        let pair = h
            .store
            .create_pair("example.com", "s1", last_update)
            .await
            .unwrap();
        h.fetcher.publish("example.com", "s1", "v=DKIM1; p=abc");
        let server = create_test_server(&h.context);

        let response = server
            .get("/api/batch_update")
            .add_header("authorization", format!("Bearer {SECRET}"))
            .expect_success()
            .await;
        response.assert_status_ok();

        let body: serde_json::Value = response.json();
        let updated = body["updatedRecords"].as_array().unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0]["domain"], "example.com");
        assert_eq!(updated[0]["selector"], "s1");
        assert_eq!(
            updated[0]["lastRecordUpdate"],
            serde_json::to_value(last_update).unwrap()
        );

        assert_eq!(h.store.records_of(pair.id).len(), 1);
        assert_eq!(h.witness.count(), 1);
        assert!(h.store.pair(pair.id).unwrap().last_record_update > last_update);
    }

    #[tokio::test]
    async fn test_batch_update_respects_limit() {
        let h = harness(Some(SECRET), 0);
        h.store
            .create_pair("example.com", "s1", Utc::now() - ChronoDuration::days(2))
            .await
            .unwrap();
        let server = create_test_server(&h.context);

        let response = server
            .get("/api/batch_update")
            .add_header("authorization", format!("Bearer {SECRET}"))
            .expect_success()
            .await;
        let body: serde_json::Value = response.json();
        assert_eq!(body["updatedRecords"], serde_json::json!([]));
        assert!(h.fetcher.lookups().is_empty());
    }

    #[tokio::test]
    async fn test_batch_update_failure_is_500() {
        let h = harness(Some(SECRET), 10);
        for (domain, days) in [("first.com", 4), ("second.com", 3), ("third.com", 2)] {
            h.store
                .create_pair(domain, "s", Utc::now() - ChronoDuration::days(days))
                .await
                .unwrap();
        }
        h.fetcher.publish("first.com", "s", "v=DKIM1; p=first");
        h.fetcher.fail("second.com", "s", "SERVFAIL");
        h.fetcher.publish("third.com", "s", "v=DKIM1; p=third");
        let server = create_test_server(&h.context);

        let response = server
            .get("/api/batch_update")
            .add_header("authorization", format!("Bearer {SECRET}"))
            .expect_failure()
            .await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let message: String = response.json();
        assert!(message.contains("s._domainkey.second.com."));
        assert!(message.contains("SERVFAIL"));
        assert_eq!(h.fetcher.lookups().len(), 2);
    }

    #[tokio::test]
    async fn test_server_start_and_drop() {
        let h = harness(Some(SECRET), 10);
        let server = DkimArchiveServer::start(&h.context).await.unwrap();
        let socket = server.listen_socket();
        assert_ne!(socket.port(), 0);

        let response = reqwest::get(format!("http://{socket}/")).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), "DKIM archive");
        drop(server);
    }
}

use std::sync::Arc;

use reqwest::StatusCode;
use serde::Serialize;
use url::Url;

use super::WitnessGenerator;
use crate::persistence::sql::{DkimRecordEntity, DomainSelectorPairEntity};
use crate::persistence::{RecordStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum WitnessError {
    #[error("witness request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("witness service answered {0}")]
    Rejected(StatusCode),
    #[error("failed to mark record as verified: {0}")]
    Store(#[from] StoreError),
}

/// Hex encoded blake3 hash of `<selector>._domainkey.<domain>:<value>`.
pub fn leaf_hash(pair: &DomainSelectorPairEntity, record: &DkimRecordEntity) -> String {
    let leaf = format!("{}:{}", pair.dns_name(), record.value);
    hex::encode(blake3::hash(leaf.as_bytes()).as_bytes())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LeafRequest {
    leaf_hash: String,
}

/// Posts the leaf hash of a record to a witness service
/// and flags the record as verified once the service accepted it.
#[derive(Clone)]
pub struct HttpWitnessGenerator {
    client: reqwest::Client,
    endpoint: Url,
    api_key: Option<String>,
    store: Arc<dyn RecordStore>,
}

impl std::fmt::Debug for HttpWitnessGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpWitnessGenerator")
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}

impl HttpWitnessGenerator {
    pub fn new(endpoint: Url, api_key: Option<String>, store: Arc<dyn RecordStore>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            store,
        }
    }

    /// Submit the record and mark it verified on a 2xx answer.
    pub async fn witness(
        &self,
        pair: &DomainSelectorPairEntity,
        record: &DkimRecordEntity,
    ) -> Result<(), WitnessError> {
        let body = LeafRequest {
            leaf_hash: leaf_hash(pair, record),
        };
        let mut request = self.client.post(self.endpoint.clone()).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(WitnessError::Rejected(response.status()));
        }
        self.store.mark_record_verified(record.id).await?;
        Ok(())
    }
}

impl WitnessGenerator for HttpWitnessGenerator {
    fn generate(&self, pair: &DomainSelectorPairEntity, record: &DkimRecordEntity) {
        let generator = self.clone();
        let pair = pair.clone();
        let record = record.clone();
        tokio::spawn(async move {
            match generator.witness(&pair, &record).await {
                Ok(()) => tracing::info!("Witnessed record {record} of {pair}"),
                Err(e) => tracing::error!("Witness generation for record {record} of {pair} failed: {e}"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{http::HeaderMap, routing::post, Json, Router};
    use chrono::Utc;
    use tokio::sync::mpsc;

    use crate::dns::DkimDnsRecord;
    use crate::persistence::MemoryRecordStore;

    use super::*;

    async fn seeded_store() -> (Arc<MemoryRecordStore>, DomainSelectorPairEntity, DkimRecordEntity) {
        let store = Arc::new(MemoryRecordStore::new());
        let pair = store.create_pair("example.com", "s1", Utc::now()).await.unwrap();
        let record = store
            .create_record(
                &pair,
                &DkimDnsRecord {
                    value: "v=DKIM1; p=abc".to_string(),
                    timestamp: Utc::now(),
                },
            )
            .await
            .unwrap();
        (store, pair, record)
    }

    /// Witness service answering with `status`, forwarding every request it sees.
    async fn witness_service(
        status: StatusCode,
    ) -> (Url, mpsc::UnboundedReceiver<(Option<String>, serde_json::Value)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let app = Router::new().route(
            "/leaf",
            post(move |headers: HeaderMap, Json(body): Json<serde_json::Value>| {
                let tx = tx.clone();
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    let _ = tx.send((auth, body));
                    status
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/leaf").parse().unwrap(), rx)
    }

    #[test]
    fn test_leaf_hash() {
        let pair = DomainSelectorPairEntity {
            id: 1,
            domain: "example.com".to_string(),
            selector: "s1".to_string(),
            last_record_update: Utc::now(),
        };
        let record = DkimRecordEntity {
            id: 1,
            domain_selector_pair_id: 1,
            value: "v=DKIM1; p=abc".to_string(),
            first_seen_at: Utc::now(),
            last_seen_at: Utc::now(),
            provenance_verified: false,
        };
        let expected = blake3::hash(b"s1._domainkey.example.com:v=DKIM1; p=abc");
        assert_eq!(leaf_hash(&pair, &record), expected.to_hex().to_string());
        assert_eq!(leaf_hash(&pair, &record).len(), 64);
    }

    #[tokio::test]
    async fn test_witness_marks_verified() {
        let (store, pair, record) = seeded_store().await;
        let (endpoint, mut requests) = witness_service(StatusCode::OK).await;
        let generator =
            HttpWitnessGenerator::new(endpoint, Some("key".to_string()), store.clone());

        generator.witness(&pair, &record).await.unwrap();

        let (auth, body) = requests.recv().await.unwrap();
        assert_eq!(auth.as_deref(), Some("Bearer key"));
        assert_eq!(body["leafHash"], leaf_hash(&pair, &record));
        assert!(store.records_of(pair.id)[0].provenance_verified);
    }

    #[tokio::test]
    async fn test_witness_rejected_keeps_record_unverified() {
        let (store, pair, record) = seeded_store().await;
        let (endpoint, _requests) = witness_service(StatusCode::INTERNAL_SERVER_ERROR).await;
        let generator = HttpWitnessGenerator::new(endpoint, None, store.clone());

        let result = generator.witness(&pair, &record).await;
        assert!(matches!(
            result,
            Err(WitnessError::Rejected(StatusCode::INTERNAL_SERVER_ERROR))
        ));
        assert!(!store.records_of(pair.id)[0].provenance_verified);
    }

    #[tokio::test]
    async fn test_generate_runs_detached() {
        let (store, pair, record) = seeded_store().await;
        let (endpoint, mut requests) = witness_service(StatusCode::OK).await;
        let generator = HttpWitnessGenerator::new(endpoint, None, store.clone());

        generator.generate(&pair, &record);

        let (auth, _) = requests.recv().await.unwrap();
        assert_eq!(auth, None);
        // The store write happens right after the response.
        for _ in 0..50 {
            if store.records_of(pair.id)[0].provenance_verified {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("record was not marked as verified");
    }
}

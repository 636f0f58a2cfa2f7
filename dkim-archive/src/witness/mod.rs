//! Provenance proofs for newly observed DKIM records.

mod http_witness;
#[cfg(any(test, feature = "testing"))]
mod recording_witness;

use std::sync::Arc;

pub use http_witness::{leaf_hash, HttpWitnessGenerator, WitnessError};
#[cfg(any(test, feature = "testing"))]
pub use recording_witness::RecordingWitnessGenerator;

use crate::config::WitnessToml;
use crate::persistence::sql::{DkimRecordEntity, DomainSelectorPairEntity};
use crate::persistence::RecordStore;

/// Starts witness generation for a record.
///
/// Returns immediately. Implementations own their failures.
pub trait WitnessGenerator: Send + Sync + 'static {
    fn generate(&self, pair: &DomainSelectorPairEntity, record: &DkimRecordEntity);
}

/// Used when no witness endpoint is configured.
#[derive(Debug, Clone, Default)]
pub struct NoopWitnessGenerator;

impl WitnessGenerator for NoopWitnessGenerator {
    fn generate(&self, pair: &DomainSelectorPairEntity, record: &DkimRecordEntity) {
        tracing::debug!("Witness generation disabled, skipping record {record} of {pair}");
    }
}

/// The HTTP generator when `[witness]` names an endpoint, the no-op one otherwise.
pub fn witness_from_config(
    config: &WitnessToml,
    store: Arc<dyn RecordStore>,
) -> Arc<dyn WitnessGenerator> {
    match &config.endpoint {
        Some(endpoint) => Arc::new(HttpWitnessGenerator::new(
            endpoint.clone(),
            config.api_key.clone(),
            store,
        )),
        None => {
            tracing::info!("No witness endpoint configured, witness generation is disabled");
            Arc::new(NoopWitnessGenerator)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::persistence::MemoryRecordStore;

    use super::*;

    #[test]
    fn test_witness_from_config() {
        let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
        // Only checks that both branches build without a runtime.
        let _ = witness_from_config(&WitnessToml::default(), store.clone());
        let config = WitnessToml {
            endpoint: Some("http://localhost:1/leaf".parse().unwrap()),
            api_key: None,
        };
        let _ = witness_from_config(&config, store);
    }
}

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::constants::STALENESS_THRESHOLD;
use crate::dns::{DkimRecordFetcher, FetchError};
use crate::persistence::sql::{DkimRecordEntity, DomainSelectorPairEntity};
use crate::persistence::{RecordStore, StoreError};
use crate::witness::WitnessGenerator;

#[derive(Debug, thiserror::Error)]
pub enum BatchUpdateError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Oldest `last_record_update` that still counts as fresh.
fn staleness_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now - chrono::Duration::seconds(STALENESS_THRESHOLD.as_secs() as i64)
}

/// Runs the refresh loop over its collaborators.
#[derive(Clone)]
pub struct BatchUpdater {
    store: Arc<dyn RecordStore>,
    fetcher: Arc<dyn DkimRecordFetcher>,
    witness: Arc<dyn WitnessGenerator>,
}

impl BatchUpdater {
    pub fn new(
        store: Arc<dyn RecordStore>,
        fetcher: Arc<dyn DkimRecordFetcher>,
        witness: Arc<dyn WitnessGenerator>,
    ) -> Self {
        Self {
            store,
            fetcher,
            witness,
        }
    }

    /// At most `limit` pairs due for a refresh, least recently refreshed first.
    pub async fn select_stale_pairs(
        &self,
        limit: u64,
    ) -> Result<Vec<DomainSelectorPairEntity>, BatchUpdateError> {
        if limit == 0 {
            return Ok(vec![]);
        }
        let cutoff = staleness_cutoff(Utc::now());
        let pairs = self.store.find_stale_pairs(cutoff, limit).await?;
        Ok(pairs)
    }

    /// Fetch the key of one pair and record what was observed.
    ///
    /// Returns the stored record, `None` when nothing is published.
    /// The pair's timestamp is advanced in both cases, but not on error.
    pub async fn refresh_pair(
        &self,
        pair: &DomainSelectorPairEntity,
    ) -> Result<Option<DkimRecordEntity>, BatchUpdateError> {
        let fetched = self.fetcher.fetch(&pair.domain, &pair.selector).await?;

        let record = match fetched {
            Some(fetched) => {
                let record = self.store.upsert_record(pair, &fetched).await?;
                tracing::debug!("Observed record {record} for {pair}");
                if !record.provenance_verified {
                    self.witness.generate(pair, &record);
                }
                Some(record)
            }
            None => {
                tracing::debug!("No DKIM record published for {pair}");
                None
            }
        };

        self.store.update_pair_timestamp(pair, Utc::now()).await?;
        Ok(record)
    }

    /// Refresh up to `limit` stale pairs.
    ///
    /// Returns the selected pairs as they were before the refresh.
    pub async fn run(&self, limit: u64) -> Result<Vec<DomainSelectorPairEntity>, BatchUpdateError> {
        let pairs = self.select_stale_pairs(limit).await?;
        tracing::info!("Refreshing {} stale domain selector pairs", pairs.len());

        for pair in pairs.iter() {
            if let Err(e) = self.refresh_pair(pair).await {
                tracing::error!(
                    domain = %pair.domain,
                    selector = %pair.selector,
                    "Failed to refresh DKIM record: {e}"
                );
                return Err(e);
            }
        }

        tracing::info!("Refreshed {} domain selector pairs", pairs.len());
        Ok(pairs)
    }
}

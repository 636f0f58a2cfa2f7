//! Store gateway used by the batch update.
//!
//! [`RecordStore`] is the seam between the refresh logic and persistence.
//! [`SqlRecordStore`] is the production implementation on top of postgres.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::dns::DkimDnsRecord;
use crate::persistence::sql::{
    DkimRecordEntity, DkimRecordRepository, DomainSelectorPairEntity,
    DomainSelectorPairRepository, SqlDb,
};

/// Errors returned by a [`RecordStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The database query failed.
    #[error("database error: {0}")]
    Sql(#[from] sqlx::Error),
    /// The pair does not exist (anymore).
    #[error("domain selector pair {0} not found")]
    PairNotFound(i32),
    /// The record does not exist (anymore).
    #[error("dkim record {0} not found")]
    RecordNotFound(i64),
}

#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Start tracking a new pair.
    async fn create_pair(
        &self,
        domain: &str,
        selector: &str,
        last_record_update: DateTime<Utc>,
    ) -> Result<DomainSelectorPairEntity, StoreError>;

    /// Pairs last refreshed at or before `updated_before`, oldest first, at most `limit`.
    async fn find_stale_pairs(
        &self,
        updated_before: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<DomainSelectorPairEntity>, StoreError>;

    /// The record of `pair` with exactly `value`, if any.
    async fn find_record(
        &self,
        pair: &DomainSelectorPairEntity,
        value: &str,
    ) -> Result<Option<DkimRecordEntity>, StoreError>;

    /// Create an unverified record first and last seen at the fetch timestamp.
    async fn create_record(
        &self,
        pair: &DomainSelectorPairEntity,
        fetched: &DkimDnsRecord,
    ) -> Result<DkimRecordEntity, StoreError>;

    async fn update_record_last_seen(
        &self,
        record_id: i64,
        last_seen_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Record an observation of `fetched` for `pair`.
    ///
    /// Re-observing a known value only moves its `last_seen_at`, a new value creates a record.
    /// The default goes through [`Self::find_record`] and is not atomic,
    /// implementations backed by a shared store override it.
    async fn upsert_record(
        &self,
        pair: &DomainSelectorPairEntity,
        fetched: &DkimDnsRecord,
    ) -> Result<DkimRecordEntity, StoreError> {
        match self.find_record(pair, &fetched.value).await? {
            Some(mut record) => {
                self.update_record_last_seen(record.id, fetched.timestamp)
                    .await?;
                record.last_seen_at = fetched.timestamp;
                Ok(record)
            }
            None => self.create_record(pair, fetched).await,
        }
    }

    async fn update_pair_timestamp(
        &self,
        pair: &DomainSelectorPairEntity,
        last_record_update: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Flag a record as having a witness proof.
    async fn mark_record_verified(&self, record_id: i64) -> Result<(), StoreError>;
}

/// [`RecordStore`] backed by postgres.
#[derive(Debug, Clone)]
pub struct SqlRecordStore {
    db: SqlDb,
}

impl SqlRecordStore {
    pub fn new(db: SqlDb) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecordStore for SqlRecordStore {
    async fn create_pair(
        &self,
        domain: &str,
        selector: &str,
        last_record_update: DateTime<Utc>,
    ) -> Result<DomainSelectorPairEntity, StoreError> {
        let pair = DomainSelectorPairRepository::create(
            domain,
            selector,
            &last_record_update,
            &mut self.db.pool().into(),
        )
        .await?;
        Ok(pair)
    }

    async fn find_stale_pairs(
        &self,
        updated_before: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<DomainSelectorPairEntity>, StoreError> {
        let pairs = DomainSelectorPairRepository::list_stale(
            &updated_before,
            limit,
            &mut self.db.pool().into(),
        )
        .await?;
        Ok(pairs)
    }

    async fn find_record(
        &self,
        pair: &DomainSelectorPairEntity,
        value: &str,
    ) -> Result<Option<DkimRecordEntity>, StoreError> {
        let record =
            DkimRecordRepository::get_by_value(pair.id, value, &mut self.db.pool().into()).await?;
        Ok(record)
    }

    async fn create_record(
        &self,
        pair: &DomainSelectorPairEntity,
        fetched: &DkimDnsRecord,
    ) -> Result<DkimRecordEntity, StoreError> {
        let record = DkimRecordRepository::create(
            pair.id,
            &fetched.value,
            &fetched.timestamp,
            &mut self.db.pool().into(),
        )
        .await?;
        Ok(record)
    }

    async fn update_record_last_seen(
        &self,
        record_id: i64,
        last_seen_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        DkimRecordRepository::update_last_seen_at(
            record_id,
            &last_seen_at,
            &mut self.db.pool().into(),
        )
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => StoreError::RecordNotFound(record_id),
            e => e.into(),
        })
    }

    async fn upsert_record(
        &self,
        pair: &DomainSelectorPairEntity,
        fetched: &DkimDnsRecord,
    ) -> Result<DkimRecordEntity, StoreError> {
        let record = DkimRecordRepository::upsert(
            pair.id,
            &fetched.value,
            &fetched.timestamp,
            &mut self.db.pool().into(),
        )
        .await?;
        Ok(record)
    }

    async fn update_pair_timestamp(
        &self,
        pair: &DomainSelectorPairEntity,
        last_record_update: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        DomainSelectorPairRepository::update_last_record_update(
            pair.id,
            &last_record_update,
            &mut self.db.pool().into(),
        )
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => StoreError::PairNotFound(pair.id),
            e => e.into(),
        })
    }

    async fn mark_record_verified(&self, record_id: i64) -> Result<(), StoreError> {
        DkimRecordRepository::mark_provenance_verified(record_id, &mut self.db.pool().into())
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => StoreError::RecordNotFound(record_id),
                e => e.into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[tokio::test]
    #[ignore = "requires a running postgres, see TEST_DKIM_CONNECTION_STRING"]
    async fn test_sql_store_reconciliation() {
        let store = SqlRecordStore::new(SqlDb::test().await);
        let pair = store
            .create_pair("example.com", "s1", Utc::now() - Duration::days(2))
            .await
            .unwrap();

        let first = DkimDnsRecord {
            value: "v=DKIM1; p=a".to_string(),
            timestamp: Utc::now() - Duration::hours(1),
        };
        let created = store.upsert_record(&pair, &first).await.unwrap();
        assert!(!created.provenance_verified);

        let again = DkimDnsRecord {
            value: first.value.clone(),
            timestamp: Utc::now(),
        };
        let updated = store.upsert_record(&pair, &again).await.unwrap();
        assert_eq!(updated.id, created.id);

        store.mark_record_verified(updated.id).await.unwrap();
        let found = store
            .find_record(&pair, &first.value)
            .await
            .unwrap()
            .expect("record exists");
        assert!(found.provenance_verified);

        let missing = store.mark_record_verified(found.id + 1000).await;
        assert!(matches!(missing, Err(StoreError::RecordNotFound(_))));
    }
}

//! In-memory [`RecordStore`] for tests.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex, MutexGuard,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::dns::DkimDnsRecord;
use crate::persistence::record_store::{RecordStore, StoreError};
use crate::persistence::sql::{DkimRecordEntity, DomainSelectorPairEntity};

#[derive(Debug, Default)]
struct Tables {
    pairs: Vec<DomainSelectorPairEntity>,
    records: Vec<DkimRecordEntity>,
}

/// Keeps pairs and records in a mutex protected vector.
/// Counts every call so tests can assert that the store was not touched.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    tables: Mutex<Tables>,
    calls: AtomicUsize,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of store operations executed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn pair(&self, id: i32) -> Option<DomainSelectorPairEntity> {
        self.lock().pairs.iter().find(|p| p.id == id).cloned()
    }

    /// All records of a pair, oldest first.
    pub fn records_of(&self, pair_id: i32) -> Vec<DkimRecordEntity> {
        self.lock()
            .records
            .iter()
            .filter(|r| r.domain_selector_pair_id == pair_id)
            .cloned()
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // A panicking test thread must not take the other assertions down with it.
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn tracked(&self) -> MutexGuard<'_, Tables> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.lock()
    }
}

impl Tables {
    fn insert_record(&mut self, pair_id: i32, fetched: &DkimDnsRecord) -> DkimRecordEntity {
        let record = DkimRecordEntity {
            id: self.records.len() as i64 + 1,
            domain_selector_pair_id: pair_id,
            value: fetched.value.clone(),
            first_seen_at: fetched.timestamp,
            last_seen_at: fetched.timestamp,
            provenance_verified: false,
        };
        self.records.push(record.clone());
        record
    }

    fn record_mut(&mut self, record_id: i64) -> Result<&mut DkimRecordEntity, StoreError> {
        self.records
            .iter_mut()
            .find(|r| r.id == record_id)
            .ok_or(StoreError::RecordNotFound(record_id))
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create_pair(
        &self,
        domain: &str,
        selector: &str,
        last_record_update: DateTime<Utc>,
    ) -> Result<DomainSelectorPairEntity, StoreError> {
        let mut tables = self.tracked();
        let pair = DomainSelectorPairEntity {
            id: tables.pairs.len() as i32 + 1,
            domain: domain.to_string(),
            selector: selector.to_string(),
            last_record_update,
        };
        tables.pairs.push(pair.clone());
        Ok(pair)
    }

    async fn find_stale_pairs(
        &self,
        updated_before: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<DomainSelectorPairEntity>, StoreError> {
        let tables = self.tracked();
        let mut stale: Vec<DomainSelectorPairEntity> = tables
            .pairs
            .iter()
            .filter(|p| p.last_record_update <= updated_before)
            .cloned()
            .collect();
        stale.sort_by_key(|p| (p.last_record_update, p.id));
        stale.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(stale)
    }

    async fn find_record(
        &self,
        pair: &DomainSelectorPairEntity,
        value: &str,
    ) -> Result<Option<DkimRecordEntity>, StoreError> {
        let tables = self.tracked();
        Ok(tables
            .records
            .iter()
            .find(|r| r.domain_selector_pair_id == pair.id && r.value == value)
            .cloned())
    }

    async fn create_record(
        &self,
        pair: &DomainSelectorPairEntity,
        fetched: &DkimDnsRecord,
    ) -> Result<DkimRecordEntity, StoreError> {
        let mut tables = self.tracked();
        Ok(tables.insert_record(pair.id, fetched))
    }

    async fn update_record_last_seen(
        &self,
        record_id: i64,
        last_seen_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tracked();
        tables.record_mut(record_id)?.last_seen_at = last_seen_at;
        Ok(())
    }

    async fn upsert_record(
        &self,
        pair: &DomainSelectorPairEntity,
        fetched: &DkimDnsRecord,
    ) -> Result<DkimRecordEntity, StoreError> {
        let mut tables = self.tracked();
        let existing = tables
            .records
            .iter_mut()
            .find(|r| r.domain_selector_pair_id == pair.id && r.value == fetched.value);
        match existing {
            Some(record) => {
                record.last_seen_at = fetched.timestamp;
                Ok(record.clone())
            }
            None => Ok(tables.insert_record(pair.id, fetched)),
        }
    }

    async fn update_pair_timestamp(
        &self,
        pair: &DomainSelectorPairEntity,
        last_record_update: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tracked();
        let stored = tables
            .pairs
            .iter_mut()
            .find(|p| p.id == pair.id)
            .ok_or(StoreError::PairNotFound(pair.id))?;
        stored.last_record_update = last_record_update;
        Ok(())
    }

    async fn mark_record_verified(&self, record_id: i64) -> Result<(), StoreError> {
        let mut tables = self.tracked();
        tables.record_mut(record_id)?.provenance_verified = true;
        Ok(())
    }
}

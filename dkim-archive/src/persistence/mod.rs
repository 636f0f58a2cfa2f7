#[cfg(any(test, feature = "testing"))]
mod memory_record_store;
mod record_store;
pub mod sql;

#[cfg(any(test, feature = "testing"))]
pub use memory_record_store::MemoryRecordStore;
pub use record_store::{RecordStore, SqlRecordStore, StoreError};

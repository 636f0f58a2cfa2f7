//! Refreshing stale domain selector pairs against DNS.
//!
//! One invocation:
//! - Selects the pairs not refreshed within the staleness threshold, oldest first.
//! - Fetches the published DKIM key of each pair, one after another.
//! - Records the observed value and starts witness generation for unverified records.
//! - Moves the pair's `last_record_update` to now.
//!
//! The first failing pair aborts the batch. Pairs processed before keep their changes.

mod batch_updater;

pub use batch_updater::{BatchUpdateError, BatchUpdater};

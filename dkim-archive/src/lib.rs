//! Keeps a history of the DKIM keys domains publish in DNS.
//!
//! A scheduled caller hits `GET /api/batch_update`. Each call refreshes the
//! least recently checked domain selector pairs, records every key value seen
//! and hands new, unverified records to a witness service.

mod app_context;
pub mod batch_update;
pub mod config;
mod constants;
pub mod dns;
pub mod persistence;
mod server;
pub mod tracing;
pub mod witness;

pub use app_context::{AppContext, AppContextConversionError};
pub use batch_update::{BatchUpdateError, BatchUpdater};
pub use config::{ConfigReadError, ConfigToml};
pub use server::{DkimArchiveServer, ServerBuildError};

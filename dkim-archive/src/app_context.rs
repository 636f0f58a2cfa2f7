//!
//! The application context shared between all components.
//! Think of it as a simple Dependency Injection container.
//!
//! Create from a config file: `AppContext::read_from(config_toml)`
//!

use std::sync::Arc;

use crate::{
    batch_update::BatchUpdater,
    config::{ConfigProvider, ConfigToml, EnvConfigProvider},
    dns::{DkimRecordFetcher, HickoryDkimFetcher},
    persistence::{
        sql::{Migrator, SqlDb},
        RecordStore, SqlRecordStore,
    },
    witness::{witness_from_config, WitnessGenerator},
};

/// Errors that can occur when building an `AppContext` from the config.
#[derive(Debug, thiserror::Error)]
pub enum AppContextConversionError {
    /// Failed to open SQL DB.
    #[error("Failed to open SQL DB: {0}")]
    SqlDb(sqlx::Error),
    /// Failed to migrate the SQL DB.
    #[error("Failed to migrate SQL DB: {0}")]
    Migration(anyhow::Error),
    /// Failed to build the DNS resolver.
    #[error("Failed to build DNS resolver: {0}")]
    Resolver(hickory_resolver::error::ResolveError),
}

/// The application context shared between all components.
#[derive(Clone)]
pub struct AppContext {
    pub(crate) config_toml: ConfigToml,
    /// Pairs and their DKIM record history.
    pub(crate) store: Arc<dyn RecordStore>,
    pub(crate) fetcher: Arc<dyn DkimRecordFetcher>,
    pub(crate) witness: Arc<dyn WitnessGenerator>,
    /// Secret and batch limit, resolved on every request.
    pub(crate) config_provider: Arc<dyn ConfigProvider>,
}

impl AppContext {
    /// Connect to the database, apply pending migrations and build the resolver.
    pub async fn read_from(config_toml: ConfigToml) -> Result<Self, AppContextConversionError> {
        let sql_db = SqlDb::connect(&config_toml.general.database_url)
            .await
            .map_err(AppContextConversionError::SqlDb)?;
        Migrator::new(&sql_db)
            .run()
            .await
            .map_err(AppContextConversionError::Migration)?;

        let store: Arc<dyn RecordStore> = Arc::new(SqlRecordStore::new(sql_db));
        let fetcher = HickoryDkimFetcher::from_config(&config_toml.dns)
            .map_err(AppContextConversionError::Resolver)?;
        let witness = witness_from_config(&config_toml.witness, store.clone());
        let config_provider = EnvConfigProvider::new(config_toml.batch_update.clone());

        Ok(Self::from_parts(
            config_toml,
            store,
            Arc::new(fetcher),
            witness,
            Arc::new(config_provider),
        ))
    }

    /// Assemble a context from already built components.
    pub fn from_parts(
        config_toml: ConfigToml,
        store: Arc<dyn RecordStore>,
        fetcher: Arc<dyn DkimRecordFetcher>,
        witness: Arc<dyn WitnessGenerator>,
        config_provider: Arc<dyn ConfigProvider>,
    ) -> Self {
        Self {
            config_toml,
            store,
            fetcher,
            witness,
            config_provider,
        }
    }

    /// The refresh loop wired to this context's components.
    pub fn batch_updater(&self) -> BatchUpdater {
        BatchUpdater::new(
            self.store.clone(),
            self.fetcher.clone(),
            self.witness.clone(),
        )
    }
}

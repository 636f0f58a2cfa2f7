mod connection_string;
mod entities;
mod migration;
mod migrations;
mod migrator;
mod sql_db;
mod unified_executor;

pub use connection_string::ConnectionString;
pub use entities::*;
pub use migrator::Migrator;
pub use sql_db::SqlDb;
pub use unified_executor::UnifiedExecutor;

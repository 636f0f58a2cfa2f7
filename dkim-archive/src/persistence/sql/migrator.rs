use sea_query::{ColumnDef, Expr, PostgresQueryBuilder, Query, SimpleExpr, Table};
use sea_query_binder::SqlxBinder;
use sqlx::{Row, Transaction};

use crate::persistence::sql::{
    migration::MigrationTrait,
    migrations::{M20251016CreateDkimRecordMigration, M20251016CreateDomainSelectorPairMigration},
    SqlDb,
};

/// The name of the migration table to keep track of which migrations have been applied.
const MIGRATION_TABLE: &str = "migrations";

/// Migrator is responsible for running migrations on the database.
pub struct Migrator<'a> {
    db: &'a SqlDb,
}

impl<'a> Migrator<'a> {
    pub fn new(db: &'a SqlDb) -> Self {
        Self { db }
    }

    /// Returns a list of migrations to run.
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        // Add new migrations here. They run from top to bottom.
        vec![
            Box::new(M20251016CreateDomainSelectorPairMigration),
            Box::new(M20251016CreateDkimRecordMigration),
        ]
    }

    /// Runs all migrations that are not yet applied.
    pub async fn run(&self) -> anyhow::Result<()> {
        self.run_migrations(Self::migrations()).await
    }

    /// Runs a specific list of migrations.
    pub async fn run_migrations(
        &self,
        migrations: Vec<Box<dyn MigrationTrait>>,
    ) -> anyhow::Result<()> {
        self.create_migration_table().await?;
        let already_applied_migrations = self.get_applied_migrations().await?;
        let migrations_to_run = migrations
            .into_iter()
            .filter(|m| !already_applied_migrations.contains(&m.name().to_string()))
            .collect::<Vec<_>>();

        for migration in migrations_to_run {
            self.run_migration(&*migration).await?;
        }
        Ok(())
    }

    /// Runs a single migration inside its own transaction.
    async fn run_migration(&self, migration: &dyn MigrationTrait) -> anyhow::Result<()> {
        tracing::info!("Running migration {}", migration.name());
        let mut tx = self.db.pool().begin().await?;
        let result = match migration.up(&mut tx).await {
            Ok(()) => Self::mark_migration_as_done(&mut tx, migration.name()).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                tx.commit().await?;
                tracing::info!("Migration {} applied successfully", migration.name());
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to run migration {}: {}", migration.name(), e);
                tx.rollback().await?;
                Err(e)
            }
        }
    }

    /// Creates the migration table if it doesn't exist.
    async fn create_migration_table(&self) -> anyhow::Result<()> {
        let statement = Table::create()
            .table(MIGRATION_TABLE)
            .if_not_exists()
            .col(
                ColumnDef::new("id")
                    .integer()
                    .primary_key()
                    .auto_increment()
                    .not_null(),
            )
            .col(ColumnDef::new("name").string().not_null().unique_key())
            .col(
                ColumnDef::new("created_at")
                    .timestamp()
                    .not_null()
                    .default(Expr::current_timestamp()),
            )
            .to_owned();
        let query = statement.build(PostgresQueryBuilder);
        sqlx::query(query.as_str()).execute(self.db.pool()).await?;
        Ok(())
    }

    /// Returns the names of all migrations that have already run.
    async fn get_applied_migrations(&self) -> anyhow::Result<Vec<String>> {
        let statement = Query::select()
            .column("name")
            .from(MIGRATION_TABLE)
            .to_owned();
        let (query, values) = statement.build_sqlx(PostgresQueryBuilder);
        let rows = sqlx::query_with(&query, values)
            .fetch_all(self.db.pool())
            .await?;

        let migration_names = rows
            .iter()
            .map(|row| row.try_get::<String, _>("name"))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(migration_names)
    }

    async fn mark_migration_as_done(
        tx: &mut Transaction<'static, sqlx::Postgres>,
        migration_name: &str,
    ) -> anyhow::Result<()> {
        let statement = Query::insert()
            .into_table(MIGRATION_TABLE)
            .columns(["name"])
            .values([SimpleExpr::Value(migration_name.into())])?
            .to_owned();
        let (query, values) = statement.build_sqlx(PostgresQueryBuilder);
        sqlx::query_with(&query, values).execute(&mut **tx).await?;
        Ok(())
    }
}

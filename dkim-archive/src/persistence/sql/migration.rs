use async_trait::async_trait;
use sqlx::Transaction;

#[async_trait]
pub trait MigrationTrait: Send + Sync {
    /// Run the migration.
    /// Use the tx to perform all the necessary operations.
    /// In case of an error, the tx is rolled back.
    async fn up(&self, tx: &mut Transaction<'static, sqlx::Postgres>) -> anyhow::Result<()>;

    /// The name of the migration.
    /// This is used to identify the migration in the database.
    /// It must be unique and never change once released.
    fn name(&self) -> &str;
}

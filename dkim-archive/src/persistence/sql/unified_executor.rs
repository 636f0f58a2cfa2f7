use futures_util::future::BoxFuture;

/// Executor that runs queries either on a pool or inside a transaction.
/// A sqlx Executor is onetime use only. This wrapper can be reused for several queries.
///
/// Can easily be converted from a pool or a transaction:
/// - `db.pool().into()`
/// - `(&mut tx).into()`
pub enum UnifiedExecutor<'a> {
    Pool {
        future: BoxFuture<'a, Result<sqlx::pool::PoolConnection<sqlx::Postgres>, sqlx::Error>>,
        connection: Option<sqlx::pool::PoolConnection<sqlx::Postgres>>,
    },
    Transaction(&'a mut sqlx::Transaction<'static, sqlx::Postgres>),
}

impl<'a> UnifiedExecutor<'a> {
    /// Lazily acquires a connection from the pool on first use.
    pub fn from_pool(pool: &'a sqlx::PgPool) -> Self {
        let future: BoxFuture<'a, Result<sqlx::pool::PoolConnection<sqlx::Postgres>, sqlx::Error>> =
            Box::pin(async move { pool.acquire().await });
        UnifiedExecutor::Pool {
            future,
            connection: None,
        }
    }

    pub fn from_tx(tx: &'a mut sqlx::Transaction<'static, sqlx::Postgres>) -> Self {
        UnifiedExecutor::Transaction(tx)
    }

    /// Get the connection to run a query on.
    pub async fn get_con(&mut self) -> Result<&mut sqlx::PgConnection, sqlx::Error> {
        match self {
            UnifiedExecutor::Pool { future, connection } => {
                if connection.is_none() {
                    let con = future.await?;
                    *connection = Some(con);
                }

                Ok(connection.as_mut().expect("Connection was just set"))
            }
            UnifiedExecutor::Transaction(tx) => Ok(&mut **tx),
        }
    }
}

impl<'a> From<&'a sqlx::PgPool> for UnifiedExecutor<'a> {
    fn from(pool: &'a sqlx::PgPool) -> Self {
        UnifiedExecutor::from_pool(pool)
    }
}

impl<'a> From<&'a mut sqlx::Transaction<'static, sqlx::Postgres>> for UnifiedExecutor<'a> {
    fn from(tx: &'a mut sqlx::Transaction<'static, sqlx::Postgres>) -> Self {
        UnifiedExecutor::from_tx(tx)
    }
}

impl std::fmt::Debug for UnifiedExecutor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UnifiedExecutor")
    }
}

#[cfg(test)]
mod tests {
    use crate::persistence::sql::SqlDb;

    use super::*;

    #[tokio::test]
    #[ignore = "requires a running postgres, see TEST_DKIM_CONNECTION_STRING"]
    async fn test_executor_from_pool_and_tx() {
        let db = SqlDb::test().await;
        let mut executor = UnifiedExecutor::from_pool(db.pool());
        executor.get_con().await.expect("pool connection");
        // Second call reuses the acquired connection.
        executor.get_con().await.expect("pool connection");

        let mut tx = db.pool().begin().await.unwrap();
        {
            let mut executor: UnifiedExecutor<'_> = (&mut tx).into();
            executor.get_con().await.expect("tx connection");
        }
        tx.rollback().await.unwrap();
    }
}

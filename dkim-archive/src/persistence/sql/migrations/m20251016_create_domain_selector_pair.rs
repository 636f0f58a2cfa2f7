use async_trait::async_trait;
use sea_query::{ColumnDef, Expr, Iden, Index, PostgresQueryBuilder, Table};
use sqlx::Transaction;

use crate::persistence::sql::migration::MigrationTrait;

const TABLE: &str = "domain_selector_pairs";

pub struct M20251016CreateDomainSelectorPairMigration;

#[async_trait]
impl MigrationTrait for M20251016CreateDomainSelectorPairMigration {
    async fn up(&self, tx: &mut Transaction<'static, sqlx::Postgres>) -> anyhow::Result<()> {
        let statement = Table::create()
            .table(TABLE)
            .if_not_exists()
            .col(
                ColumnDef::new(DomainSelectorPairIden::Id)
                    .integer()
                    .not_null()
                    .auto_increment()
                    .primary_key(),
            )
            .col(ColumnDef::new(DomainSelectorPairIden::Domain).text().not_null())
            .col(ColumnDef::new(DomainSelectorPairIden::Selector).text().not_null())
            .col(
                ColumnDef::new(DomainSelectorPairIden::LastRecordUpdate)
                    .timestamp_with_time_zone()
                    .not_null()
                    .default(Expr::current_timestamp()),
            )
            .to_owned();
        let query = statement.build(PostgresQueryBuilder);
        sqlx::query(query.as_str()).execute(&mut **tx).await?;

        // A pair is tracked once.
        let index = Index::create()
            .name("idx_domain_selector_pairs_domain_selector")
            .table(TABLE)
            .col(DomainSelectorPairIden::Domain)
            .col(DomainSelectorPairIden::Selector)
            .unique()
            .to_owned();
        let query = index.build(PostgresQueryBuilder);
        sqlx::query(query.as_str()).execute(&mut **tx).await?;

        // The batch update scans by staleness.
        let index = Index::create()
            .name("idx_domain_selector_pairs_last_record_update")
            .table(TABLE)
            .col(DomainSelectorPairIden::LastRecordUpdate)
            .to_owned();
        let query = index.build(PostgresQueryBuilder);
        sqlx::query(query.as_str()).execute(&mut **tx).await?;

        Ok(())
    }

    fn name(&self) -> &str {
        "m20251016_create_domain_selector_pair"
    }
}

#[derive(Iden)]
enum DomainSelectorPairIden {
    Id,
    Domain,
    Selector,
    LastRecordUpdate,
}

#[cfg(test)]
mod tests {
    use sea_query::{Query, SimpleExpr};
    use sea_query_binder::SqlxBinder;
    use sqlx::Row;

    use crate::persistence::sql::{migrator::Migrator, SqlDb};

    use super::*;

    #[tokio::test]
    #[ignore = "requires a running postgres, see TEST_DKIM_CONNECTION_STRING"]
    async fn test_create_domain_selector_pair_migration() {
        let db = SqlDb::test_without_migrations().await;
        let migrator = Migrator::new(&db);
        migrator
            .run_migrations(vec![Box::new(M20251016CreateDomainSelectorPairMigration)])
            .await
            .expect("Should run successfully");

        let statement = Query::insert()
            .into_table(TABLE)
            .columns([DomainSelectorPairIden::Domain, DomainSelectorPairIden::Selector])
            .values(vec![
                SimpleExpr::Value("example.com".into()),
                SimpleExpr::Value("google".into()),
            ])
            .unwrap()
            .to_owned();
        let (query, values) = statement.build_sqlx(PostgresQueryBuilder);
        sqlx::query_with(query.as_str(), values)
            .execute(db.pool())
            .await
            .unwrap();

        // Same pair twice violates the unique index.
        let (query, values) = statement.build_sqlx(PostgresQueryBuilder);
        sqlx::query_with(query.as_str(), values)
            .execute(db.pool())
            .await
            .expect_err("Duplicate pair must be rejected");

        let statement = Query::select()
            .from(TABLE)
            .columns([
                DomainSelectorPairIden::Id,
                DomainSelectorPairIden::Domain,
                DomainSelectorPairIden::Selector,
            ])
            .to_owned();
        let (query, values) = statement.build_sqlx(PostgresQueryBuilder);
        let row = sqlx::query_with(query.as_str(), values)
            .fetch_one(db.pool())
            .await
            .unwrap();
        let domain: String = row.try_get("domain").unwrap();
        let selector: String = row.try_get("selector").unwrap();
        assert_eq!(domain, "example.com");
        assert_eq!(selector, "google");
    }
}

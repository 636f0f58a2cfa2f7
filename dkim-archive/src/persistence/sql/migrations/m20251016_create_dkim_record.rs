use async_trait::async_trait;
use sea_query::{ColumnDef, ForeignKey, ForeignKeyAction, Iden, Index, PostgresQueryBuilder, Table};
use sqlx::Transaction;

use crate::persistence::sql::migration::MigrationTrait;

const TABLE: &str = "dkim_records";
const PAIR_TABLE: &str = "domain_selector_pairs";

pub struct M20251016CreateDkimRecordMigration;

#[async_trait]
impl MigrationTrait for M20251016CreateDkimRecordMigration {
    async fn up(&self, tx: &mut Transaction<'static, sqlx::Postgres>) -> anyhow::Result<()> {
        let statement = Table::create()
            .table(TABLE)
            .if_not_exists()
            .col(
                ColumnDef::new(DkimRecordIden::Id)
                    .big_integer()
                    .not_null()
                    .auto_increment()
                    .primary_key(),
            )
            .col(
                ColumnDef::new(DkimRecordIden::DomainSelectorPairId)
                    .integer()
                    .not_null(),
            )
            .col(ColumnDef::new(DkimRecordIden::Value).text().not_null())
            .col(
                ColumnDef::new(DkimRecordIden::ValueHash)
                    .string_len(64)
                    .not_null(),
            )
            .col(
                ColumnDef::new(DkimRecordIden::FirstSeenAt)
                    .timestamp_with_time_zone()
                    .not_null(),
            )
            .col(
                ColumnDef::new(DkimRecordIden::LastSeenAt)
                    .timestamp_with_time_zone()
                    .not_null(),
            )
            .col(
                ColumnDef::new(DkimRecordIden::ProvenanceVerified)
                    .boolean()
                    .not_null()
                    .default(false),
            )
            .foreign_key(
                ForeignKey::create()
                    .name("fk_dkim_records_domain_selector_pair")
                    .from(TABLE, DkimRecordIden::DomainSelectorPairId)
                    .to(PAIR_TABLE, DkimRecordIden::Id)
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .to_owned();
        let query = statement.build(PostgresQueryBuilder);
        sqlx::query(query.as_str()).execute(&mut **tx).await?;

        // One row per distinct value of a pair, keyed by the value's blake3 digest.
        // The upsert conflicts on this index.
        let index = Index::create()
            .name("idx_dkim_records_pair_value_hash")
            .table(TABLE)
            .col(DkimRecordIden::DomainSelectorPairId)
            .col(DkimRecordIden::ValueHash)
            .unique()
            .to_owned();
        let query = index.build(PostgresQueryBuilder);
        sqlx::query(query.as_str()).execute(&mut **tx).await?;

        Ok(())
    }

    fn name(&self) -> &str {
        "m20251016_create_dkim_record"
    }
}

#[derive(Iden)]
enum DkimRecordIden {
    Id,
    DomainSelectorPairId,
    Value,
    ValueHash,
    FirstSeenAt,
    LastSeenAt,
    ProvenanceVerified,
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use sea_query::{Query, SimpleExpr};
    use sea_query_binder::SqlxBinder;
    use sqlx::Row;

    use crate::persistence::sql::{
        migrations::M20251016CreateDomainSelectorPairMigration, migrator::Migrator, SqlDb,
    };

    use super::*;

    #[tokio::test]
    #[ignore = "requires a running postgres, see TEST_DKIM_CONNECTION_STRING"]
    async fn test_create_dkim_record_migration() {
        let db = SqlDb::test_without_migrations().await;
        let migrator = Migrator::new(&db);
        migrator
            .run_migrations(vec![
                Box::new(M20251016CreateDomainSelectorPairMigration),
                Box::new(M20251016CreateDkimRecordMigration),
            ])
            .await
            .expect("Should run successfully");

        let row = sqlx::query(
            "INSERT INTO domain_selector_pairs (domain, selector) VALUES ('example.com', 's1') RETURNING id",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        let pair_id: i32 = row.try_get("id").unwrap();

        let now = Utc::now();
        let statement = Query::insert()
            .into_table(TABLE)
            .columns([
                DkimRecordIden::DomainSelectorPairId,
                DkimRecordIden::Value,
                DkimRecordIden::ValueHash,
                DkimRecordIden::FirstSeenAt,
                DkimRecordIden::LastSeenAt,
            ])
            .values(vec![
                SimpleExpr::Value(pair_id.into()),
                SimpleExpr::Value("v=DKIM1; p=abc".into()),
                SimpleExpr::Value(blake3::hash(b"v=DKIM1; p=abc").to_hex().to_string().into()),
                SimpleExpr::Value(now.into()),
                SimpleExpr::Value(now.into()),
            ])
            .unwrap()
            .returning_all()
            .to_owned();
        let (query, values) = statement.build_sqlx(PostgresQueryBuilder);
        let row = sqlx::query_with(query.as_str(), values)
            .fetch_one(db.pool())
            .await
            .unwrap();
        let verified: bool = row.try_get("provenance_verified").unwrap();
        assert!(!verified);

        let (query, values) = statement.build_sqlx(PostgresQueryBuilder);
        sqlx::query_with(query.as_str(), values)
            .fetch_one(db.pool())
            .await
            .expect_err("Duplicate value for the same pair must be rejected");
    }
}

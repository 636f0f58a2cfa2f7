use sea_query::{Expr, Iden, OnConflict, PostgresQueryBuilder, Query, SimpleExpr};
use sea_query_binder::SqlxBinder;
use serde::Serialize;
use sqlx::{
    postgres::PgRow,
    types::chrono::{DateTime, Utc},
    FromRow, Row,
};

use crate::persistence::sql::UnifiedExecutor;

pub const DKIM_RECORD_TABLE: &str = "dkim_records";

/// Hex blake3 digest of a record value.
///
/// Uniqueness per pair is enforced on this digest. Keys can be several KB long,
/// more than a btree index entry may hold.
pub fn value_hash(value: &str) -> String {
    blake3::hash(value.as_bytes()).to_hex().to_string()
}

/// Repository that handles all the queries regarding the DkimRecordEntity.
pub struct DkimRecordRepository;

impl DkimRecordRepository {
    /// Create a new, unverified record first and last seen at `seen_at`.
    /// The executor can either be db.pool() or a transaction.
    pub async fn create<'a>(
        pair_id: i32,
        value: &str,
        seen_at: &DateTime<Utc>,
        executor: &mut UnifiedExecutor<'a>,
    ) -> Result<DkimRecordEntity, sqlx::Error> {
        let statement = Query::insert()
            .into_table(DKIM_RECORD_TABLE)
            .columns([
                DkimRecordIden::DomainSelectorPairId,
                DkimRecordIden::Value,
                DkimRecordIden::ValueHash,
                DkimRecordIden::FirstSeenAt,
                DkimRecordIden::LastSeenAt,
            ])
            .values(vec![
                SimpleExpr::Value(pair_id.into()),
                SimpleExpr::Value(value.into()),
                SimpleExpr::Value(value_hash(value).into()),
                SimpleExpr::Value((*seen_at).into()),
                SimpleExpr::Value((*seen_at).into()),
            ])
            .expect("Failed to build insert statement")
            .returning_all()
            .to_owned();

        let (query, values) = statement.build_sqlx(PostgresQueryBuilder);
        let con = executor.get_con().await?;
        let record: DkimRecordEntity = sqlx::query_as_with(&query, values).fetch_one(con).await?;
        Ok(record)
    }

    /// Insert the record or, if the pair already has a record with this value,
    /// move its `last_seen_at` to `seen_at`. Runs as a single statement.
    pub async fn upsert<'a>(
        pair_id: i32,
        value: &str,
        seen_at: &DateTime<Utc>,
        executor: &mut UnifiedExecutor<'a>,
    ) -> Result<DkimRecordEntity, sqlx::Error> {
        let statement = Query::insert()
            .into_table(DKIM_RECORD_TABLE)
            .columns([
                DkimRecordIden::DomainSelectorPairId,
                DkimRecordIden::Value,
                DkimRecordIden::ValueHash,
                DkimRecordIden::FirstSeenAt,
                DkimRecordIden::LastSeenAt,
            ])
            .values(vec![
                SimpleExpr::Value(pair_id.into()),
                SimpleExpr::Value(value.into()),
                SimpleExpr::Value(value_hash(value).into()),
                SimpleExpr::Value((*seen_at).into()),
                SimpleExpr::Value((*seen_at).into()),
            ])
            .expect("Failed to build insert statement")
            .on_conflict(
                OnConflict::columns([
                    DkimRecordIden::DomainSelectorPairId,
                    DkimRecordIden::ValueHash,
                ])
                    .update_column(DkimRecordIden::LastSeenAt)
                    .to_owned(),
            )
            .returning_all()
            .to_owned();

        let (query, values) = statement.build_sqlx(PostgresQueryBuilder);
        let con = executor.get_con().await?;
        let record: DkimRecordEntity = sqlx::query_as_with(&query, values).fetch_one(con).await?;
        Ok(record)
    }

    /// Get the record of a pair with exactly this value, if any.
    pub async fn get_by_value<'a>(
        pair_id: i32,
        value: &str,
        executor: &mut UnifiedExecutor<'a>,
    ) -> Result<Option<DkimRecordEntity>, sqlx::Error> {
        let statement = Query::select()
            .from(DKIM_RECORD_TABLE)
            .columns(DkimRecordIden::all())
            .and_where(Expr::col(DkimRecordIden::DomainSelectorPairId).eq(pair_id))
            .and_where(Expr::col(DkimRecordIden::ValueHash).eq(value_hash(value)))
            .to_owned();
        let (query, values) = statement.build_sqlx(PostgresQueryBuilder);
        let con = executor.get_con().await?;
        let record: Option<DkimRecordEntity> =
            sqlx::query_as_with(&query, values).fetch_optional(con).await?;
        Ok(record)
    }

    /// All records of a pair, oldest first.
    #[cfg(any(test, feature = "testing"))]
    pub async fn list_by_pair<'a>(
        pair_id: i32,
        executor: &mut UnifiedExecutor<'a>,
    ) -> Result<Vec<DkimRecordEntity>, sqlx::Error> {
        let statement = Query::select()
            .from(DKIM_RECORD_TABLE)
            .columns(DkimRecordIden::all())
            .and_where(Expr::col(DkimRecordIden::DomainSelectorPairId).eq(pair_id))
            .order_by(DkimRecordIden::Id, sea_query::Order::Asc)
            .to_owned();
        let (query, values) = statement.build_sqlx(PostgresQueryBuilder);
        let con = executor.get_con().await?;
        let records: Vec<DkimRecordEntity> =
            sqlx::query_as_with(&query, values).fetch_all(con).await?;
        Ok(records)
    }

    pub async fn update_last_seen_at<'a>(
        id: i64,
        last_seen_at: &DateTime<Utc>,
        executor: &mut UnifiedExecutor<'a>,
    ) -> Result<(), sqlx::Error> {
        Self::update_column(
            id,
            DkimRecordIden::LastSeenAt,
            SimpleExpr::Value((*last_seen_at).into()),
            executor,
        )
        .await
    }

    pub async fn mark_provenance_verified<'a>(
        id: i64,
        executor: &mut UnifiedExecutor<'a>,
    ) -> Result<(), sqlx::Error> {
        Self::update_column(
            id,
            DkimRecordIden::ProvenanceVerified,
            SimpleExpr::Value(true.into()),
            executor,
        )
        .await
    }

    async fn update_column<'a>(
        id: i64,
        column: DkimRecordIden,
        value: SimpleExpr,
        executor: &mut UnifiedExecutor<'a>,
    ) -> Result<(), sqlx::Error> {
        let statement = Query::update()
            .table(DKIM_RECORD_TABLE)
            .values(vec![(column, value)])
            .and_where(Expr::col(DkimRecordIden::Id).eq(id))
            .to_owned();
        let (query, values) = statement.build_sqlx(PostgresQueryBuilder);
        let con = executor.get_con().await?;
        let result = sqlx::query_with(&query, values).execute(con).await?;
        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }
        Ok(())
    }
}

/// Iden for the dkim record table.
#[derive(Iden, Clone, Copy)]
pub enum DkimRecordIden {
    Id,
    DomainSelectorPairId,
    Value,
    ValueHash,
    FirstSeenAt,
    LastSeenAt,
    ProvenanceVerified,
}

impl DkimRecordIden {
    fn all() -> [Self; 6] {
        [
            Self::Id,
            Self::DomainSelectorPairId,
            Self::Value,
            Self::FirstSeenAt,
            Self::LastSeenAt,
            Self::ProvenanceVerified,
        ]
    }
}

/// One observed value of a pair's published DKIM key.
#[derive(Debug, PartialEq, Eq, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DkimRecordEntity {
    pub id: i64,
    pub domain_selector_pair_id: i32,
    /// Raw TXT content, e.g. `v=DKIM1; k=rsa; p=MIIB...`.
    pub value: String,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    /// Set once a witness proof for this record exists.
    pub provenance_verified: bool,
}

impl std::fmt::Display for DkimRecordEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let preview: String = self.value.chars().take(32).collect();
        write!(
            f,
            "#{} \"{}{}\"",
            self.id,
            preview,
            if self.value.chars().count() > 32 { "..." } else { "" }
        )
    }
}

impl FromRow<'_, PgRow> for DkimRecordEntity {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let id: i64 = row.try_get(DkimRecordIden::Id.to_string().as_str())?;
        let domain_selector_pair_id: i32 =
            row.try_get(DkimRecordIden::DomainSelectorPairId.to_string().as_str())?;
        let value: String = row.try_get(DkimRecordIden::Value.to_string().as_str())?;
        let first_seen_at: DateTime<Utc> =
            row.try_get(DkimRecordIden::FirstSeenAt.to_string().as_str())?;
        let last_seen_at: DateTime<Utc> =
            row.try_get(DkimRecordIden::LastSeenAt.to_string().as_str())?;
        let provenance_verified: bool =
            row.try_get(DkimRecordIden::ProvenanceVerified.to_string().as_str())?;
        Ok(DkimRecordEntity {
            id,
            domain_selector_pair_id,
            value,
            first_seen_at,
            last_seen_at,
            provenance_verified,
        })
    }
}

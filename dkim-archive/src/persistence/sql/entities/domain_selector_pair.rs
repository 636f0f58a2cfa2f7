use sea_query::{Expr, Iden, Order, PostgresQueryBuilder, Query, SimpleExpr};
use sea_query_binder::SqlxBinder;
use serde::Serialize;
use sqlx::{
    postgres::PgRow,
    types::chrono::{DateTime, Utc},
    FromRow, Row,
};

use crate::constants::MAX_BATCH_LIMIT;
use crate::persistence::sql::UnifiedExecutor;

pub const DOMAIN_SELECTOR_PAIR_TABLE: &str = "domain_selector_pairs";

/// Repository that handles all the queries regarding the DomainSelectorPairEntity.
pub struct DomainSelectorPairRepository;

impl DomainSelectorPairRepository {
    /// Start tracking a new pair.
    /// The executor can either be db.pool() or a transaction.
    pub async fn create<'a>(
        domain: &str,
        selector: &str,
        last_record_update: &DateTime<Utc>,
        executor: &mut UnifiedExecutor<'a>,
    ) -> Result<DomainSelectorPairEntity, sqlx::Error> {
        let statement = Query::insert()
            .into_table(DOMAIN_SELECTOR_PAIR_TABLE)
            .columns([
                DomainSelectorPairIden::Domain,
                DomainSelectorPairIden::Selector,
                DomainSelectorPairIden::LastRecordUpdate,
            ])
            .values(vec![
                SimpleExpr::Value(domain.into()),
                SimpleExpr::Value(selector.into()),
                SimpleExpr::Value((*last_record_update).into()),
            ])
            .expect("Failed to build insert statement")
            .returning_all()
            .to_owned();

        let (query, values) = statement.build_sqlx(PostgresQueryBuilder);
        let con = executor.get_con().await?;
        let pair: DomainSelectorPairEntity =
            sqlx::query_as_with(&query, values).fetch_one(con).await?;
        Ok(pair)
    }

    /// Get a pair by its id.
    /// The executor can either be db.pool() or a transaction.
    #[cfg(any(test, feature = "testing"))]
    pub async fn get<'a>(
        id: i32,
        executor: &mut UnifiedExecutor<'a>,
    ) -> Result<DomainSelectorPairEntity, sqlx::Error> {
        let statement = Query::select()
            .from(DOMAIN_SELECTOR_PAIR_TABLE)
            .columns(DomainSelectorPairIden::all())
            .and_where(Expr::col(DomainSelectorPairIden::Id).eq(id))
            .to_owned();
        let (query, values) = statement.build_sqlx(PostgresQueryBuilder);
        let con = executor.get_con().await?;
        let pair: DomainSelectorPairEntity =
            sqlx::query_as_with(&query, values).fetch_one(con).await?;
        Ok(pair)
    }

    /// List the pairs last refreshed at or before `updated_before`, oldest first.
    /// `limit` is capped at `i64::MAX`.
    pub async fn list_stale<'a>(
        updated_before: &DateTime<Utc>,
        limit: u64,
        executor: &mut UnifiedExecutor<'a>,
    ) -> Result<Vec<DomainSelectorPairEntity>, sqlx::Error> {
        let statement = Query::select()
            .from(DOMAIN_SELECTOR_PAIR_TABLE)
            .columns(DomainSelectorPairIden::all())
            .and_where(Expr::col(DomainSelectorPairIden::LastRecordUpdate).lte(*updated_before))
            .order_by(DomainSelectorPairIden::LastRecordUpdate, Order::Asc)
            // Equal timestamps still come back in a stable order.
            .order_by(DomainSelectorPairIden::Id, Order::Asc)
            .limit(limit.min(MAX_BATCH_LIMIT))
            .to_owned();
        let (query, values) = statement.build_sqlx(PostgresQueryBuilder);
        let con = executor.get_con().await?;
        let pairs: Vec<DomainSelectorPairEntity> =
            sqlx::query_as_with(&query, values).fetch_all(con).await?;
        Ok(pairs)
    }

    pub async fn update_last_record_update<'a>(
        id: i32,
        last_record_update: &DateTime<Utc>,
        executor: &mut UnifiedExecutor<'a>,
    ) -> Result<(), sqlx::Error> {
        let statement = Query::update()
            .table(DOMAIN_SELECTOR_PAIR_TABLE)
            .values(vec![(
                DomainSelectorPairIden::LastRecordUpdate,
                SimpleExpr::Value((*last_record_update).into()),
            )])
            .and_where(Expr::col(DomainSelectorPairIden::Id).eq(id))
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

/// Iden for the domain selector pair table.
/// Basically a list of columns in the table.
#[derive(Iden, Clone, Copy)]
pub enum DomainSelectorPairIden {
    Id,
    Domain,
    Selector,
    LastRecordUpdate,
}

impl DomainSelectorPairIden {
    fn all() -> [Self; 4] {
        [
            Self::Id,
            Self::Domain,
            Self::Selector,
            Self::LastRecordUpdate,
        ]
    }
}

/// A tracked (domain, selector) combination.
#[derive(Debug, PartialEq, Eq, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainSelectorPairEntity {
    pub id: i32,
    pub domain: String,
    pub selector: String,
    /// Last time a refresh of this pair was attempted.
    pub last_record_update: DateTime<Utc>,
}

impl DomainSelectorPairEntity {
    /// DNS name the DKIM key of this pair is published at.
    pub fn dns_name(&self) -> String {
        format!("{}._domainkey.{}", self.selector, self.domain)
    }
}

impl std::fmt::Display for DomainSelectorPairEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} {}, {}", self.id, self.domain, self.selector)
    }
}

impl FromRow<'_, PgRow> for DomainSelectorPairEntity {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let id: i32 = row.try_get(DomainSelectorPairIden::Id.to_string().as_str())?;
        let domain: String = row.try_get(DomainSelectorPairIden::Domain.to_string().as_str())?;
        let selector: String =
            row.try_get(DomainSelectorPairIden::Selector.to_string().as_str())?;
        let last_record_update: DateTime<Utc> =
            row.try_get(DomainSelectorPairIden::LastRecordUpdate.to_string().as_str())?;
        Ok(DomainSelectorPairEntity {
            id,
            domain,
            selector,
            last_record_update,
        })
    }
}

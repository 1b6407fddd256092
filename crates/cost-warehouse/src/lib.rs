//! cost-warehouse
//!
//! Warehouse collaborator: the [`Warehouse`] trait the jobs write through and
//! its Postgres implementation.
//!
//! Design notes:
//! - Table names come from config and are interpolated into SQL, so every
//!   entry point re-checks them with [`cost_config::is_valid_table_name`].
//! - Values are always bound, never interpolated.
//! - One `bulk_insert_*` call is one transaction: either every row of the
//!   batch is committed or none is.

mod schema;

pub use schema::{CostRecord, CurrencyRate, DeletePredicate, TableSchema};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use schema::{COST_COLUMNS, CURRENCY_COLUMNS};

/// Env var the tests read the warehouse URL from. The binary resolves the
/// URL through `warehouse.url_env` instead.
pub const ENV_DB_URL: &str = "COST_DATABASE_URL";

/// Rows per INSERT statement. 13 binds per cost row keeps this well under
/// the Postgres limit of 65535 parameters.
const INSERT_CHUNK: usize = 1000;

/// Storage contract used by the invoice and currency jobs.
#[async_trait::async_trait]
pub trait Warehouse: Send + Sync {
    async fn create_table_if_not_exists(&self, schema: TableSchema, table: &str) -> Result<()>;

    /// Settlement ledger: invoice id -> last-known status.
    ///
    /// When an invoice was recorded under several statuses, `paid` dominates.
    async fn query_distinct_invoice_statuses(&self, table: &str) -> Result<HashMap<String, String>>;

    async fn bulk_insert_cost_records(&self, table: &str, records: &[CostRecord]) -> Result<()>;

    /// Returns the number of deleted rows.
    async fn delete_where(&self, table: &str, predicate: &DeletePredicate) -> Result<u64>;

    /// Latest stored rate date, `None` for an empty table.
    async fn newest_currency_date(&self, table: &str) -> Result<Option<NaiveDate>>;

    async fn insert_currency_rates(&self, table: &str, rates: &[CurrencyRate]) -> Result<()>;
}

/// Collapse `(invoice_id, status)` pairs into the ledger map.
///
/// Ranking: `paid` > `mailed` > `estimate` > anything else; ties between
/// unknown statuses resolve to the lexicographically greatest so the result
/// does not depend on row order.
pub fn fold_invoice_statuses<I>(rows: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut out: HashMap<String, String> = HashMap::new();
    for (invoice_id, status) in rows {
        match out.get(&invoice_id) {
            Some(existing) if !outranks(&status, existing) => {}
            _ => {
                out.insert(invoice_id, status);
            }
        }
    }
    out
}

fn status_rank(s: &str) -> u8 {
    match s {
        "paid" => 3,
        "mailed" => 2,
        "estimate" => 1,
        _ => 0,
    }
}

fn outranks(candidate: &str, existing: &str) -> bool {
    (status_rank(candidate), candidate) > (status_rank(existing), existing)
}

fn checked_table(table: &str) -> Result<&str> {
    if !cost_config::is_valid_table_name(table) {
        bail!("invalid table name '{table}'");
    }
    Ok(table)
}

/// Connect to the warehouse. The jobs are sequential, so a tiny pool suffices.
pub async fn connect(url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(url)
        .await
        .context("failed to connect to warehouse")
}

/// Postgres-backed [`Warehouse`].
#[derive(Debug, Clone)]
pub struct PgWarehouse {
    pool: PgPool,
}

impl PgWarehouse {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self> {
        Ok(Self::new(connect(url).await?))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl Warehouse for PgWarehouse {
    async fn create_table_if_not_exists(&self, schema: TableSchema, table: &str) -> Result<()> {
        let table = checked_table(table)?;
        for stmt in schema.create_statements(table) {
            sqlx::query(&stmt)
                .execute(&self.pool)
                .await
                .with_context(|| format!("create table {table} failed"))?;
        }
        debug!(table, ?schema, "table ensured");
        Ok(())
    }

    async fn query_distinct_invoice_statuses(&self, table: &str) -> Result<HashMap<String, String>> {
        let table = checked_table(table)?;
        let rows: Vec<(String, String)> =
            sqlx::query_as(&format!("select distinct invoice_id, status from {table}"))
                .fetch_all(&self.pool)
                .await
                .with_context(|| format!("failed to fetch invoice statuses from {table}"))?;
        Ok(fold_invoice_statuses(rows))
    }

    async fn bulk_insert_cost_records(&self, table: &str, records: &[CostRecord]) -> Result<()> {
        let table = checked_table(table)?;
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.context("begin transaction failed")?;
        for chunk in records.chunks(INSERT_CHUNK) {
            let mut qb: QueryBuilder<Postgres> =
                QueryBuilder::new(format!("insert into {table} ({COST_COLUMNS}) "));
            qb.push_values(chunk, |mut b, r| {
                b.push_bind(r.billing_group_id.clone())
                    .push_bind(r.invoice_id.clone())
                    .push_bind(r.project_name.clone())
                    .push_bind(r.environment.clone())
                    .push_bind(r.team.clone())
                    .push_bind(r.service.clone())
                    .push_bind(r.service_name.clone())
                    .push_bind(r.tenant.clone())
                    .push_bind(r.status.clone())
                    .push_bind(r.cost.clone())
                    .push_bind(r.currency.clone())
                    .push_bind(r.billing_month.clone())
                    .push_bind(r.day_count);
            });
            qb.build()
                .execute(&mut *tx)
                .await
                .with_context(|| format!("failed to insert cost items into {table}"))?;
        }
        tx.commit()
            .await
            .with_context(|| format!("commit of cost items into {table} failed"))?;
        Ok(())
    }

    async fn delete_where(&self, table: &str, predicate: &DeletePredicate) -> Result<u64> {
        let table = checked_table(table)?;
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("delete from {table} where "));
        match predicate {
            DeletePredicate::StatusIn(statuses) => {
                if statuses.is_empty() {
                    return Ok(0);
                }
                qb.push("status = any(").push_bind(statuses.clone()).push(")");
            }
            DeletePredicate::DateOnOrAfter(d) => {
                qb.push("date >= ").push_bind(*d);
            }
        }
        let res = qb
            .build()
            .execute(&self.pool)
            .await
            .with_context(|| format!("delete from {table} failed"))?;
        Ok(res.rows_affected())
    }

    async fn newest_currency_date(&self, table: &str) -> Result<Option<NaiveDate>> {
        let table = checked_table(table)?;
        let newest: Option<NaiveDate> =
            sqlx::query_scalar(&format!("select max(date) from {table}"))
                .fetch_one(&self.pool)
                .await
                .with_context(|| format!("failed to read newest date from {table}"))?;
        Ok(newest)
    }

    async fn insert_currency_rates(&self, table: &str, rates: &[CurrencyRate]) -> Result<()> {
        let table = checked_table(table)?;
        if rates.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.context("begin transaction failed")?;
        for chunk in rates.chunks(INSERT_CHUNK) {
            let mut qb: QueryBuilder<Postgres> =
                QueryBuilder::new(format!("insert into {table} ({CURRENCY_COLUMNS}) "));
            qb.push_values(chunk, |mut b, r| {
                b.push_bind(r.date)
                    .push_bind(r.usdeur.clone())
                    .push_bind(r.usdnok.clone());
            });
            qb.build()
                .execute(&mut *tx)
                .await
                .with_context(|| format!("failed to insert currency rates into {table}"))?;
        }
        tx.commit()
            .await
            .with_context(|| format!("commit of currency rates into {table} failed"))?;
        Ok(())
    }
}

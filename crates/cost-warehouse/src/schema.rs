//! Row types and table DDL.
//!
//! Column names match the historical warehouse layout (`date`,
//! `number_of_days`) so existing dashboards keep working.

use chrono::NaiveDate;

/// One normalized invoice line, ready for the cost table.
///
/// `status` is a snapshot of the invoice status at write time.
/// `day_count` is the calendar length of `billing_month`, not the elapsed
/// time between the line's begin/end timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostRecord {
    pub invoice_id: String,
    pub billing_group_id: String,
    pub project_name: String,
    pub environment: String,
    pub team: String,
    /// Normalized service category (`pg`, `kafka`, `support`, `credit`, ...).
    pub service: String,
    pub service_name: String,
    pub tenant: String,
    pub status: String,
    /// Monthly total, decimal string.
    pub cost: String,
    /// ISO code, uppercase.
    pub currency: String,
    /// `YYYY-MM`
    pub billing_month: String,
    pub day_count: i32,
}

/// One day of USD-based exchange rates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyRate {
    pub date: NaiveDate,
    /// USD -> EUR, 6 decimals.
    pub usdeur: String,
    /// USD -> NOK, 6 decimals.
    pub usdnok: String,
}

pub(crate) const COST_COLUMNS: &str = "billing_group_id, invoice_id, project_name, environment, \
     team, service, service_name, tenant, status, cost, currency, date, number_of_days";

pub(crate) const CURRENCY_COLUMNS: &str = "date, usdeur, usdnok";

/// Known table layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableSchema {
    CostItems,
    CurrencyRates,
}

impl TableSchema {
    /// Idempotent DDL statements for `table`. The caller validates the name.
    pub fn create_statements(&self, table: &str) -> Vec<String> {
        match self {
            TableSchema::CostItems => vec![
                format!(
                    "create table if not exists {table} (
                       billing_group_id text not null,
                       invoice_id       text not null,
                       project_name     text not null,
                       environment      text not null,
                       team             text not null,
                       service          text not null,
                       service_name     text not null,
                       tenant           text not null,
                       status           text not null,
                       cost             text not null,
                       currency         text not null,
                       date             text not null,
                       number_of_days   integer not null
                     )"
                ),
                format!("create index if not exists {table}_invoice_id_idx on {table} (invoice_id)"),
            ],
            TableSchema::CurrencyRates => vec![format!(
                "create table if not exists {table} (
                   date   date primary key,
                   usdeur text not null,
                   usdnok text not null
                 )"
            )],
        }
    }
}

/// Row filter for [`crate::Warehouse::delete_where`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletePredicate {
    /// `status` is one of the given values (cost table).
    StatusIn(Vec<String>),
    /// `date >= d` (currency table).
    DateOnOrAfter(NaiveDate),
}

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};
use chrono::NaiveDate;
use cost_warehouse::{
    fold_invoice_statuses, CostRecord, CurrencyRate, DeletePredicate, TableSchema, Warehouse,
};

#[derive(Default)]
struct State {
    tables: BTreeMap<String, TableSchema>,
    cost_rows: HashMap<String, Vec<CostRecord>>,
    currency_rows: HashMap<String, BTreeMap<NaiveDate, CurrencyRate>>,
    /// invoice id -> remaining failing inserts (`u32::MAX` = always)
    insert_failures: HashMap<String, u32>,
    fail_ledger_read: bool,
    insert_attempts: Vec<String>,
}

/// [`Warehouse`] kept in memory, with the same batch atomicity as the
/// Postgres implementation: a failing batch leaves nothing behind.
#[derive(Default)]
pub struct InMemoryWarehouse {
    state: Mutex<State>,
}

impl InMemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("in-memory warehouse lock poisoned"))
    }

    /// Pre-populate the cost table as a previous run would have.
    pub fn seed_cost_records(&self, table: &str, records: Vec<CostRecord>) {
        if let Ok(mut s) = self.state() {
            s.tables.insert(table.to_string(), TableSchema::CostItems);
            s.cost_rows.entry(table.to_string()).or_default().extend(records);
        }
    }

    pub fn seed_currency_rates(&self, table: &str, rates: Vec<CurrencyRate>) {
        if let Ok(mut s) = self.state() {
            s.tables.insert(table.to_string(), TableSchema::CurrencyRates);
            let rows = s.currency_rows.entry(table.to_string()).or_default();
            for r in rates {
                rows.insert(r.date, r);
            }
        }
    }

    /// The next `times` inserts of a batch for `invoice_id` fail.
    pub fn fail_inserts_for(&self, invoice_id: &str, times: u32) {
        if let Ok(mut s) = self.state() {
            s.insert_failures.insert(invoice_id.to_string(), times);
        }
    }

    pub fn fail_ledger_read(&self) {
        if let Ok(mut s) = self.state() {
            s.fail_ledger_read = true;
        }
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.state().map(|s| s.tables.contains_key(table)).unwrap_or(false)
    }

    pub fn cost_records(&self, table: &str) -> Vec<CostRecord> {
        self.state()
            .map(|s| s.cost_rows.get(table).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    pub fn currency_rates(&self, table: &str) -> Vec<CurrencyRate> {
        self.state()
            .map(|s| {
                s.currency_rows
                    .get(table)
                    .map(|m| m.values().cloned().collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    /// Invoice id of every bulk insert attempt, successful or not.
    pub fn insert_attempts(&self) -> Vec<String> {
        self.state().map(|s| s.insert_attempts.clone()).unwrap_or_default()
    }
}

fn require_table(s: &State, table: &str) -> Result<()> {
    if !cost_config::is_valid_table_name(table) {
        bail!("invalid table name '{table}'");
    }
    if !s.tables.contains_key(table) {
        bail!("relation \"{table}\" does not exist");
    }
    Ok(())
}

#[async_trait::async_trait]
impl Warehouse for InMemoryWarehouse {
    async fn create_table_if_not_exists(&self, schema: TableSchema, table: &str) -> Result<()> {
        if !cost_config::is_valid_table_name(table) {
            bail!("invalid table name '{table}'");
        }
        self.state()?.tables.entry(table.to_string()).or_insert(schema);
        Ok(())
    }

    async fn query_distinct_invoice_statuses(&self, table: &str) -> Result<HashMap<String, String>> {
        let s = self.state()?;
        if s.fail_ledger_read {
            bail!("failed to fetch invoice statuses from {table}: connection reset");
        }
        require_table(&s, table)?;
        let rows = s
            .cost_rows
            .get(table)
            .map(|rows| {
                rows.iter()
                    .map(|r| (r.invoice_id.clone(), r.status.clone()))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        Ok(fold_invoice_statuses(rows))
    }

    async fn bulk_insert_cost_records(&self, table: &str, records: &[CostRecord]) -> Result<()> {
        let mut s = self.state()?;
        require_table(&s, table)?;
        let Some(first) = records.first() else {
            return Ok(());
        };
        let invoice_id = first.invoice_id.clone();
        s.insert_attempts.push(invoice_id.clone());

        if let Some(remaining) = s.insert_failures.get_mut(&invoice_id) {
            if *remaining > 0 {
                if *remaining != u32::MAX {
                    *remaining -= 1;
                }
                bail!("failed to insert cost items into {table}: injected failure for {invoice_id}");
            }
        }
        s.cost_rows
            .entry(table.to_string())
            .or_default()
            .extend_from_slice(records);
        Ok(())
    }

    async fn delete_where(&self, table: &str, predicate: &DeletePredicate) -> Result<u64> {
        let mut s = self.state()?;
        require_table(&s, table)?;
        let deleted = match predicate {
            DeletePredicate::StatusIn(statuses) => {
                let rows = s.cost_rows.entry(table.to_string()).or_default();
                let before = rows.len();
                rows.retain(|r| !statuses.contains(&r.status));
                before - rows.len()
            }
            DeletePredicate::DateOnOrAfter(d) => {
                let rows = s.currency_rows.entry(table.to_string()).or_default();
                let removed = rows.split_off(d);
                removed.len()
            }
        };
        Ok(deleted as u64)
    }

    async fn newest_currency_date(&self, table: &str) -> Result<Option<NaiveDate>> {
        let s = self.state()?;
        require_table(&s, table)?;
        Ok(s
            .currency_rows
            .get(table)
            .and_then(|m| m.keys().next_back().copied()))
    }

    async fn insert_currency_rates(&self, table: &str, rates: &[CurrencyRate]) -> Result<()> {
        let mut s = self.state()?;
        require_table(&s, table)?;
        let rows = s.currency_rows.entry(table.to_string()).or_default();
        if let Some(dup) = rates.iter().find(|r| rows.contains_key(&r.date)) {
            bail!("duplicate key value violates unique constraint: date={}", dup.date);
        }
        for r in rates {
            rows.insert(r.date, r.clone());
        }
        Ok(())
    }
}

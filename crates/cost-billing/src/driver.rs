//! Reconciliation driver.
//!
//! Steps, strictly in order and one call at a time:
//! 1. ensure the cost table exists
//! 2. read the settlement ledger
//! 3. list the provider's invoices
//! 4. keep the invoices the ledger does not mark `paid`
//! 5. per pending invoice: fetch lines, resolve tags, classify, normalize,
//!    then store the whole batch in one bulk write
//!
//! The first fatal error stops the run. Invoices written before it stay
//! committed; the failing one is retried in full on the next run.

use std::collections::HashMap;

use anyhow::Result;
use cost_aiven::{BillingApi, Invoice, InvoiceStatus};
use cost_config::CostConfig;
use cost_warehouse::{CostRecord, TableSchema, Warehouse};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ReconcileError;
use crate::record::build_cost_record;
use crate::retry::RetryPolicy;
use crate::tags::resolve_tags;

/// Invoices that still need (re)processing, in provider order.
///
/// Absent from the ledger, or recorded with any status other than `paid`.
pub fn pending_invoices<'a>(
    ledger: &HashMap<String, String>,
    invoices: &'a [Invoice],
) -> Vec<&'a Invoice> {
    invoices
        .iter()
        .filter(|inv| {
            !ledger
                .get(&inv.id)
                .map(|s| InvoiceStatus::parse(s).is_final())
                .unwrap_or(false)
        })
        .collect()
}

/// Immutable inputs of one reconciliation run.
#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    pub billing_group_id: String,
    pub cost_items_table: String,
    pub retry: RetryPolicy,
}

impl ReconcilerSettings {
    pub fn from_config(cfg: &CostConfig) -> Result<Self> {
        Ok(Self {
            billing_group_id: cfg.billing_group_id()?.to_string(),
            cost_items_table: cfg.warehouse.cost_items_table.clone(),
            retry: RetryPolicy::from_config(&cfg.retry),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub invoices_seen: usize,
    pub invoices_pending: usize,
    /// Pending invoices whose batch was stored (empty batches included).
    pub invoices_written: usize,
    pub records_written: usize,
    pub tag_lookup_failures: usize,
}

impl RunSummary {
    fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            invoices_seen: 0,
            invoices_pending: 0,
            invoices_written: 0,
            records_written: 0,
            tag_lookup_failures: 0,
        }
    }
}

pub struct InvoiceReconciler<'a> {
    api: &'a dyn BillingApi,
    warehouse: &'a dyn Warehouse,
    settings: ReconcilerSettings,
}

impl<'a> InvoiceReconciler<'a> {
    pub fn new(
        api: &'a dyn BillingApi,
        warehouse: &'a dyn Warehouse,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            api,
            warehouse,
            settings,
        }
    }

    pub async fn run(&self) -> Result<RunSummary, ReconcileError> {
        let mut summary = RunSummary::new();
        let table = self.settings.cost_items_table.as_str();
        let bg = self.settings.billing_group_id.as_str();
        info!(run_id = %summary.run_id, billing_group_id = bg, table, "invoice reconciliation starting");

        self.warehouse
            .create_table_if_not_exists(TableSchema::CostItems, table)
            .await
            .map_err(|e| ReconcileError::Setup {
                table: table.to_string(),
                message: format!("{e:#}"),
            })?;

        let ledger = self
            .warehouse
            .query_distinct_invoice_statuses(table)
            .await
            .map_err(|e| ReconcileError::Fetch {
                step: "ledger",
                message: format!("{e:#}"),
            })?;

        let invoices = self
            .api
            .list_invoices(bg)
            .await
            .map_err(|e| ReconcileError::Fetch {
                step: "list_invoices",
                message: e.to_string(),
            })?;

        let pending = pending_invoices(&ledger, &invoices);
        summary.invoices_seen = invoices.len();
        summary.invoices_pending = pending.len();
        info!(
            run_id = %summary.run_id,
            ledger_invoices = ledger.len(),
            invoices_seen = summary.invoices_seen,
            invoices_pending = summary.invoices_pending,
            "pending invoices computed"
        );

        for invoice in pending {
            self.reconcile_invoice(invoice, &mut summary).await?;
        }

        info!(
            run_id = %summary.run_id,
            invoices_written = summary.invoices_written,
            records_written = summary.records_written,
            tag_lookup_failures = summary.tag_lookup_failures,
            "invoice reconciliation finished"
        );
        Ok(summary)
    }

    async fn reconcile_invoice(
        &self,
        invoice: &Invoice,
        summary: &mut RunSummary,
    ) -> Result<(), ReconcileError> {
        let bg = self.settings.billing_group_id.as_str();
        let lines = self
            .api
            .invoice_lines(bg, &invoice.id)
            .await
            .map_err(|e| ReconcileError::Fetch {
                step: "invoice_lines",
                message: format!("invoice_id={}: {e}", invoice.id),
            })?;

        let mut records: Vec<CostRecord> = Vec::with_capacity(lines.len());
        for line in &lines {
            let tags = resolve_tags(self.api, line).await;
            if tags.is_failed() {
                summary.tag_lookup_failures += 1;
            }
            records.push(build_cost_record(bg, invoice, line, &tags));
        }

        if records.is_empty() {
            debug!(invoice_id = %invoice.id, "invoice has no lines");
        } else {
            let table = self.settings.cost_items_table.as_str();
            let warehouse = self.warehouse;
            let batch = records.as_slice();
            self.settings
                .retry
                .run("bulk_insert_cost_records", || {
                    warehouse.bulk_insert_cost_records(table, batch)
                })
                .await
                .map_err(|ex| ReconcileError::Write {
                    invoice_id: invoice.id.clone(),
                    attempts: ex.attempts,
                    message: format!("{:#}", ex.last_error),
                })?;
        }

        summary.invoices_written += 1;
        summary.records_written += records.len();
        info!(
            invoice_id = %invoice.id,
            status = %invoice.status,
            records = records.len(),
            "invoice stored"
        );
        Ok(())
    }
}

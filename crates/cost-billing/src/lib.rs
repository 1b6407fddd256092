//! cost-billing
//!
//! Invoice reconciliation and normalization.
//!
//! - [`tags`]: tag lookup per line, with an explicit resolved/skipped/failed outcome
//! - [`classify`]: ordered rule tables for service category and owning team
//! - [`normalize`]: billing month and its calendar day count
//! - [`driver`]: ledger diff, per-invoice batch assembly and storage
//!
//! Classification and normalization are pure. All I/O goes through the
//! `BillingApi` and `Warehouse` traits, so the driver runs unchanged against
//! the in-memory fakes in `cost-testkit`.

pub mod classify;
pub mod driver;
mod error;
pub mod normalize;
mod record;
pub mod retry;
pub mod tags;

pub use classify::{classify, tenant_or_default, Classification, DEFAULT_TENANT, PLATFORM_TEAM};
pub use driver::{pending_invoices, InvoiceReconciler, ReconcilerSettings, RunSummary};
pub use error::ReconcileError;
pub use normalize::{days_in_month, normalize, BillingPeriod};
pub use record::build_cost_record;
pub use retry::{RetryExhausted, RetryPolicy};
pub use tags::{resolve_tags, TagResolution};

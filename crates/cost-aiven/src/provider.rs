//! Provider boundary for billing data.
//!
//! This module defines **only** the error type and the [`BillingApi`] trait.
//! The HTTPS implementation lives in the crate root; in-memory fakes live in
//! `cost-testkit`.

use std::fmt;

use crate::model::{Invoice, InvoiceLine, Tags};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that a [`BillingApi`] implementation may return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Network or transport failure.
    Transport(String),
    /// The upstream API answered with a non-2xx status.
    Api { status: u16, message: String },
    /// A response payload could not be decoded.
    Decode(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Transport(msg) => write!(f, "transport error: {msg}"),
            ProviderError::Api { status, message } if message.is_empty() => {
                write!(f, "provider api error status={status}")
            }
            ProviderError::Api { status, message } => {
                write!(f, "provider api error status={status}: {message}")
            }
            ProviderError::Decode(msg) => write!(f, "decode error: {msg}"),
        }
    }
}

impl std::error::Error for ProviderError {}

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// Read-only billing provider contract.
///
/// Every call is one authenticated GET; callers await each response before
/// issuing the next request.
#[async_trait::async_trait]
pub trait BillingApi: Send + Sync {
    /// All invoices issued under `billing_group_id`, in provider order.
    async fn list_invoices(&self, billing_group_id: &str) -> Result<Vec<Invoice>, ProviderError>;

    /// Line items of one invoice.
    async fn invoice_lines(
        &self,
        billing_group_id: &str,
        invoice_id: &str,
    ) -> Result<Vec<InvoiceLine>, ProviderError>;

    /// Descriptive tags of a project/service pair.
    async fn service_tags(&self, project_name: &str, service_name: &str)
        -> Result<Tags, ProviderError>;
}

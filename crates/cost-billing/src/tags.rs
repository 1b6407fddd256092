//! Tag resolution with an explicit outcome per line.

use cost_aiven::{BillingApi, InvoiceLine, ProviderError, Tags};
use tracing::warn;

/// Outcome of resolving tags for one line.
///
/// Only `Resolved` carries tag values; the other two mean "unknown" and the
/// classifier defaults apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagResolution {
    Resolved(Tags),
    /// Account-level charge; no lookup attempted.
    Skipped,
    /// Lookup failed. Never aborts the run.
    Failed(ProviderError),
}

impl TagResolution {
    pub fn tags(&self) -> Tags {
        match self {
            TagResolution::Resolved(t) => t.clone(),
            TagResolution::Skipped | TagResolution::Failed(_) => Tags::default(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TagResolution::Failed(_))
    }
}

/// Look up tags for the line's project/service pair.
///
/// Support, extra and credit lines are skipped without a request.
pub async fn resolve_tags<A>(api: &A, line: &InvoiceLine) -> TagResolution
where
    A: BillingApi + ?Sized,
{
    if line.line_type.is_account_level() {
        return TagResolution::Skipped;
    }
    match api.service_tags(&line.project_name, &line.service_name).await {
        Ok(tags) => TagResolution::Resolved(tags),
        Err(err) => {
            warn!(
                project = %line.project_name,
                service = %line.service_name,
                error = %err,
                "tag lookup failed; continuing with empty tags"
            );
            TagResolution::Failed(err)
        }
    }
}

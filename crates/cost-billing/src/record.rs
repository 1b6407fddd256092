use cost_aiven::{Invoice, InvoiceLine};
use cost_warehouse::CostRecord;

use crate::classify::{classify, tenant_or_default};
use crate::normalize::normalize;
use crate::tags::TagResolution;

/// Assemble the warehouse row for one line of `invoice`.
///
/// The invoice status is copied as of now; later status changes do not touch
/// rows already written.
pub fn build_cost_record(
    billing_group_id: &str,
    invoice: &Invoice,
    line: &InvoiceLine,
    tags: &TagResolution,
) -> CostRecord {
    let tags = tags.tags();
    let class = classify(line, &tags);
    let period = normalize(line);

    CostRecord {
        invoice_id: invoice.id.clone(),
        billing_group_id: billing_group_id.to_string(),
        project_name: line.project_name.clone(),
        environment: tags.environment.clone(),
        team: class.team,
        service: class.category,
        service_name: line.service_name.clone(),
        tenant: tenant_or_default(&tags),
        status: invoice.status.as_str().to_string(),
        cost: line.cost.clone(),
        currency: line.currency.to_uppercase(),
        billing_month: period.billing_month,
        // 28..=31 always fits.
        day_count: period.day_count as i32,
    }
}

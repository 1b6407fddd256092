//! cost-testkit
//!
//! In-memory collaborators and fixtures for scenario tests. Nothing here is
//! linked into the `aiven-cost` binary.

mod billing;
mod rates;
mod warehouse;

pub use billing::StubBillingApi;
pub use rates::StubRatesApi;
pub use warehouse::InMemoryWarehouse;

use chrono::{DateTime, TimeZone, Utc};
use cost_aiven::{Invoice, InvoiceLine, InvoiceStatus, LineType, Tags};

pub const BILLING_GROUP: &str = "bg-test";
pub const COST_TABLE: &str = "cost_items";
pub const CURRENCY_TABLE: &str = "currency_rates";

pub fn invoice(id: &str, status: &str) -> Invoice {
    Invoice {
        id: id.to_string(),
        total_inc_vat: "100.00".to_string(),
        status: InvoiceStatus::parse(status),
    }
}

pub fn month_start(year: i32, month: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// A `service_charge` line for March 2024.
pub fn service_line(service_type: &str, project: &str, service: &str, cost: &str) -> InvoiceLine {
    InvoiceLine {
        timestamp_begin: month_start(2024, 3),
        timestamp_end: month_start(2024, 4),
        cost: cost.to_string(),
        currency: "eur".to_string(),
        service_type: service_type.to_string(),
        service_name: service.to_string(),
        project_name: project.to_string(),
        line_type: LineType::ServiceCharge,
    }
}

/// An account-level line (support, extra or credit) with no service name.
pub fn account_line(line_type: LineType, cost: &str) -> InvoiceLine {
    InvoiceLine {
        timestamp_begin: month_start(2024, 3),
        timestamp_end: month_start(2024, 4),
        cost: cost.to_string(),
        currency: "eur".to_string(),
        service_type: String::new(),
        service_name: String::new(),
        project_name: String::new(),
        line_type,
    }
}

pub fn tags(tenant: &str, team: &str, environment: &str) -> Tags {
    Tags {
        tenant: tenant.to_string(),
        team: team.to_string(),
        environment: environment.to_string(),
    }
}

//! Wire models returned by the Aiven billing API.
//!
//! Costs stay decimal strings end to end; they are never parsed into floats.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Settlement status of an invoice.
///
/// Lifecycle on the provider side is `estimate -> mailed -> paid`; anything
/// else the provider sends is kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum InvoiceStatus {
    Estimate,
    Mailed,
    Paid,
    Other(String),
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &str {
        match self {
            InvoiceStatus::Estimate => "estimate",
            InvoiceStatus::Mailed => "mailed",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Other(s) => s.as_str(),
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "estimate" => InvoiceStatus::Estimate,
            "mailed" => InvoiceStatus::Mailed,
            "paid" => InvoiceStatus::Paid,
            other => InvoiceStatus::Other(other.to_string()),
        }
    }

    /// A paid invoice never changes again.
    pub fn is_final(&self) -> bool {
        matches!(self, InvoiceStatus::Paid)
    }
}

impl From<String> for InvoiceStatus {
    fn from(s: String) -> Self {
        InvoiceStatus::parse(&s)
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of a charge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum LineType {
    ServiceCharge,
    SupportCharge,
    ExtraCharge,
    CreditConsumption,
    Other(String),
}

impl LineType {
    pub fn as_str(&self) -> &str {
        match self {
            LineType::ServiceCharge => "service_charge",
            LineType::SupportCharge => "support_charge",
            LineType::ExtraCharge => "extra_charge",
            LineType::CreditConsumption => "credit_consumption",
            LineType::Other(s) => s.as_str(),
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "service_charge" => LineType::ServiceCharge,
            "support_charge" => LineType::SupportCharge,
            "extra_charge" => LineType::ExtraCharge,
            "credit_consumption" => LineType::CreditConsumption,
            other => LineType::Other(other.to_string()),
        }
    }

    /// Support, extra and credit lines are billed to the account as a whole,
    /// not to a project/service pair.
    pub fn is_account_level(&self) -> bool {
        matches!(
            self,
            LineType::SupportCharge | LineType::ExtraCharge | LineType::CreditConsumption
        )
    }
}

/// A missing line type decodes as `Other("")`, which classifies like any
/// unknown type.
impl Default for LineType {
    fn default() -> Self {
        LineType::Other(String::new())
    }
}

impl From<String> for LineType {
    fn from(s: String) -> Self {
        LineType::parse(&s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Invoice {
    #[serde(rename = "invoice_number")]
    pub id: String,
    /// Total including VAT, decimal string.
    #[serde(default, deserialize_with = "string_or_null")]
    pub total_inc_vat: String,
    #[serde(rename = "state", alias = "invoice_state")]
    pub status: InvoiceStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InvoiceLine {
    pub timestamp_begin: DateTime<Utc>,
    pub timestamp_end: DateTime<Utc>,
    /// Line total in local currency, decimal string (e.g. `"12.50"`).
    #[serde(
        rename = "line_total_local",
        default,
        deserialize_with = "string_or_null"
    )]
    pub cost: String,
    #[serde(rename = "local_currency", default, deserialize_with = "string_or_null")]
    pub currency: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub service_type: String,
    /// Empty for support and credit lines.
    #[serde(default, deserialize_with = "string_or_null")]
    pub service_name: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub project_name: String,
    #[serde(default, deserialize_with = "line_type_or_null")]
    pub line_type: LineType,
}

/// Descriptive tags attached to a project/service pair. Any of them may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Tags {
    #[serde(default, deserialize_with = "string_or_null")]
    pub tenant: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub team: String,
    #[serde(default, deserialize_with = "string_or_null")]
    pub environment: String,
}

/// Aiven sends `null` where a string is absent; treat it as empty.
fn string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let v: Option<String> = Option::deserialize(deserializer)?;
    Ok(v.unwrap_or_default())
}

fn line_type_or_null<'de, D>(deserializer: D) -> Result<LineType, D::Error>
where
    D: Deserializer<'de>,
{
    let v: Option<String> = Option::deserialize(deserializer)?;
    Ok(v.map(LineType::from).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn invoice_accepts_state_and_invoice_state() {
        let a: Invoice = serde_json::from_value(json!({
            "invoice_number": "INV-1", "total_inc_vat": "10.00", "state": "paid"
        }))
        .unwrap();
        let b: Invoice = serde_json::from_value(json!({
            "invoice_number": "INV-2", "total_inc_vat": "10.00", "invoice_state": "mailed"
        }))
        .unwrap();
        assert_eq!(a.status, InvoiceStatus::Paid);
        assert_eq!(b.status, InvoiceStatus::Mailed);
    }

    #[test]
    fn unknown_status_is_kept_verbatim() {
        let s = InvoiceStatus::parse("partially_refunded");
        assert_eq!(s, InvoiceStatus::Other("partially_refunded".into()));
        assert_eq!(s.as_str(), "partially_refunded");
        assert!(!s.is_final());
        assert!(InvoiceStatus::Paid.is_final());
    }

    #[test]
    fn line_with_null_service_name_decodes_as_empty() {
        let line: InvoiceLine = serde_json::from_value(json!({
            "timestamp_begin": "2024-03-01T00:00:00Z",
            "timestamp_end": "2024-03-31T23:59:59Z",
            "line_total_local": "100.00",
            "local_currency": "eur",
            "service_type": null,
            "service_name": null,
            "project_name": "",
            "line_type": "support_charge"
        }))
        .unwrap();
        assert_eq!(line.service_name, "");
        assert_eq!(line.service_type, "");
        assert_eq!(line.line_type, LineType::SupportCharge);
        assert_eq!(line.cost, "100.00");
    }

    #[test]
    fn credit_line_with_null_currency_decodes() {
        let line: InvoiceLine = serde_json::from_value(json!({
            "timestamp_begin": "2024-03-01T00:00:00Z",
            "timestamp_end": "2024-04-01T00:00:00Z",
            "line_total_local": "-25.00",
            "local_currency": null,
            "line_type": "credit_consumption"
        }))
        .unwrap();
        assert_eq!(line.currency, "");
        assert_eq!(line.cost, "-25.00");
        assert_eq!(line.line_type, LineType::CreditConsumption);
    }

    #[test]
    fn line_without_line_type_decodes_as_other_empty() {
        let missing: InvoiceLine = serde_json::from_value(json!({
            "timestamp_begin": "2024-03-01T00:00:00Z",
            "timestamp_end": "2024-04-01T00:00:00Z",
            "line_total_local": null,
            "local_currency": "eur",
            "service_type": "pg",
            "service_name": "db-1",
            "project_name": "team-a-prod"
        }))
        .unwrap();
        assert_eq!(missing.line_type, LineType::Other(String::new()));
        assert_eq!(missing.cost, "");
        assert!(!missing.line_type.is_account_level());

        let null: InvoiceLine = serde_json::from_value(json!({
            "timestamp_begin": "2024-03-01T00:00:00Z",
            "timestamp_end": "2024-04-01T00:00:00Z",
            "line_total_local": "1.00",
            "local_currency": "eur",
            "line_type": null
        }))
        .unwrap();
        assert_eq!(null.line_type, LineType::default());
    }

    #[test]
    fn account_level_line_types() {
        assert!(LineType::SupportCharge.is_account_level());
        assert!(LineType::ExtraCharge.is_account_level());
        assert!(LineType::CreditConsumption.is_account_level());
        assert!(!LineType::ServiceCharge.is_account_level());
        assert!(!LineType::Other("misc".into()).is_account_level());
    }

    #[test]
    fn tags_default_missing_fields() {
        let t: Tags = serde_json::from_value(json!({ "team": "team-a" })).unwrap();
        assert_eq!(t.team, "team-a");
        assert_eq!(t.tenant, "");
        assert_eq!(t.environment, "");
    }
}

//! Line classification.
//!
//! Precedence lives in two ordered rule tables; the first rule whose
//! predicate matches decides. Both tables end in a catch-all, so
//! classification is total.

use cost_aiven::{InvoiceLine, LineType, Tags};
use tracing::debug;

/// Tenant attributed to resources without a tenant tag.
pub const DEFAULT_TENANT: &str = "nav";

/// Team that owns account-level charges and the shared Kafka platform.
pub const PLATFORM_TEAM: &str = "nais";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryOutcome {
    Fixed(&'static str),
    /// Raw service type, verbatim.
    ServiceType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamOutcome {
    Fixed(&'static str),
    /// Team tag of the project/service pair (may be empty).
    TagTeam,
}

pub struct Rule<O> {
    pub name: &'static str,
    pub applies: fn(&InvoiceLine) -> bool,
    pub outcome: O,
}

fn is_support_or_extra(line: &InvoiceLine) -> bool {
    matches!(line.line_type, LineType::SupportCharge | LineType::ExtraCharge)
}

fn is_credit(line: &InvoiceLine) -> bool {
    line.line_type == LineType::CreditConsumption
}

fn is_opensearch_service(line: &InvoiceLine) -> bool {
    line.service_name.starts_with("opensearch-")
}

fn is_kafka(line: &InvoiceLine) -> bool {
    line.service_type == "kafka"
}

fn is_account_level(line: &InvoiceLine) -> bool {
    line.line_type.is_account_level()
}

fn always(_: &InvoiceLine) -> bool {
    true
}

pub const CATEGORY_RULES: &[Rule<CategoryOutcome>] = &[
    Rule {
        name: "support_or_extra_charge",
        applies: is_support_or_extra,
        outcome: CategoryOutcome::Fixed("support"),
    },
    Rule {
        name: "credit_consumption",
        applies: is_credit,
        outcome: CategoryOutcome::Fixed("credit"),
    },
    Rule {
        name: "opensearch_service_name",
        applies: is_opensearch_service,
        outcome: CategoryOutcome::Fixed("opensearch"),
    },
    Rule {
        name: "service_type",
        applies: always,
        outcome: CategoryOutcome::ServiceType,
    },
];

pub const TEAM_RULES: &[Rule<TeamOutcome>] = &[
    Rule {
        name: "kafka_platform",
        applies: is_kafka,
        outcome: TeamOutcome::Fixed(PLATFORM_TEAM),
    },
    Rule {
        name: "account_level_charge",
        applies: is_account_level,
        outcome: TeamOutcome::Fixed(PLATFORM_TEAM),
    },
    Rule {
        name: "tag_team",
        applies: always,
        outcome: TeamOutcome::TagTeam,
    },
];

fn first_match<O: Copy>(
    rules: &'static [Rule<O>],
    line: &InvoiceLine,
) -> Option<&'static Rule<O>> {
    let rule = rules.iter().find(|r| (r.applies)(line))?;
    debug!(
        rule = rule.name,
        line_type = line.line_type.as_str(),
        service_type = %line.service_type,
        service_name = %line.service_name,
        "classification rule matched"
    );
    Some(rule)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: String,
    pub team: String,
}

pub fn category(line: &InvoiceLine) -> String {
    match first_match(CATEGORY_RULES, line).map(|r| r.outcome) {
        Some(CategoryOutcome::Fixed(c)) => c.to_string(),
        Some(CategoryOutcome::ServiceType) | None => line.service_type.clone(),
    }
}

pub fn team(line: &InvoiceLine, tags: &Tags) -> String {
    match first_match(TEAM_RULES, line).map(|r| r.outcome) {
        Some(TeamOutcome::Fixed(t)) => t.to_string(),
        Some(TeamOutcome::TagTeam) | None => tags.team.clone(),
    }
}

/// Category and owning team of one line. Pure and total.
pub fn classify(line: &InvoiceLine, tags: &Tags) -> Classification {
    Classification {
        category: category(line),
        team: team(line, tags),
    }
}

/// Empty tenant tags fall back to [`DEFAULT_TENANT`].
pub fn tenant_or_default(tags: &Tags) -> String {
    if tags.tenant.is_empty() {
        DEFAULT_TENANT.to_string()
    } else {
        tags.tenant.clone()
    }
}

//! Runtime secret resolution.
//!
//! # Contract
//! - Config YAML stores only **env var NAMES** (e.g. `"AIVEN_API_TOKEN"`).
//! - At startup, callers invoke [`resolve_secrets_for_job`] once.
//! - The returned [`ResolvedSecrets`] is passed into constructors; never
//!   scatter `std::env::var` calls across the codebase.
//! - `Debug` redacts values. Error messages reference the env var **NAME**,
//!   never the value.
//!
//! # Job-aware enforcement
//! | Job      | Required                               |
//! |----------|----------------------------------------|
//! | INVOICES | Aiven API token, warehouse URL         |
//! | CURRENCY | warehouse URL (rates token optional)   |
//! | LEDGER   | warehouse URL                          |

use anyhow::{bail, Result};
use serde_json::Value;

use crate::Job;

/// All runtime-resolved secrets for one job run.
#[derive(Clone)]
pub struct ResolvedSecrets {
    /// `None` if the named env var was absent or empty.
    pub aiven_api_token: Option<String>,
    pub database_url: Option<String>,
    pub currency_api_token: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field(
                "aiven_api_token",
                &self.aiven_api_token.as_ref().map(|_| "<REDACTED>"),
            )
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "<REDACTED>"),
            )
            .field(
                "currency_api_token",
                &self.currency_api_token.as_ref().map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

impl ResolvedSecrets {
    /// Warehouse URL, or the SECRETS_MISSING error naming `var`.
    pub fn require_database_url(&self, var: &str) -> Result<&str> {
        match self.database_url.as_deref() {
            Some(u) => Ok(u),
            None => bail!("SECRETS_MISSING: required env var '{var}' (warehouse url) is not set or empty"),
        }
    }

    pub fn require_aiven_api_token(&self, var: &str) -> Result<&str> {
        match self.aiven_api_token.as_deref() {
            Some(t) => Ok(t),
            None => bail!("SECRETS_MISSING: required env var '{var}' (aiven api token) is not set or empty"),
        }
    }
}

/// Env var names extracted from the config JSON.
struct SecretEnvNames {
    aiven_token_var: String,
    database_url_var: String,
    currency_token_var: String,
}

/// Non-blank string at `pointer`, trimmed.
fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_env_names(config_json: &Value) -> SecretEnvNames {
    SecretEnvNames {
        aiven_token_var: read_str_at(config_json, "/aiven/token_env")
            .unwrap_or_else(|| "AIVEN_API_TOKEN".to_string()),
        database_url_var: read_str_at(config_json, "/warehouse/url_env")
            .unwrap_or_else(|| "COST_DATABASE_URL".to_string()),
        currency_token_var: read_str_at(config_json, "/currency/token_env")
            .unwrap_or_else(|| "CURRENCY_TOKEN".to_string()),
    }
}

/// Resolve secrets from the process environment.
pub fn resolve_secrets_for_job(config_json: &Value, job: Job) -> Result<ResolvedSecrets> {
    resolve_secrets_with(config_json, job, |name| std::env::var(name).ok())
}

/// Resolve secrets through an explicit lookup (tests pass a map here).
pub fn resolve_secrets_with<F>(config_json: &Value, job: Job, lookup: F) -> Result<ResolvedSecrets>
where
    F: Fn(&str) -> Option<String>,
{
    let names = parse_env_names(config_json);
    let resolve = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

    let aiven_api_token = resolve(&names.aiven_token_var);
    let database_url = resolve(&names.database_url_var);
    let currency_api_token = resolve(&names.currency_token_var);

    if database_url.is_none() {
        bail!(
            "SECRETS_MISSING job={}: required env var '{}' (warehouse url) is not set or empty",
            job.as_str(),
            names.database_url_var,
        );
    }
    if job == Job::Invoices && aiven_api_token.is_none() {
        bail!(
            "SECRETS_MISSING job={}: required env var '{}' (aiven api token) is not set or empty",
            job.as_str(),
            names.aiven_token_var,
        );
    }

    Ok(ResolvedSecrets {
        aiven_api_token,
        database_url,
        currency_api_token,
    })
}

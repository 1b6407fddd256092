//! cost-config
//!
//! Layered configuration for the billing jobs.
//!
//! Load order (later layers override earlier ones):
//! 1. [`DEFAULT_CONFIG_YAML`] built into the binary
//! 2. YAML files passed with `--config`, in the order given
//! 3. a fixed set of environment variables ([`ENV_OVERRIDES`])
//!
//! The merged document is hashed (SHA-256 over canonical JSON) so every run
//! can log which effective configuration it used. Secrets never appear in the
//! document: YAML stores env var NAMES and [`secrets`] resolves them once.

pub mod secrets;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;

/// Known secret-like prefixes. A leaf string in the effective config starting
/// with one of these aborts loading with CONFIG_SECRET_DETECTED.
const SECRET_PREFIXES: &[&str] = &[
    "aivenv1 ",   // Aiven auth header pasted verbatim
    "AKIA",       // AWS access key ID
    "-----BEGIN", // PEM private keys
    "ghp_",       // GitHub PAT
    "glpat-",     // GitLab PAT
    "xoxb-",      // Slack bot token
    "postgres://",
    "postgresql://",
];

/// Base layer. Every key the jobs read has a value here, except
/// `aiven.billing_group_id` which must be supplied by the operator.
pub const DEFAULT_CONFIG_YAML: &str = r#"
aiven:
  api_host: "api.aiven.io"
  billing_group_id: ""
  token_env: "AIVEN_API_TOKEN"
warehouse:
  url_env: "COST_DATABASE_URL"
  cost_items_table: "cost_items"
  currency_table: "currency_rates"
currency:
  api_base_url: "https://api.exchangerate.host"
  token_env: "CURRENCY_TOKEN"
  start_date: "2020-01-01"
retry:
  max_attempts: 3
  initial_backoff_ms: 500
  max_backoff_ms: 8000
log:
  format: "text"
  level: "info"
"#;

/// Environment variables that override a single config leaf.
/// Values are taken verbatim as strings.
pub const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("AIVEN_API_HOST", "/aiven/api_host"),
    ("AIVEN_BILLING_GROUP_ID", "/aiven/billing_group_id"),
    ("COST_ITEMS_TABLE", "/warehouse/cost_items_table"),
    ("CURRENCY_TABLE", "/warehouse/currency_table"),
    ("LOG_FORMAT", "/log/format"),
    ("LOG_LEVEL", "/log/level"),
];

/// Registry of every JSON-pointer prefix some job actually reads.
///
/// Anything outside these prefixes is a typo or a leftover and is reported
/// by [`report_unused_keys`].
const CONSUMED_POINTERS: &[&str] = &[
    "/aiven/api_host",
    "/aiven/billing_group_id",
    "/aiven/token_env",
    "/warehouse/url_env",
    "/warehouse/cost_items_table",
    "/warehouse/currency_table",
    "/currency/api_base_url",
    "/currency/token_env",
    "/currency/start_date",
    "/retry",
    "/log",
];

/// The batch jobs this repository can run. Decides which secrets are required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    /// Invoice reconciliation against the settlement ledger.
    Invoices,
    /// Currency-rate ingestion.
    Currency,
    /// Ledger maintenance (pruning non-final rows).
    Ledger,
}

impl Job {
    pub fn as_str(&self) -> &'static str {
        match self {
            Job::Invoices => "INVOICES",
            Job::Currency => "CURRENCY",
            Job::Ledger => "LEDGER",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone)]
pub struct UnusedKeyReport {
    /// Minimal set of unused leaf pointers (sorted)
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// Produce an unused-key report for a merged config document.
/// If `policy == Fail`, returns an error when unused keys exist.
pub fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeyReport> {
    let consumed: BTreeSet<String> = CONSUMED_POINTERS
        .iter()
        .map(|p| normalize_pointer(p))
        .collect();

    let mut leaves: Vec<String> = Vec::new();
    collect_leaf_pointers(config_json, "", &mut leaves);

    let mut unused: Vec<String> = leaves
        .into_iter()
        .filter(|lp| !consumed.iter().any(|cp| is_prefix_pointer(cp, lp)))
        .collect();
    unused.sort();
    unused.dedup();

    let report = UnusedKeyReport {
        unused_leaf_pointers: unused,
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        bail!(
            "CONFIG_UNUSED_KEYS: {} unused config leaf key(s) detected. First few: {}",
            report.unused_leaf_pointers.len(),
            preview_list(&report.unused_leaf_pointers, 12)
        );
    }

    Ok(report)
}

// ---------------------------------------------------------------------------
// Layered loading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

/// Merge YAML documents in order: earlier docs are base, later docs override.
pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let merged = merge_yaml_docs(yaml_docs)?;
    finish(merged)
}

/// Full load used by the binary: defaults, then `paths`, then env overrides
/// looked up through `env`.
pub fn load_effective<F>(paths: &[&str], env: F) -> Result<LoadedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let docs = read_docs(paths)?;
    let mut all: Vec<&str> = vec![DEFAULT_CONFIG_YAML];
    all.extend(docs.iter().map(|s| s.as_str()));

    let merged = merge_yaml_docs(&all)?;
    let merged = apply_env_overrides(merged, env);
    finish(merged)
}

/// Apply [`ENV_OVERRIDES`] on top of a merged document.
pub fn apply_env_overrides<F>(mut merged: Value, env: F) -> Value
where
    F: Fn(&str) -> Option<String>,
{
    for (var, pointer) in ENV_OVERRIDES {
        if let Some(v) = env(var).filter(|v| !v.trim().is_empty()) {
            set_pointer(&mut merged, pointer, Value::String(v.trim().to_string()));
        }
    }
    merged
}

fn read_docs(paths: &[&str]) -> Result<Vec<String>> {
    paths
        .iter()
        .map(|p| fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}")))
        .collect()
}

fn merge_yaml_docs(yaml_docs: &[&str]) -> Result<Value> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        // An empty file parses as null; treat it as an empty layer.
        if v_yaml.is_null() {
            continue;
        }
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }
    Ok(merged)
}

fn finish(merged: Value) -> Result<LoadedConfig> {
    enforce_no_secret_literals(&merged)?;

    let canonical_json = serde_json::to_string(&merged).context("canonical json serialize failed")?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

/// Set `value` at `pointer`, creating intermediate objects as needed.
fn set_pointer(root: &mut Value, pointer: &str, value: Value) {
    let mut cur = root;
    let tokens: Vec<&str> = pointer.trim_start_matches('/').split('/').collect();
    let Some((last, parents)) = tokens.split_last() else {
        return;
    };
    for t in parents {
        if !cur.is_object() {
            *cur = Value::Object(Default::default());
        }
        let Value::Object(map) = cur else { return };
        cur = map
            .entry(t.to_string())
            .or_insert_with(|| Value::Object(Default::default()));
    }
    if !cur.is_object() {
        *cur = Value::Object(Default::default());
    }
    if let Value::Object(map) = cur {
        map.insert(last.to_string(), value);
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    let mut leaves = Vec::new();
    collect_leaf_pointers(v, "", &mut leaves);

    for ptr in leaves {
        if let Some(s) = v.pointer(&ptr).and_then(|val| val.as_str()) {
            if looks_like_secret(s) {
                bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", ptr);
            }
        }
    }
    Ok(())
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    if t.len() < 8 {
        return false;
    }
    SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}

/// Normalize JSON pointer: leading "/", no trailing "/" unless it's just "/".
fn normalize_pointer(p: &str) -> String {
    let mut s = p.trim().to_string();
    if s.is_empty() {
        return "/".to_string();
    }
    if !s.starts_with('/') {
        s.insert(0, '/');
    }
    while s.ends_with('/') && s.len() > 1 {
        s.pop();
    }
    s
}

/// "/a/b" consumes "/a/b" and "/a/b/c" but NOT "/a/bc".
fn is_prefix_pointer(prefix: &str, leaf: &str) -> bool {
    if prefix == "/" || leaf == prefix {
        return true;
    }
    leaf.starts_with(prefix)
        && leaf
            .get(prefix.len()..prefix.len() + 1)
            .map(|c| c == "/")
            .unwrap_or(false)
}

fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) => {
            for (k, vv) in map.iter() {
                let next = format!("{}/{}", prefix, escape_pointer_token(k));
                collect_leaf_pointers(vv, &next, out);
            }
        }
        Value::Array(arr) => {
            for (i, vv) in arr.iter().enumerate() {
                let next = format!("{}/{}", prefix, i);
                collect_leaf_pointers(vv, &next, out);
            }
        }
        _ => {
            let p = if prefix.is_empty() {
                "/".to_string()
            } else {
                prefix.to_string()
            };
            out.push(p);
        }
    }
}

fn escape_pointer_token(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

fn preview_list(items: &[String], n: usize) -> String {
    let take = items.iter().take(n).cloned().collect::<Vec<_>>();
    format!("{:?}", take)
}

// ---------------------------------------------------------------------------
// Typed view
// ---------------------------------------------------------------------------

/// Immutable, typed configuration. Built once at startup and handed to each
/// component's constructor.
#[derive(Debug, Clone, Deserialize)]
pub struct CostConfig {
    pub aiven: AivenConfig,
    pub warehouse: WarehouseConfig,
    pub currency: CurrencyConfig,
    pub retry: RetryConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AivenConfig {
    /// Hostname only; the client always speaks HTTPS.
    pub api_host: String,
    pub billing_group_id: String,
    /// Name of the env var holding the API token.
    pub token_env: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WarehouseConfig {
    /// Name of the env var holding the Postgres connection URL.
    pub url_env: String,
    pub cost_items_table: String,
    pub currency_table: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurrencyConfig {
    pub api_base_url: String,
    pub token_env: String,
    /// First day fetched when the currency table is empty.
    pub start_date: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// `text` or `json`; validated when the logger is built.
    pub format: String,
    pub level: String,
}

impl CostConfig {
    /// Decode and validate the typed view of a merged document.
    pub fn from_json(config_json: &Value) -> Result<Self> {
        let cfg: CostConfig = serde_json::from_value(config_json.clone())
            .context("CONFIG_INVALID: effective config does not match the expected shape")?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        for (key, name) in [
            ("warehouse.cost_items_table", &self.warehouse.cost_items_table),
            ("warehouse.currency_table", &self.warehouse.currency_table),
        ] {
            if !is_valid_table_name(name) {
                bail!("CONFIG_INVALID: {key} '{name}' is not a valid table name");
            }
        }
        if self.aiven.api_host.trim().is_empty() {
            bail!("CONFIG_INVALID: aiven.api_host must not be empty");
        }
        if self.retry.max_attempts == 0 {
            bail!("CONFIG_INVALID: retry.max_attempts must be >= 1");
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            bail!("CONFIG_INVALID: retry.initial_backoff_ms must be <= retry.max_backoff_ms");
        }
        Ok(())
    }

    /// The billing group is only needed by the invoices job, so it is checked
    /// on access rather than at load time.
    pub fn billing_group_id(&self) -> Result<&str> {
        let id = self.aiven.billing_group_id.trim();
        if id.is_empty() {
            bail!(
                "CONFIG_INVALID: aiven.billing_group_id is not set \
                 (set it in YAML or via AIVEN_BILLING_GROUP_ID)"
            );
        }
        Ok(id)
    }
}

/// Longest accepted table name. Derived names such as `{table}_invoice_id_idx`
/// must stay within Postgres' 63-byte identifier limit, which truncates silently.
pub const MAX_TABLE_NAME_LEN: usize = 48;

/// Lowercase SQL identifier: `[a-z_][a-z0-9_]*`, at most [`MAX_TABLE_NAME_LEN`] bytes.
pub fn is_valid_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    name.len() <= MAX_TABLE_NAME_LEN
        && (first.is_ascii_lowercase() || first == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

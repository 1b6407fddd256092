use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => bail!("LOG_INVALID: unknown log format '{other}' (expected text|json)"),
        }
    }
}

/// `RUST_LOG` wins when set; otherwise the configured level applies to
/// every target.
pub fn build_filter(level: &str, rust_log: Option<&str>) -> Result<EnvFilter> {
    let level = LevelFilter::from_str(level.trim())
        .map_err(|_| anyhow!("LOG_INVALID: unknown log level '{level}'"))?;
    match rust_log.filter(|v| !v.trim().is_empty()) {
        Some(directives) => EnvFilter::try_new(directives)
            .with_context(|| format!("LOG_INVALID: bad RUST_LOG '{directives}'")),
        None => Ok(EnvFilter::default().add_directive(level.into())),
    }
}

/// Install the global subscriber. Logs go to stderr so stdout stays free
/// for command output.
pub fn init_tracing(format: &str, level: &str) -> Result<()> {
    let format = LogFormat::from_str(format)?;
    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = build_filter(level, rust_log.as_deref())?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let res = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    res.map_err(|e| anyhow!("LOG_INVALID: failed to install subscriber: {e}"))
}

//! Exchange-rate provider boundary.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::Deserialize;

/// One day of rates against the request's base currency.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct DayRates {
    #[serde(rename = "EUR")]
    pub eur: f64,
    #[serde(rename = "NOK")]
    pub nok: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RatesError {
    Transport(String),
    /// Non-2xx status, or a 2xx body flagged `"success": false`.
    Api { status: u16, message: String },
    Decode(String),
}

impl fmt::Display for RatesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RatesError::Transport(msg) => write!(f, "transport error: {msg}"),
            RatesError::Api { status, message } => {
                write!(f, "rates api error status={status}: {message}")
            }
            RatesError::Decode(msg) => write!(f, "decode error: {msg}"),
        }
    }
}

impl std::error::Error for RatesError {}

#[async_trait::async_trait]
pub trait RatesApi: Send + Sync {
    /// Daily rates for `symbols` against `base`, both ends inclusive.
    async fn rates_period(
        &self,
        base: &str,
        symbols: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, DayRates>, RatesError>;
}

use std::collections::BTreeMap;

use chrono::NaiveDate;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::provider::{DayRates, RatesApi, RatesError};

/// HTTP client for a `/timeseries` exchange-rate endpoint.
#[derive(Clone)]
pub struct RatesClient {
    http: reqwest::Client,
    base_url: Url,
    access_key: Option<String>,
}

impl std::fmt::Debug for RatesClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RatesClient")
            .field("base_url", &self.base_url.as_str())
            .field("access_key", &self.access_key.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

impl RatesClient {
    pub fn new(base_url: &str, access_key: Option<String>) -> Result<Self, RatesError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| RatesError::Transport(format!("invalid base url '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(RatesError::Transport(format!(
                "invalid base url '{base_url}': cannot be a base"
            )));
        }
        let http = reqwest::Client::builder()
            .user_agent(concat!("aiven-cost/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RatesError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url,
            access_key,
        })
    }

    fn timeseries_url(
        &self,
        base: &str,
        symbols: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Url, RatesError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RatesError::Transport(format!("invalid base url '{}'", self.base_url)))?
            .pop_if_empty()
            .push("timeseries");
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("base", base)
                .append_pair("symbols", symbols)
                .append_pair("start_date", &start.to_string())
                .append_pair("end_date", &end.to_string());
            if let Some(key) = &self.access_key {
                q.append_pair("access_key", key);
            }
        }
        Ok(url)
    }
}

#[derive(Debug, Deserialize)]
struct TimeseriesBody {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    rates: BTreeMap<NaiveDate, DayRates>,
}

#[async_trait::async_trait]
impl RatesApi for RatesClient {
    async fn rates_period(
        &self,
        base: &str,
        symbols: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, DayRates>, RatesError> {
        let url = self.timeseries_url(base, symbols, start, end)?;
        debug!(%start, %end, base, symbols, "GET timeseries");

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| RatesError::Transport(format!("GET timeseries: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RatesError::Api {
                status: status.as_u16(),
                message: body.trim().chars().take(512).collect(),
            });
        }

        let body: TimeseriesBody = resp
            .json()
            .await
            .map_err(|e| RatesError::Decode(format!("GET timeseries: {e}")))?;

        if body.success == Some(false) {
            let message = body
                .error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "success=false".to_string());
            return Err(RatesError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(body.rates)
    }
}

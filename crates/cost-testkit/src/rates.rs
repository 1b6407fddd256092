use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::NaiveDate;
use cost_currency::{DayRates, RatesApi, RatesError};

/// Serves rates from a fixed table and records every requested window.
#[derive(Default)]
pub struct StubRatesApi {
    rates: BTreeMap<NaiveDate, DayRates>,
    error: Option<RatesError>,
    requests: Mutex<Vec<(NaiveDate, NaiveDate)>>,
}

impl StubRatesApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same rates for every day in `[from, to]`.
    pub fn with_flat_rates(mut self, from: NaiveDate, to: NaiveDate, eur: f64, nok: f64) -> Self {
        for day in from.iter_days().take_while(|d| *d <= to) {
            self.rates.insert(day, DayRates { eur, nok });
        }
        self
    }

    pub fn with_error(mut self, err: RatesError) -> Self {
        self.error = Some(err);
        self
    }

    pub fn requests(&self) -> Vec<(NaiveDate, NaiveDate)> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl RatesApi for StubRatesApi {
    async fn rates_period(
        &self,
        _base: &str,
        _symbols: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, DayRates>, RatesError> {
        if let Ok(mut r) = self.requests.lock() {
            r.push((start, end));
        }
        if let Some(e) = &self.error {
            return Err(e.clone());
        }
        Ok(self
            .rates
            .range(start..=end)
            .map(|(d, r)| (*d, *r))
            .collect())
    }
}

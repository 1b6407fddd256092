//! cost-currency
//!
//! Daily USD exchange rates into the warehouse currency table.
//!
//! Incremental: each run continues from the day after the newest stored rate
//! (or the configured start date on an empty table) up to today, fetching in
//! windows the rates API accepts.

mod client;
mod provider;

pub use client::RatesClient;
pub use provider::{DayRates, RatesApi, RatesError};

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{Days, NaiveDate};
use cost_config::CostConfig;
use cost_warehouse::{CurrencyRate, DeletePredicate, TableSchema, Warehouse};
use tracing::info;

pub const BASE_CURRENCY: &str = "USD";
pub const SYMBOLS: &str = "EUR,NOK";

/// Longest span requested in one call, in days (inclusive).
pub const MAX_WINDOW_DAYS: u64 = 365;

/// Consecutive inclusive `(start, end)` windows covering `[start, today]`.
///
/// Empty when `start` is after `today`.
pub fn fetch_windows(start: NaiveDate, today: NaiveDate) -> Vec<(NaiveDate, NaiveDate)> {
    let mut out = Vec::new();
    let mut from = start;
    while from <= today {
        let to = from
            .checked_add_days(Days::new(MAX_WINDOW_DAYS - 1))
            .map_or(today, |d| d.min(today));
        out.push((from, to));
        match to.succ_opt() {
            Some(next) => from = next,
            None => break,
        }
    }
    out
}

/// Six decimals, matching the stored format.
pub fn to_currency_rate(date: NaiveDate, rates: &DayRates) -> CurrencyRate {
    CurrencyRate {
        date,
        usdeur: format!("{:.6}", rates.eur),
        usdnok: format!("{:.6}", rates.nok),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencySummary {
    /// `None` when the table was already up to date.
    pub fetched_from: Option<NaiveDate>,
    pub windows: usize,
    pub rows_deleted: u64,
    pub rows_written: usize,
}

pub struct CurrencySync<'a> {
    api: &'a dyn RatesApi,
    warehouse: &'a dyn Warehouse,
    table: String,
    start_date: NaiveDate,
}

impl<'a> CurrencySync<'a> {
    pub fn new(
        api: &'a dyn RatesApi,
        warehouse: &'a dyn Warehouse,
        table: impl Into<String>,
        start_date: NaiveDate,
    ) -> Self {
        Self {
            api,
            warehouse,
            table: table.into(),
            start_date,
        }
    }

    pub fn from_config(api: &'a dyn RatesApi, warehouse: &'a dyn Warehouse, cfg: &CostConfig) -> Self {
        Self::new(
            api,
            warehouse,
            cfg.warehouse.currency_table.clone(),
            cfg.currency.start_date,
        )
    }

    /// Bring the currency table up to `today`.
    ///
    /// With `refetch_from`, stored rows on or after that date are deleted
    /// first and fetched again.
    pub async fn run(&self, today: NaiveDate, refetch_from: Option<NaiveDate>) -> Result<CurrencySummary> {
        let table = self.table.as_str();
        self.warehouse
            .create_table_if_not_exists(TableSchema::CurrencyRates, table)
            .await
            .with_context(|| format!("failed creating currency table {table}"))?;

        let mut rows_deleted = 0;
        if let Some(from) = refetch_from {
            rows_deleted = self
                .warehouse
                .delete_where(table, &DeletePredicate::DateOnOrAfter(from))
                .await
                .context("failed to delete rates for refetch")?;
            info!(%from, rows_deleted, "currency rows cleared for refetch");
        }

        let newest = self
            .warehouse
            .newest_currency_date(table)
            .await
            .context("failed to get newest date")?;
        let start = match newest {
            Some(d) => d.succ_opt().context("newest currency date is out of range")?,
            None => self.start_date,
        };

        let windows = fetch_windows(start, today);
        if windows.is_empty() {
            info!(%start, %today, "currency rates already up to date");
            return Ok(CurrencySummary {
                fetched_from: None,
                windows: 0,
                rows_deleted,
                rows_written: 0,
            });
        }

        let mut by_day: BTreeMap<NaiveDate, DayRates> = BTreeMap::new();
        for (from, to) in &windows {
            let rates = self
                .api
                .rates_period(BASE_CURRENCY, SYMBOLS, *from, *to)
                .await
                .with_context(|| format!("failed to get currency rates {from}..{to}"))?;
            // Providers may pad a window; keep only what was asked for.
            by_day.extend(rates.into_iter().filter(|(d, _)| d >= from && d <= to));
        }

        let rows: Vec<CurrencyRate> = by_day
            .iter()
            .map(|(d, r)| to_currency_rate(*d, r))
            .collect();
        self.warehouse
            .insert_currency_rates(table, &rows)
            .await
            .context("failed to insert currency rates")?;

        info!(%start, %today, windows = windows.len(), rows = rows.len(), "currency rates stored");
        Ok(CurrencySummary {
            fetched_from: Some(start),
            windows: windows.len(),
            rows_deleted,
            rows_written: rows.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn single_short_window() {
        assert_eq!(
            fetch_windows(d("2024-03-01"), d("2024-03-10")),
            vec![(d("2024-03-01"), d("2024-03-10"))]
        );
    }

    #[test]
    fn start_equal_today_is_one_day() {
        assert_eq!(
            fetch_windows(d("2024-03-10"), d("2024-03-10")),
            vec![(d("2024-03-10"), d("2024-03-10"))]
        );
    }

    #[test]
    fn start_after_today_is_empty() {
        assert!(fetch_windows(d("2024-03-11"), d("2024-03-10")).is_empty());
    }

    #[test]
    fn windows_are_contiguous_and_bounded() {
        let start = d("2020-01-01");
        let today = d("2024-06-15");
        let w = fetch_windows(start, today);
        assert_eq!(w.first().unwrap().0, start);
        assert_eq!(w.last().unwrap().1, today);
        for (from, to) in &w {
            assert!(from <= to);
            assert!((*to - *from).num_days() < MAX_WINDOW_DAYS as i64);
        }
        for pair in w.windows(2) {
            assert_eq!(pair[0].1.succ_opt().unwrap(), pair[1].0);
        }
        // 2020 is a leap year, so the first window ends on 2020-12-30.
        assert_eq!(w[0].1, d("2020-12-30"));
    }

    #[test]
    fn rates_are_formatted_to_six_decimals() {
        let r = to_currency_rate(
            d("2024-01-02"),
            &DayRates {
                eur: 0.9123456789,
                nok: 10.5,
            },
        );
        assert_eq!(r.usdeur, "0.912346");
        assert_eq!(r.usdnok, "10.500000");
    }
}

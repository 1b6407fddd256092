//! Day-normalization: one row per line, annotated with the calendar length of
//! its billing month.

use chrono::{Datelike, Days, Months, NaiveDate};
use cost_aiven::InvoiceLine;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingPeriod {
    /// `YYYY-MM`, from the line's period begin.
    pub billing_month: String,
    /// 28..=31
    pub day_count: u32,
}

/// Billing month and its day count. The line's end timestamp is ignored.
pub fn normalize(line: &InvoiceLine) -> BillingPeriod {
    let begin = line.timestamp_begin.date_naive();
    BillingPeriod {
        billing_month: format!("{:04}-{:02}", begin.year(), begin.month()),
        day_count: days_in_month_of(begin),
    }
}

/// Number of days in `year`-`month`, `None` for an invalid month.
pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    NaiveDate::from_ymd_opt(year, month, 1).map(days_in_month_of)
}

/// Last day of the month: the day before the first of the next month.
fn days_in_month_of(date: NaiveDate) -> u32 {
    let first = date - Days::new(u64::from(date.day0()));
    match first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
    {
        Some(last) => last.day(),
        // December of the last representable year.
        None => 31,
    }
}

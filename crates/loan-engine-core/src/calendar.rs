//! Whole-month date arithmetic for callers that speak in calendar dates.
//!
//! The engine works purely in period counts. These helpers translate between
//! a target end date and a number of monthly periods, and lay payment dates
//! on the first of each month. The day of month is ignored when counting, so
//! Jan 31 → Feb 1 is one period, and Jan 1 → Jan 31 is none.

use chrono::{Datelike, Months, NaiveDate};

use crate::error::LoanEngineError;
use crate::LoanEngineResult;

/// Whole calendar months from `from` to `to` (negative if `to` is earlier).
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    let years = i64::from(to.year()) - i64::from(from.year());
    let months = i64::from(to.month()) - i64::from(from.month());
    years * 12 + months
}

/// Number of monthly payments between `from` and a target `end_date`.
pub fn period_count_until(from: NaiveDate, end_date: NaiveDate) -> LoanEngineResult<u32> {
    let months = months_between(from, end_date);
    if months <= 0 {
        return Err(LoanEngineError::invalid(
            "end_date",
            format!("End date {end_date} must be at least one calendar month after {from}"),
        ));
    }
    u32::try_from(months).map_err(|_| {
        LoanEngineError::invalid("end_date", format!("End date {end_date} is too far out"))
    })
}

/// Date of the final payment: the first of the month `periods` months after `from`.
pub fn payoff_date(from: NaiveDate, periods: u32) -> LoanEngineResult<NaiveDate> {
    first_of_month(from)?
        .checked_add_months(Months::new(periods))
        .ok_or_else(|| {
            LoanEngineError::DateError(format!("{periods} months after {from} is out of range"))
        })
}

/// Payment dates for periods 1..=periods, on the first of each following month.
pub fn payment_dates(from: NaiveDate, periods: u32) -> LoanEngineResult<Vec<NaiveDate>> {
    let start = first_of_month(from)?;
    (1..=periods)
        .map(|k| {
            start.checked_add_months(Months::new(k)).ok_or_else(|| {
                LoanEngineError::DateError(format!("{k} months after {from} is out of range"))
            })
        })
        .collect()
}

fn first_of_month(date: NaiveDate) -> LoanEngineResult<NaiveDate> {
    date.with_day(1)
        .ok_or_else(|| LoanEngineError::DateError(format!("Cannot take the first of {date}")))
}

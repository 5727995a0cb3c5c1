use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::annuity::periodic_interest;
use crate::error::LoanEngineError;
use crate::types::{round_currency, LoanTerms, Money};
use crate::LoanEngineResult;

/// One period of an amortization schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRow {
    /// 1-based period number
    pub period: u32,
    /// Amount paid this period (interest + principal)
    pub payment: Money,
    /// Interest accrued on the opening balance
    pub interest: Money,
    /// Principal retired this period
    pub principal: Money,
    /// Balance outstanding after the payment
    pub balance: Money,
}

impl ScheduleRow {
    /// Copy of the row with every amount rounded to the currency unit.
    pub fn rounded(&self) -> Self {
        Self {
            period: self.period,
            payment: round_currency(self.payment),
            interest: round_currency(self.interest),
            principal: round_currency(self.principal),
            balance: round_currency(self.balance),
        }
    }
}

/// Totals across a schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSummary {
    pub periods: u32,
    pub total_paid: Money,
    pub total_interest: Money,
    pub total_principal: Money,
    /// Last payment, which absorbs any residual balance
    pub final_payment: Money,
}

/// Full period-by-period breakdown of a loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationSchedule {
    pub rows: Vec<ScheduleRow>,
    pub summary: ScheduleSummary,
}

/// Rows reserved up front; longer schedules grow as they are built, so a
/// non-amortizing loan with a huge term fails before allocating for it.
const PREALLOCATED_ROWS: u32 = 1200;

/// Build the schedule for fully resolved loan terms.
///
/// Produces exactly `period_count` rows. The final row pays off whatever
/// balance remains, so the closing balance is exactly zero regardless of the
/// drift accumulated by a rounded payment.
pub fn build_schedule(terms: &LoanTerms) -> LoanEngineResult<AmortizationSchedule> {
    validate_terms(terms)?;

    let n = terms.period_count;
    let mut rows = Vec::with_capacity(n.min(PREALLOCATED_ROWS) as usize);
    let mut balance = terms.principal;

    for period in 1..=n {
        let interest = periodic_interest(balance, terms.periodic_rate)?;

        if period == n {
            let principal = balance;
            rows.push(ScheduleRow {
                period,
                payment: checked_total(principal, interest, "payment")?,
                interest,
                principal,
                balance: Decimal::ZERO,
            });
            break;
        }

        let principal = terms.payment - interest;
        if principal <= Decimal::ZERO {
            return Err(LoanEngineError::NonAmortizingLoan {
                period,
                interest,
                payment: terms.payment,
            });
        }
        if principal >= balance {
            return Err(LoanEngineError::invalid(
                "period_count",
                format!(
                    "Payment of {} retires the loan in period {period}, before the final period {n}",
                    terms.payment
                ),
            ));
        }

        balance -= principal;
        rows.push(ScheduleRow {
            period,
            payment: terms.payment,
            interest,
            principal,
            balance,
        });
    }

    let summary = summarize(&rows)?;
    Ok(AmortizationSchedule { rows, summary })
}

fn summarize(rows: &[ScheduleRow]) -> LoanEngineResult<ScheduleSummary> {
    let mut total_paid = Decimal::ZERO;
    let mut total_interest = Decimal::ZERO;
    let mut total_principal = Decimal::ZERO;
    for row in rows {
        total_paid = checked_total(total_paid, row.payment, "payment")?;
        total_interest = checked_total(total_interest, row.interest, "periodic_rate")?;
        total_principal += row.principal;
    }

    Ok(ScheduleSummary {
        periods: rows.len() as u32,
        total_paid,
        total_interest,
        total_principal,
        final_payment: rows.last().map(|r| r.payment).unwrap_or_default(),
    })
}

fn checked_total(a: Money, b: Money, field: &str) -> LoanEngineResult<Money> {
    a.checked_add(b).ok_or_else(|| {
        LoanEngineError::invalid(field, format!("Schedule total {a} + {b} overflows"))
    })
}

fn validate_terms(terms: &LoanTerms) -> LoanEngineResult<()> {
    if terms.principal <= Decimal::ZERO {
        return Err(LoanEngineError::invalid(
            "principal",
            "Principal must be positive",
        ));
    }
    if terms.payment <= Decimal::ZERO {
        return Err(LoanEngineError::invalid("payment", "Payment must be positive"));
    }
    if terms.periodic_rate < Decimal::ZERO {
        return Err(LoanEngineError::invalid(
            "periodic_rate",
            "Periodic rate cannot be negative",
        ));
    }
    if terms.period_count == 0 {
        return Err(LoanEngineError::invalid(
            "period_count",
            "Number of periods must be > 0",
        ));
    }
    Ok(())
}

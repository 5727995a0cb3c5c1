use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};

use crate::error::LoanEngineError;
use crate::types::{Money, Rate};
use crate::LoanEngineResult;

/// Fractional period counts are rounded to this many places before taking the
/// ceiling, so decimal noise in a payment never adds a spurious extra period.
const PERIOD_COUNT_DP: u32 = 6;

/// Result of inverting the annuity formula for the number of periods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodCount {
    /// Whole number of payments needed (the final one may be partial)
    pub periods: u32,
    /// Exact solution of the annuity formula
    pub fractional_periods: Decimal,
}

/// Level payment that fully amortizes `principal` over `period_count` periods.
///
/// payment = P * r / (1 - (1 + r)^-n), equivalently P * r * (1+r)^n / ((1+r)^n - 1).
/// Degrades to P / n at a zero rate.
///
/// Once (1 + r)^n is so large that the payment cannot be told apart from the
/// periodic interest P * r at decimal precision, no term can be recovered from
/// it, so the combination is rejected as `InvalidInput` on `period_count`.
/// Every payment returned here therefore exceeds P * r and inverts through
/// [`compute_period_count`].
pub fn compute_payment(
    principal: Money,
    periodic_rate: Rate,
    period_count: u32,
) -> LoanEngineResult<Money> {
    let payment = level_payment(principal, periodic_rate, period_count)?;
    if !periodic_rate.is_zero() && payment <= periodic_interest(principal, periodic_rate)? {
        return Err(LoanEngineError::invalid(
            "period_count",
            format!(
                "Over {period_count} periods at {periodic_rate} the payment is indistinguishable from the periodic interest"
            ),
        ));
    }
    Ok(payment)
}

/// Payment function used by the rate solver: as [`compute_payment`], but
/// returns the limit P * r once (1 + r)^n leaves the decimal range, keeping
/// the function defined over the whole search bracket.
pub(crate) fn level_payment(
    principal: Money,
    periodic_rate: Rate,
    period_count: u32,
) -> LoanEngineResult<Money> {
    validate_principal(principal)?;
    validate_rate(periodic_rate)?;
    if period_count == 0 {
        return Err(LoanEngineError::invalid(
            "period_count",
            "Number of periods must be > 0",
        ));
    }

    let n = Decimal::from(period_count);
    if periodic_rate.is_zero() {
        return Ok(principal / n);
    }

    let interest = periodic_interest(principal, periodic_rate)?;
    let denominator = match growth_factor(periodic_rate)?.checked_powu(u64::from(period_count)) {
        Some(growth) => Decimal::ONE - Decimal::ONE / growth,
        None => Decimal::ONE,
    };

    // Rate below decimal resolution: (1 + r)^n rounds to exactly 1
    if denominator.is_zero() {
        return Ok(principal / n);
    }

    quotient(interest, denominator, "principal")
}

/// Number of periods a level `payment` needs to retire `principal`.
///
/// n = -ln(1 - P * r / payment) / ln(1 + r), or P / payment at a zero rate.
/// A payment that does not exceed the first period's interest never retires
/// the loan and is rejected.
pub fn compute_period_count(
    principal: Money,
    periodic_rate: Rate,
    payment: Money,
) -> LoanEngineResult<PeriodCount> {
    validate_principal(principal)?;
    validate_rate(periodic_rate)?;
    validate_payment(payment)?;

    if periodic_rate.is_zero() {
        return whole_periods(quotient(principal, payment, "payment")?);
    }

    let interest = periodic_interest(principal, periodic_rate)?;
    if payment <= interest {
        return Err(LoanEngineError::invalid(
            "payment",
            format!(
                "Payment of {payment} does not cover periodic interest of {interest}; the loan never amortizes"
            ),
        ));
    }

    let growth_ln = growth_factor(periodic_rate)?
        .checked_ln()
        .unwrap_or(Decimal::ZERO);
    if growth_ln.is_zero() {
        return whole_periods(quotient(principal, payment, "payment")?);
    }

    // 0 < remaining < 1 given the interest check above
    let remaining = Decimal::ONE - interest / payment;
    let remaining_ln = remaining.checked_ln().ok_or_else(|| {
        LoanEngineError::invalid(
            "payment",
            format!("Cannot take the logarithm of {remaining} while solving for the term"),
        )
    })?;

    whole_periods(quotient(-remaining_ln, growth_ln, "periodic_rate")?)
}

/// Convert an annual rate (decimal) into the rate per payment period.
pub fn periodic_rate_from_annual(annual_rate: Rate, periods_per_year: u32) -> LoanEngineResult<Rate> {
    if periods_per_year == 0 {
        return Err(LoanEngineError::invalid(
            "periods_per_year",
            "Periods per year must be > 0",
        ));
    }
    if annual_rate < Decimal::ZERO {
        return Err(LoanEngineError::invalid(
            "annual_rate",
            "Annual rate cannot be negative",
        ));
    }
    Ok(annual_rate / Decimal::from(periods_per_year))
}

/// Nominal annual rate (APR) for a periodic rate.
pub fn annual_rate_from_periodic(periodic_rate: Rate, periods_per_year: u32) -> LoanEngineResult<Rate> {
    periodic_rate
        .checked_mul(Decimal::from(periods_per_year))
        .ok_or_else(|| {
            LoanEngineError::invalid(
                "periodic_rate",
                format!("Annualizing {periodic_rate} over {periods_per_year} periods overflows"),
            )
        })
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn whole_periods(exact: Decimal) -> LoanEngineResult<PeriodCount> {
    let periods = exact
        .round_dp(PERIOD_COUNT_DP)
        .ceil()
        .to_u32()
        .ok_or_else(|| {
            LoanEngineError::invalid(
                "payment",
                format!("Implied term of {exact} periods is outside the supported range"),
            )
        })?;

    Ok(PeriodCount {
        periods: periods.max(1),
        fractional_periods: exact,
    })
}

/// 1 + r, failing for rates at the top of the decimal range.
pub(crate) fn growth_factor(periodic_rate: Rate) -> LoanEngineResult<Decimal> {
    Decimal::ONE.checked_add(periodic_rate).ok_or_else(|| {
        LoanEngineError::invalid(
            "periodic_rate",
            format!("Periodic rate {periodic_rate} is out of range"),
        )
    })
}

fn quotient(numerator: Decimal, denominator: Decimal, field: &str) -> LoanEngineResult<Decimal> {
    numerator.checked_div(denominator).ok_or_else(|| {
        LoanEngineError::invalid(field, format!("{numerator} / {denominator} overflows"))
    })
}

pub(crate) fn periodic_interest(principal: Money, periodic_rate: Rate) -> LoanEngineResult<Money> {
    principal.checked_mul(periodic_rate).ok_or_else(|| {
        LoanEngineError::invalid(
            "periodic_rate",
            format!("Interest on {principal} at {periodic_rate} overflows"),
        )
    })
}

fn validate_principal(principal: Money) -> LoanEngineResult<()> {
    if principal <= Decimal::ZERO {
        return Err(LoanEngineError::invalid(
            "principal",
            "Principal must be positive",
        ));
    }
    Ok(())
}

fn validate_payment(payment: Money) -> LoanEngineResult<()> {
    if payment <= Decimal::ZERO {
        return Err(LoanEngineError::invalid("payment", "Payment must be positive"));
    }
    Ok(())
}

fn validate_rate(periodic_rate: Rate) -> LoanEngineResult<()> {
    if periodic_rate < Decimal::ZERO {
        return Err(LoanEngineError::invalid(
            "periodic_rate",
            "Periodic rate cannot be negative",
        ));
    }
    Ok(())
}

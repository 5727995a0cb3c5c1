//! Periodic interest rate implied by a principal, a level payment and a term.
//!
//! The annuity formula has no closed-form inverse in the rate, so the rate is
//! recovered numerically. The payment is strictly increasing in the rate for
//! r >= 0, which makes `f(r) = payment(r) - target` a function with a single
//! sign change: once a bracket [0, upper] is established, a Newton-Raphson
//! iteration safeguarded by bisection cannot escape it.

use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::annuity::{growth_factor, level_payment};
use crate::error::LoanEngineError;
use crate::types::{Money, Rate};
use crate::LoanEngineResult;

/// Default residual tolerance, relative to the target payment.
pub const DEFAULT_TOLERANCE: Decimal = dec!(0.000000000001);

/// Default minimum bracket width before the search stops.
pub const DEFAULT_RATE_TOLERANCE: Decimal = dec!(0.000000000000000001);

/// Residual (relative to payment) above which a collapsed bracket is reported
/// as divergence rather than convergence.
pub const DEFAULT_DIVERGENCE_THRESHOLD: Decimal = dec!(0.0001);

/// Default cap on solver iterations.
pub const DEFAULT_MAX_ITERATIONS: u32 = 200;

/// Default cap on upper-bound doublings while bracketing.
pub const DEFAULT_MAX_BRACKET_EXPANSIONS: u32 = 64;

/// Configuration for the rate solver. Fields omitted from JSON take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Convergence threshold on |f(r)|, as a fraction of the payment
    pub tolerance: Decimal,
    /// Convergence threshold on the bracket width
    pub rate_tolerance: Rate,
    /// Residual fraction above which a collapsed bracket counts as divergence
    pub divergence_threshold: Decimal,
    /// Maximum Newton/bisection iterations
    pub max_iterations: u32,
    /// First upper bound tried while bracketing the root
    pub initial_upper_bound: Rate,
    /// Maximum number of times the upper bound is doubled
    pub max_bracket_expansions: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            rate_tolerance: DEFAULT_RATE_TOLERANCE,
            divergence_threshold: DEFAULT_DIVERGENCE_THRESHOLD,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            initial_upper_bound: Decimal::ONE,
            max_bracket_expansions: DEFAULT_MAX_BRACKET_EXPANSIONS,
        }
    }
}

impl SolverConfig {
    /// Sets the residual tolerance.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: Decimal) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Sets the maximum iterations.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the bracketing start point and the number of doublings allowed.
    #[must_use]
    pub fn with_bracket(mut self, initial_upper_bound: Rate, max_expansions: u32) -> Self {
        self.initial_upper_bound = initial_upper_bound;
        self.max_bracket_expansions = max_expansions;
        self
    }

    fn validate(&self) -> LoanEngineResult<()> {
        if self.tolerance <= Decimal::ZERO || self.rate_tolerance <= Decimal::ZERO {
            return Err(LoanEngineError::invalid(
                "solver_config",
                "Tolerances must be positive",
            ));
        }
        if self.initial_upper_bound <= Decimal::ZERO {
            return Err(LoanEngineError::invalid(
                "solver_config",
                "Initial upper bound must be positive",
            ));
        }
        Ok(())
    }
}

/// How the solver terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverStatus {
    Converged,
    Diverged,
    MaxIterationsExceeded,
}

/// Solved periodic rate with termination diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverResult {
    /// Best estimate of the periodic rate
    pub periodic_rate: Rate,
    pub status: SolverStatus,
    /// Iterations used, excluding bracketing
    pub iterations: u32,
    /// payment(rate) - target payment at the returned rate
    pub residual: Money,
}

impl SolverResult {
    pub fn is_converged(&self) -> bool {
        self.status == SolverStatus::Converged
    }
}

/// Recover the periodic rate at which `payment` amortizes `principal` over
/// `period_count` periods.
///
/// A payment exactly equal to `principal / period_count` solves to a zero
/// rate. A smaller payment has no non-negative solution and is rejected.
/// Exhausting the iteration cap is not an error: the best estimate is
/// returned with [`SolverStatus::MaxIterationsExceeded`].
pub fn solve_periodic_rate(
    principal: Money,
    payment: Money,
    period_count: u32,
    config: &SolverConfig,
) -> LoanEngineResult<SolverResult> {
    validate_solver_input(principal, payment, period_count)?;
    config.validate()?;

    let n = Decimal::from(period_count);
    let tolerance = scaled_to_payment(config.tolerance, payment, "tolerance")?;
    let divergence_limit =
        scaled_to_payment(config.divergence_threshold, payment, "divergence_threshold")?;
    let objective = |rate: Rate| -> LoanEngineResult<Money> {
        Ok(level_payment(principal, rate, period_count)? - payment)
    };

    let zero_rate_residual = principal / n - payment;
    if zero_rate_residual.abs() < tolerance {
        return Ok(SolverResult {
            periodic_rate: Decimal::ZERO,
            status: SolverStatus::Converged,
            iterations: 0,
            residual: zero_rate_residual,
        });
    }
    if zero_rate_residual > Decimal::ZERO {
        return Err(LoanEngineError::invalid(
            "payment",
            format!(
                "Payment of {payment} is below the interest-free payment of {}; no non-negative rate amortizes the loan",
                principal / n
            ),
        ));
    }

    let mut lo = Decimal::ZERO;
    let mut hi = bracket_upper_bound(&objective, config)?;
    let mut rate = initial_guess(principal, payment, n)
        .filter(|guess| *guess > lo && *guess < hi)
        .unwrap_or_else(|| midpoint(lo, hi));

    for iteration in 1..=config.max_iterations {
        let residual = objective(rate)?;

        if residual.abs() < tolerance {
            debug!(%rate, iteration, %residual, "rate solver converged");
            return Ok(SolverResult {
                periodic_rate: rate,
                status: SolverStatus::Converged,
                iterations: iteration,
                residual,
            });
        }

        if residual < Decimal::ZERO {
            lo = rate;
        } else {
            hi = rate;
        }

        if hi - lo < config.rate_tolerance {
            let status = if residual.abs() <= divergence_limit {
                SolverStatus::Converged
            } else {
                SolverStatus::Diverged
            };
            debug!(%rate, iteration, %residual, ?status, "rate solver bracket collapsed");
            return Ok(SolverResult {
                periodic_rate: rate,
                status,
                iterations: iteration,
                residual,
            });
        }

        rate = newton_step(principal, rate, period_count, residual)
            .filter(|candidate| *candidate > lo && *candidate < hi)
            .unwrap_or_else(|| midpoint(lo, hi));
    }

    let residual = objective(rate)?;
    debug!(%rate, %residual, "rate solver hit iteration cap");
    Ok(SolverResult {
        periodic_rate: rate,
        status: SolverStatus::MaxIterationsExceeded,
        iterations: config.max_iterations,
        residual,
    })
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn validate_solver_input(principal: Money, payment: Money, period_count: u32) -> LoanEngineResult<()> {
    if principal <= Decimal::ZERO {
        return Err(LoanEngineError::invalid(
            "principal",
            "Principal must be positive",
        ));
    }
    if payment <= Decimal::ZERO {
        return Err(LoanEngineError::invalid("payment", "Payment must be positive"));
    }
    if period_count == 0 {
        return Err(LoanEngineError::invalid(
            "period_count",
            "Number of periods must be > 0",
        ));
    }
    Ok(())
}

/// Double the upper bound until the payment at that rate reaches the target.
fn bracket_upper_bound<F>(objective: &F, config: &SolverConfig) -> LoanEngineResult<Rate>
where
    F: Fn(Rate) -> LoanEngineResult<Money>,
{
    let mut upper = config.initial_upper_bound;
    for expansion in 0..=config.max_bracket_expansions {
        if objective(upper)? >= Decimal::ZERO {
            debug!(%upper, expansion, "rate solver bracket found");
            return Ok(upper);
        }
        if expansion == config.max_bracket_expansions {
            break;
        }
        upper = match upper.checked_mul(dec!(2)) {
            Some(doubled) => doubled,
            None => break,
        };
    }

    Err(LoanEngineError::NoBracketFound {
        upper_bound: upper,
        expansions: config.max_bracket_expansions,
    })
}

/// Relative threshold times the payment, rejecting thresholds that overflow.
fn scaled_to_payment(threshold: Decimal, payment: Money, field: &str) -> LoanEngineResult<Money> {
    threshold.checked_mul(payment).ok_or_else(|| {
        LoanEngineError::invalid(
            "solver_config",
            format!("{field} of {threshold} overflows against a payment of {payment}"),
        )
    })
}

fn midpoint(lo: Rate, hi: Rate) -> Rate {
    lo + (hi - lo) / dec!(2)
}

/// First-order estimate: total interest ≈ P * r * (n + 1) / 2.
/// None when the estimate leaves the decimal range.
fn initial_guess(principal: Money, payment: Money, n: Decimal) -> Option<Rate> {
    let total_interest = payment.checked_mul(n)?.checked_sub(principal)?;
    let scale = principal.checked_mul(n + Decimal::ONE)?;
    dec!(2).checked_mul(total_interest)?.checked_div(scale)
}

/// Newton step using the analytic derivative of the payment in the rate.
///
/// With D = 1 - (1+r)^-n, dA/dr = P/D - P * r * n * (1+r)^-(n+1) / D^2.
fn newton_step(principal: Money, rate: Rate, period_count: u32, residual: Money) -> Option<Rate> {
    let one_plus_r = growth_factor(rate).ok()?;
    let discount_n = match one_plus_r.checked_powu(u64::from(period_count)) {
        Some(growth) => Decimal::ONE / growth,
        None => Decimal::ZERO,
    };
    let denominator = Decimal::ONE - discount_n;
    if denominator <= Decimal::ZERO {
        return None;
    }

    let n = Decimal::from(period_count);
    let discount_n_plus_one = discount_n / one_plus_r;
    let level = principal.checked_div(denominator)?;
    let drag = principal
        .checked_mul(rate)?
        .checked_mul(n)?
        .checked_mul(discount_n_plus_one)?
        .checked_div(denominator.checked_mul(denominator)?)?;
    let derivative = level.checked_sub(drag)?;
    if derivative <= Decimal::ZERO {
        return None;
    }

    rate.checked_sub(residual.checked_div(derivative)?)
}

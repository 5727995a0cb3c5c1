//! Routes a calculation mode to the annuity formulas, the rate solver and the
//! schedule builder.
//!
//! Each mode has a fixed set of required inputs and, except for
//! `BuildSchedule`, one field it solves for. Requests are rejected up front
//! when a required field is absent or when the solved-for field is supplied.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::{debug, warn};

use crate::annuity::{compute_payment, compute_period_count, PeriodCount};
use crate::error::LoanEngineError;
use crate::rate_solver::{solve_periodic_rate, SolverConfig, SolverResult, SolverStatus};
use crate::schedule::{build_schedule, AmortizationSchedule};
use crate::types::{with_metadata, ComputationOutput, LoanTerms, Money, Rate};
use crate::LoanEngineResult;

/// Terms longer than this (100 years of monthly payments) are flagged.
pub const MAX_REASONABLE_PERIODS: u32 = 1200;

/// Tolerance between the scheduled payment and the final payment before a
/// warning is attached.
const FINAL_PAYMENT_TOLERANCE: Decimal = dec!(0.01);

/// Which loan variable to solve for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationMode {
    ComputePayment,
    ComputeEndDate,
    ComputeRate,
    BuildSchedule,
}

/// Named loan inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanField {
    Principal,
    PeriodicRate,
    PeriodCount,
    Payment,
}

impl LoanField {
    pub fn name(&self) -> &'static str {
        match self {
            LoanField::Principal => "principal",
            LoanField::PeriodicRate => "periodic_rate",
            LoanField::PeriodCount => "period_count",
            LoanField::Payment => "payment",
        }
    }
}

impl fmt::Display for LoanField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl CalculationMode {
    /// Inputs that must be present for this mode.
    pub fn required_fields(&self) -> &'static [LoanField] {
        use LoanField::*;
        match self {
            CalculationMode::ComputePayment => &[Principal, PeriodicRate, PeriodCount],
            CalculationMode::ComputeEndDate => &[Principal, PeriodicRate, Payment],
            CalculationMode::ComputeRate => &[Principal, Payment, PeriodCount],
            CalculationMode::BuildSchedule => &[Principal, PeriodicRate, Payment, PeriodCount],
        }
    }

    /// The field this mode produces, which must therefore not be supplied.
    pub fn solved_field(&self) -> Option<LoanField> {
        match self {
            CalculationMode::ComputePayment => Some(LoanField::Payment),
            CalculationMode::ComputeEndDate => Some(LoanField::PeriodCount),
            CalculationMode::ComputeRate => Some(LoanField::PeriodicRate),
            CalculationMode::BuildSchedule => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CalculationMode::ComputePayment => "compute_payment",
            CalculationMode::ComputeEndDate => "compute_end_date",
            CalculationMode::ComputeRate => "compute_rate",
            CalculationMode::BuildSchedule => "build_schedule",
        }
    }
}

impl fmt::Display for CalculationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Loan inputs in engine units: periodic rate, period count, currency amounts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoanInputs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub periodic_rate: Option<Rate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<Money>,
}

impl LoanInputs {
    pub fn has(&self, field: LoanField) -> bool {
        match field {
            LoanField::Principal => self.principal.is_some(),
            LoanField::PeriodicRate => self.periodic_rate.is_some(),
            LoanField::PeriodCount => self.period_count.is_some(),
            LoanField::Payment => self.payment.is_some(),
        }
    }
}

/// A mode plus its inputs, as received from JSON callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculationRequest {
    pub mode: CalculationMode,
    #[serde(default)]
    pub inputs: LoanInputs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solver: Option<SolverConfig>,
}

/// Outcome of a dispatched calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalculationResult {
    Payment { payment: Money },
    PeriodCount(PeriodCount),
    Rate(SolverResult),
    Schedule(ResolvedSchedule),
}

/// Schedule together with the terms it was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSchedule {
    pub terms: LoanTerms,
    pub schedule: AmortizationSchedule,
}

/// Run a calculation with the default solver configuration.
pub fn calculate(
    mode: CalculationMode,
    inputs: &LoanInputs,
) -> LoanEngineResult<ComputationOutput<CalculationResult>> {
    calculate_with_config(mode, inputs, &SolverConfig::default())
}

/// Run a JSON-style request.
pub fn calculate_request(
    request: &CalculationRequest,
) -> LoanEngineResult<ComputationOutput<CalculationResult>> {
    let config = request.solver.unwrap_or_default();
    calculate_with_config(request.mode, &request.inputs, &config)
}

/// Validate the inputs for `mode`, solve for the missing variable and wrap
/// the result in the standard output envelope.
pub fn calculate_with_config(
    mode: CalculationMode,
    inputs: &LoanInputs,
    config: &SolverConfig,
) -> LoanEngineResult<ComputationOutput<CalculationResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    check_fields(mode, inputs)?;
    debug!(%mode, "dispatching loan calculation");

    if let Some(periods) = inputs.period_count {
        check_term_length(periods, &mut warnings);
    }

    let (methodology, result) = match mode {
        CalculationMode::ComputePayment => {
            let payment = compute_payment(
                required(inputs.principal, LoanField::Principal, mode)?,
                required(inputs.periodic_rate, LoanField::PeriodicRate, mode)?,
                required(inputs.period_count, LoanField::PeriodCount, mode)?,
            )?;
            (
                "Level payment via closed-form annuity formula",
                CalculationResult::Payment { payment },
            )
        }
        CalculationMode::ComputeEndDate => {
            let count = compute_period_count(
                required(inputs.principal, LoanField::Principal, mode)?,
                required(inputs.periodic_rate, LoanField::PeriodicRate, mode)?,
                required(inputs.payment, LoanField::Payment, mode)?,
            )?;
            check_term_length(count.periods, &mut warnings);
            (
                "Term via inverted annuity formula (ceiling of exact periods)",
                CalculationResult::PeriodCount(count),
            )
        }
        CalculationMode::ComputeRate => {
            let solved = solve_periodic_rate(
                required(inputs.principal, LoanField::Principal, mode)?,
                required(inputs.payment, LoanField::Payment, mode)?,
                required(inputs.period_count, LoanField::PeriodCount, mode)?,
                config,
            )?;
            if solved.status != SolverStatus::Converged {
                warnings.push(format!(
                    "Rate solver stopped with status {:?} after {} iterations (residual {}); rate is approximate",
                    solved.status, solved.iterations, solved.residual
                ));
            }
            (
                "Periodic rate via Newton-Raphson with bisection fallback",
                CalculationResult::Rate(solved),
            )
        }
        CalculationMode::BuildSchedule => {
            let terms = LoanTerms {
                principal: required(inputs.principal, LoanField::Principal, mode)?,
                periodic_rate: required(inputs.periodic_rate, LoanField::PeriodicRate, mode)?,
                period_count: required(inputs.period_count, LoanField::PeriodCount, mode)?,
                payment: required(inputs.payment, LoanField::Payment, mode)?,
            };
            let schedule = build_schedule(&terms)?;
            let drift = (schedule.summary.final_payment - terms.payment).abs();
            if drift > FINAL_PAYMENT_TOLERANCE {
                warnings.push(format!(
                    "Final payment of {} differs from the scheduled payment of {} by {drift}",
                    schedule.summary.final_payment, terms.payment
                ));
            }
            (
                "Amortization schedule with final-period balance true-up",
                CalculationResult::Schedule(ResolvedSchedule { terms, schedule }),
            )
        }
    };

    for w in &warnings {
        warn!(%mode, "{w}");
    }

    let assumptions = CalculationRequest {
        mode,
        inputs: inputs.clone(),
        solver: (mode == CalculationMode::ComputeRate).then_some(*config),
    };
    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        methodology,
        &assumptions,
        warnings,
        elapsed,
        result,
    ))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn check_fields(mode: CalculationMode, inputs: &LoanInputs) -> LoanEngineResult<()> {
    let missing: Vec<String> = mode
        .required_fields()
        .iter()
        .filter(|field| !inputs.has(**field))
        .map(|field| field.name().to_string())
        .collect();
    if !missing.is_empty() {
        return Err(LoanEngineError::MissingInput {
            mode: mode.label().to_string(),
            fields: missing,
        });
    }

    if let Some(solved) = mode.solved_field() {
        if inputs.has(solved) {
            return Err(LoanEngineError::invalid(
                solved.name(),
                format!("{solved} is the value solved for in {mode} and must not be supplied"),
            ));
        }
    }
    Ok(())
}

fn required<T>(value: Option<T>, field: LoanField, mode: CalculationMode) -> LoanEngineResult<T> {
    value.ok_or_else(|| LoanEngineError::MissingInput {
        mode: mode.label().to_string(),
        fields: vec![field.name().to_string()],
    })
}

fn check_term_length(periods: u32, warnings: &mut Vec<String>) {
    if periods > MAX_REASONABLE_PERIODS {
        warnings.push(format!(
            "Term of {periods} periods exceeds {MAX_REASONABLE_PERIODS} (100 years of monthly payments)"
        ));
    }
}

use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;
use serde::Deserialize;

use loan_engine_core::rate_solver::SolverConfig;
use loan_engine_core::LoanTerms;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

#[derive(Deserialize)]
struct PaymentInput {
    principal: Decimal,
    periodic_rate: Decimal,
    period_count: u32,
}

#[derive(Deserialize)]
struct PeriodCountInput {
    principal: Decimal,
    periodic_rate: Decimal,
    payment: Decimal,
}

#[derive(Deserialize)]
struct RateInput {
    principal: Decimal,
    payment: Decimal,
    period_count: u32,
    #[serde(default)]
    solver: Option<SolverConfig>,
}

// ---------------------------------------------------------------------------
// Mode dispatch
// ---------------------------------------------------------------------------

/// `{"mode": ..., "inputs": {...}, "solver": {...}?}` in, computation envelope out.
#[napi]
pub fn calculate(request_json: String) -> NapiResult<String> {
    let request: loan_engine_core::dispatch::CalculationRequest =
        serde_json::from_str(&request_json).map_err(to_napi_error)?;
    let output =
        loan_engine_core::dispatch::calculate_request(&request).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Individual operations
// ---------------------------------------------------------------------------

#[napi]
pub fn compute_payment(input_json: String) -> NapiResult<String> {
    let input: PaymentInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let payment = loan_engine_core::annuity::compute_payment(
        input.principal,
        input.periodic_rate,
        input.period_count,
    )
    .map_err(to_napi_error)?;
    serde_json::to_string(&serde_json::json!({ "payment": payment })).map_err(to_napi_error)
}

#[napi]
pub fn compute_period_count(input_json: String) -> NapiResult<String> {
    let input: PeriodCountInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let count = loan_engine_core::annuity::compute_period_count(
        input.principal,
        input.periodic_rate,
        input.payment,
    )
    .map_err(to_napi_error)?;
    serde_json::to_string(&count).map_err(to_napi_error)
}

#[napi]
pub fn solve_rate(input_json: String) -> NapiResult<String> {
    let input: RateInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let config = input.solver.unwrap_or_default();
    let solved = loan_engine_core::rate_solver::solve_periodic_rate(
        input.principal,
        input.payment,
        input.period_count,
        &config,
    )
    .map_err(to_napi_error)?;
    serde_json::to_string(&solved).map_err(to_napi_error)
}

#[napi]
pub fn build_schedule(terms_json: String) -> NapiResult<String> {
    let terms: LoanTerms = serde_json::from_str(&terms_json).map_err(to_napi_error)?;
    let schedule =
        loan_engine_core::schedule::build_schedule(&terms).map_err(to_napi_error)?;
    serde_json::to_string(&schedule).map_err(to_napi_error)
}

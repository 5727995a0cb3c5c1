use chrono::{Local, NaiveDate};
use clap::Args;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use loan_engine_core::annuity::{annual_rate_from_periodic, periodic_rate_from_annual};
use loan_engine_core::calendar;
use loan_engine_core::dispatch::{self, CalculationMode, CalculationResult, LoanInputs};
use loan_engine_core::rate_solver::SolverStatus;
use loan_engine_core::{round_currency, ComputationOutput, Money, Rate, MONTHS_PER_YEAR};

use crate::input;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Loan term given either as a payment count or as a target end date
#[derive(Args)]
pub struct TermArgs {
    /// Number of monthly payments
    #[arg(long, conflicts_with = "end_date")]
    pub periods: Option<u32>,

    /// Month of the final payment (YYYY-MM-DD), counted in whole months from the start date
    #[arg(long)]
    pub end_date: Option<NaiveDate>,
}

/// Arguments for the monthly payment calculation
#[derive(Args)]
pub struct PaymentArgs {
    /// Loan principal
    #[arg(long, alias = "balance")]
    pub principal: Option<Decimal>,

    /// Annual interest rate as a decimal (e.g. 0.06 for 6%)
    #[arg(long)]
    pub annual_rate: Option<Decimal>,

    #[command(flatten)]
    pub term: TermArgs,

    /// Reference date for month counting (defaults to today)
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// Path to JSON file with loan inputs in periodic units (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for the payoff (end date) calculation
#[derive(Args)]
pub struct PayoffArgs {
    /// Loan principal
    #[arg(long, alias = "balance")]
    pub principal: Option<Decimal>,

    /// Annual interest rate as a decimal (e.g. 0.06 for 6%)
    #[arg(long)]
    pub annual_rate: Option<Decimal>,

    /// Monthly payment
    #[arg(long)]
    pub payment: Option<Decimal>,

    /// Reference date for month counting (defaults to today)
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// Path to JSON file with loan inputs in periodic units (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for the interest rate calculation
#[derive(Args)]
pub struct RateArgs {
    /// Loan principal
    #[arg(long, alias = "balance")]
    pub principal: Option<Decimal>,

    /// Monthly payment
    #[arg(long)]
    pub payment: Option<Decimal>,

    #[command(flatten)]
    pub term: TermArgs,

    /// Reference date for month counting (defaults to today)
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// Path to JSON file with loan inputs in periodic units (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for the amortization schedule
#[derive(Args)]
pub struct ScheduleArgs {
    /// Loan principal
    #[arg(long, alias = "balance")]
    pub principal: Option<Decimal>,

    /// Annual interest rate as a decimal (e.g. 0.06 for 6%)
    #[arg(long)]
    pub annual_rate: Option<Decimal>,

    /// Monthly payment
    #[arg(long)]
    pub payment: Option<Decimal>,

    /// Term; when omitted, the number of payments the payment needs is used
    #[command(flatten)]
    pub term: TermArgs,

    /// Reference date for month counting and payment dates (defaults to today)
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// Path to JSON file with loan inputs in periodic units (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

impl TermArgs {
    fn period_count(&self, start: NaiveDate) -> CliResult<Option<u32>> {
        match (self.periods, self.end_date) {
            (Some(periods), _) => Ok(Some(periods)),
            (None, Some(end)) => Ok(Some(calendar::period_count_until(start, end)?)),
            (None, None) => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// Result views (amounts rounded to cents for display)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct PaymentView {
    pub payment: Money,
    pub periods: u32,
    pub total_paid: Money,
    pub total_interest: Money,
    pub payoff_date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct PayoffView {
    pub periods: u32,
    pub fractional_periods: Decimal,
    pub payoff_date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct RateView {
    pub annual_rate: Rate,
    pub apr_percent: Decimal,
    pub periodic_rate: Rate,
    pub status: SolverStatus,
    pub iterations: u32,
}

#[derive(Debug, Serialize)]
pub struct DatedRow {
    pub period: u32,
    pub date: NaiveDate,
    pub payment: Money,
    pub interest: Money,
    pub principal: Money,
    pub balance: Money,
}

#[derive(Debug, Serialize)]
pub struct ScheduleView {
    pub periods: u32,
    pub payoff_date: NaiveDate,
    pub final_payment: Money,
    pub total_paid: Money,
    pub total_interest: Money,
    pub rows: Vec<DatedRow>,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

pub fn run_payment(args: PaymentArgs) -> CliResult<Value> {
    let start = start_date(args.start_date);
    let inputs = match input::read_loan_inputs(args.input.as_deref())? {
        Some(inputs) => inputs,
        None => LoanInputs {
            principal: args.principal,
            periodic_rate: periodic(args.annual_rate)?,
            period_count: args.term.period_count(start)?,
            payment: None,
        },
    };
    Ok(serde_json::to_value(payment_view(&inputs, start)?)?)
}

pub fn run_payoff(args: PayoffArgs) -> CliResult<Value> {
    let start = start_date(args.start_date);
    let inputs = match input::read_loan_inputs(args.input.as_deref())? {
        Some(inputs) => inputs,
        None => LoanInputs {
            principal: args.principal,
            periodic_rate: periodic(args.annual_rate)?,
            period_count: None,
            payment: args.payment,
        },
    };
    Ok(serde_json::to_value(payoff_view(&inputs, start)?)?)
}

pub fn run_rate(args: RateArgs) -> CliResult<Value> {
    let start = start_date(args.start_date);
    let inputs = match input::read_loan_inputs(args.input.as_deref())? {
        Some(inputs) => inputs,
        None => LoanInputs {
            principal: args.principal,
            periodic_rate: None,
            period_count: args.term.period_count(start)?,
            payment: args.payment,
        },
    };
    Ok(serde_json::to_value(rate_view(&inputs)?)?)
}

pub fn run_schedule(args: ScheduleArgs) -> CliResult<Value> {
    let start = start_date(args.start_date);
    let inputs = match input::read_loan_inputs(args.input.as_deref())? {
        Some(inputs) => inputs,
        None => LoanInputs {
            principal: args.principal,
            periodic_rate: periodic(args.annual_rate)?,
            period_count: args.term.period_count(start)?,
            payment: args.payment,
        },
    };
    Ok(serde_json::to_value(schedule_view(inputs, start)?)?)
}

// ---------------------------------------------------------------------------
// Engine calls and presentation
// ---------------------------------------------------------------------------

pub fn payment_view(
    inputs: &LoanInputs,
    start: NaiveDate,
) -> CliResult<ComputationOutput<PaymentView>> {
    let out = dispatch::calculate(CalculationMode::ComputePayment, inputs)?;
    let payment = match &out.result {
        CalculationResult::Payment { payment } => *payment,
        other => return Err(unexpected(other)),
    };

    // Validated present by the dispatcher
    let periods = inputs.period_count.unwrap_or_default();
    let principal = inputs.principal.unwrap_or_default();
    let total_paid = payment
        .checked_mul(Decimal::from(periods))
        .ok_or("Total paid overflows the decimal range")?;
    let view = PaymentView {
        payment: round_currency(payment),
        periods,
        total_paid: round_currency(total_paid),
        total_interest: round_currency(total_paid - principal),
        payoff_date: calendar::payoff_date(start, periods)?,
    };
    Ok(out.map_result(|_| view))
}

pub fn payoff_view(
    inputs: &LoanInputs,
    start: NaiveDate,
) -> CliResult<ComputationOutput<PayoffView>> {
    let out = dispatch::calculate(CalculationMode::ComputeEndDate, inputs)?;
    let count = match &out.result {
        CalculationResult::PeriodCount(count) => count.clone(),
        other => return Err(unexpected(other)),
    };

    let view = PayoffView {
        periods: count.periods,
        fractional_periods: count.fractional_periods.round_dp(4),
        payoff_date: calendar::payoff_date(start, count.periods)?,
    };
    Ok(out.map_result(|_| view))
}

pub fn rate_view(inputs: &LoanInputs) -> CliResult<ComputationOutput<RateView>> {
    let out = dispatch::calculate(CalculationMode::ComputeRate, inputs)?;
    let solved = match &out.result {
        CalculationResult::Rate(solved) => *solved,
        other => return Err(unexpected(other)),
    };

    let annual = annual_rate_from_periodic(solved.periodic_rate, MONTHS_PER_YEAR)?;
    let view = RateView {
        annual_rate: annual.round_dp(8),
        apr_percent: annual
            .checked_mul(Decimal::ONE_HUNDRED)
            .ok_or("APR overflows the decimal range")?
            .round_dp(4),
        periodic_rate: solved.periodic_rate.round_dp(10),
        status: solved.status,
        iterations: solved.iterations,
    };
    Ok(out.map_result(|_| view))
}

pub fn schedule_view(
    mut inputs: LoanInputs,
    start: NaiveDate,
) -> CliResult<ComputationOutput<ScheduleView>> {
    // No term given: run until the payment retires the loan
    let derivable = CalculationMode::ComputeEndDate
        .required_fields()
        .iter()
        .all(|field| inputs.has(*field));
    if inputs.period_count.is_none() && derivable {
        let derived = dispatch::calculate(CalculationMode::ComputeEndDate, &inputs)?;
        if let CalculationResult::PeriodCount(count) = &derived.result {
            debug!(periods = count.periods, "derived schedule term from payment");
            inputs.period_count = Some(count.periods);
        }
    }

    let out = dispatch::calculate(CalculationMode::BuildSchedule, &inputs)?;
    let resolved = match &out.result {
        CalculationResult::Schedule(resolved) => resolved,
        other => return Err(unexpected(other)),
    };

    let dates = calendar::payment_dates(start, resolved.terms.period_count)?;
    let rows = resolved
        .schedule
        .rows
        .iter()
        .zip(dates)
        .map(|(row, date)| {
            let r = row.rounded();
            DatedRow {
                period: r.period,
                date,
                payment: r.payment,
                interest: r.interest,
                principal: r.principal,
                balance: r.balance,
            }
        })
        .collect();

    let summary = &resolved.schedule.summary;
    let view = ScheduleView {
        periods: summary.periods,
        payoff_date: calendar::payoff_date(start, summary.periods)?,
        final_payment: round_currency(summary.final_payment),
        total_paid: round_currency(summary.total_paid),
        total_interest: round_currency(summary.total_interest),
        rows,
    };
    Ok(out.map_result(|_| view))
}

fn start_date(arg: Option<NaiveDate>) -> NaiveDate {
    arg.unwrap_or_else(|| Local::now().date_naive())
}

fn periodic(annual: Option<Decimal>) -> CliResult<Option<Rate>> {
    Ok(annual
        .map(|rate| periodic_rate_from_annual(rate, MONTHS_PER_YEAR))
        .transpose()?)
}

fn unexpected(result: &CalculationResult) -> Box<dyn std::error::Error> {
    format!("Unexpected calculation result: {result:?}").into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 19).unwrap()
    }

    #[test]
    fn test_payment_view_rounds_to_cents() {
        let inputs = LoanInputs {
            principal: Some(dec!(100000)),
            periodic_rate: Some(dec!(0.01)),
            period_count: Some(12),
            payment: None,
        };
        let out = payment_view(&inputs, start()).unwrap();
        assert_eq!(out.result.payment, dec!(8884.88));
        assert_eq!(out.result.total_interest, dec!(6618.55));
        assert_eq!(
            out.result.payoff_date,
            NaiveDate::from_ymd_opt(2025, 10, 1).unwrap()
        );
    }

    #[test]
    fn test_payoff_view_dates_final_payment() {
        let inputs = LoanInputs {
            principal: Some(dec!(10000)),
            periodic_rate: Some(dec!(0.005)),
            period_count: None,
            payment: Some(dec!(200)),
        };
        let out = payoff_view(&inputs, start()).unwrap();
        assert_eq!(out.result.periods, 58);
        assert_eq!(
            out.result.payoff_date,
            NaiveDate::from_ymd_opt(2029, 8, 1).unwrap()
        );
    }

    #[test]
    fn test_rate_view_reports_apr() {
        let inputs = LoanInputs {
            principal: Some(dec!(250000)),
            periodic_rate: None,
            period_count: Some(360),
            payment: Some(dec!(1342.05)),
        };
        let out = rate_view(&inputs).unwrap();
        assert_eq!(out.result.status, SolverStatus::Converged);
        assert!(
            (out.result.apr_percent - dec!(5.0)).abs() < dec!(0.001),
            "APR was {}",
            out.result.apr_percent
        );
    }

    #[test]
    fn test_schedule_view_derives_term_from_payment() {
        let inputs = LoanInputs {
            principal: Some(dec!(10000)),
            periodic_rate: Some(dec!(0.005)),
            period_count: None,
            payment: Some(dec!(200)),
        };
        let out = schedule_view(inputs, start()).unwrap();
        let view = &out.result;
        assert_eq!(view.periods, 58);
        assert_eq!(view.rows.len(), 58);
        assert_eq!(view.rows[0].date, NaiveDate::from_ymd_opt(2024, 11, 1).unwrap());
        assert_eq!(view.rows[0].interest, dec!(50.00));
        assert_eq!(view.rows.last().map(|r| r.balance), Some(Decimal::ZERO));
        assert!(view.final_payment < dec!(200));
        // Final true-up is flagged since it is well short of a full payment
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn test_schedule_view_reports_missing_fields() {
        let inputs = LoanInputs {
            principal: Some(dec!(10000)),
            ..Default::default()
        };
        let err = schedule_view(inputs, start()).unwrap_err();
        assert!(err.to_string().contains("build_schedule"));
    }
}

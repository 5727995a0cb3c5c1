use loan_engine_core::annuity::compute_payment;
use loan_engine_core::dispatch::{
    calculate, calculate_request, calculate_with_config, CalculationMode, CalculationRequest,
    CalculationResult, LoanInputs,
};
use loan_engine_core::rate_solver::{SolverConfig, SolverStatus};
use loan_engine_core::LoanEngineError;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn inputs(
    principal: Option<Decimal>,
    periodic_rate: Option<Decimal>,
    period_count: Option<u32>,
    payment: Option<Decimal>,
) -> LoanInputs {
    LoanInputs {
        principal,
        periodic_rate,
        period_count,
        payment,
    }
}

// ===========================================================================
// One test per mode
// ===========================================================================

#[test]
fn test_compute_payment_mode() {
    let out = calculate(
        CalculationMode::ComputePayment,
        &inputs(Some(dec!(100000)), Some(dec!(0.01)), Some(12), None),
    )
    .unwrap();

    match out.result {
        CalculationResult::Payment { payment } => assert_eq!(payment.round_dp(2), dec!(8884.88)),
        other => panic!("Expected Payment, got {other:?}"),
    }
    assert!(out.warnings.is_empty());
    assert!(out.methodology.contains("annuity"));
}

#[test]
fn test_compute_end_date_mode() {
    let out = calculate(
        CalculationMode::ComputeEndDate,
        &inputs(Some(dec!(10000)), Some(dec!(0.005)), None, Some(dec!(200))),
    )
    .unwrap();

    match out.result {
        CalculationResult::PeriodCount(count) => {
            assert_eq!(count.periods, 58);
            assert!((count.fractional_periods - dec!(57.68)).abs() < dec!(0.01));
        }
        other => panic!("Expected PeriodCount, got {other:?}"),
    }
}

#[test]
fn test_compute_end_date_non_amortizing() {
    let err = calculate(
        CalculationMode::ComputeEndDate,
        &inputs(Some(dec!(10000)), Some(dec!(0.02)), None, Some(dec!(150))),
    )
    .unwrap_err();
    assert!(matches!(err, LoanEngineError::InvalidInput { ref field, .. } if field == "payment"));
}

#[test]
fn test_compute_rate_mode() {
    let out = calculate(
        CalculationMode::ComputeRate,
        &inputs(Some(dec!(50000)), None, Some(12), Some(dec!(5000))),
    )
    .unwrap();

    match out.result {
        CalculationResult::Rate(solved) => {
            assert_eq!(solved.status, SolverStatus::Converged);
            let payment = compute_payment(dec!(50000), solved.periodic_rate, 12).unwrap();
            assert!((payment - dec!(5000)).abs() < dec!(0.000001));
        }
        other => panic!("Expected Rate, got {other:?}"),
    }
    assert!(out.warnings.is_empty());
}

#[test]
fn test_compute_rate_iteration_cap_is_a_warning() {
    let config = SolverConfig::default().with_max_iterations(2);
    let out = calculate_with_config(
        CalculationMode::ComputeRate,
        &inputs(Some(dec!(50000)), None, Some(12), Some(dec!(5000))),
        &config,
    )
    .unwrap();

    match out.result {
        CalculationResult::Rate(solved) => {
            assert_eq!(solved.status, SolverStatus::MaxIterationsExceeded)
        }
        other => panic!("Expected Rate, got {other:?}"),
    }
    assert_eq!(out.warnings.len(), 1);
    assert!(out.warnings[0].contains("MaxIterationsExceeded"));
}

#[test]
fn test_compute_rate_divergence_is_a_warning() {
    let config = SolverConfig {
        rate_tolerance: dec!(0.5),
        divergence_threshold: dec!(0.000000000001),
        ..SolverConfig::default()
    };
    let out = calculate_with_config(
        CalculationMode::ComputeRate,
        &inputs(Some(dec!(50000)), None, Some(12), Some(dec!(5000))),
        &config,
    )
    .unwrap();

    match out.result {
        CalculationResult::Rate(solved) => assert_eq!(solved.status, SolverStatus::Diverged),
        other => panic!("Expected Rate, got {other:?}"),
    }
    assert_eq!(out.warnings.len(), 1);
    assert!(out.warnings[0].contains("Diverged"));
    assert!(out.warnings[0].contains("approximate"));
}

#[test]
fn test_build_schedule_mode() {
    let payment = compute_payment(dec!(100000), dec!(0.01), 12).unwrap();
    let out = calculate(
        CalculationMode::BuildSchedule,
        &inputs(Some(dec!(100000)), Some(dec!(0.01)), Some(12), Some(payment)),
    )
    .unwrap();

    match out.result {
        CalculationResult::Schedule(resolved) => {
            assert_eq!(resolved.terms.period_count, 12);
            assert_eq!(resolved.schedule.rows.len(), 12);
            assert_eq!(resolved.schedule.rows[11].balance, Decimal::ZERO);
        }
        other => panic!("Expected Schedule, got {other:?}"),
    }
    assert!(out.warnings.is_empty());
}

#[test]
fn test_build_schedule_short_term_warns_on_final_payment() {
    // 12 payments of 8000 leave a large final true-up
    let out = calculate(
        CalculationMode::BuildSchedule,
        &inputs(Some(dec!(100000)), Some(dec!(0.01)), Some(12), Some(dec!(8000))),
    )
    .unwrap();
    assert_eq!(out.warnings.len(), 1);
    assert!(out.warnings[0].contains("Final payment"));
}

// ===========================================================================
// Validation
// ===========================================================================

#[test]
fn test_missing_input_names_fields() {
    let err = calculate(
        CalculationMode::ComputeRate,
        &inputs(Some(dec!(50000)), None, None, None),
    )
    .unwrap_err();

    match err {
        LoanEngineError::MissingInput { mode, fields } => {
            assert_eq!(mode, "compute_rate");
            assert_eq!(fields, vec!["payment".to_string(), "period_count".to_string()]);
        }
        e => panic!("Expected MissingInput, got {e:?}"),
    }
}

#[test]
fn test_over_determined_request_rejected() {
    let err = calculate(
        CalculationMode::ComputeRate,
        &inputs(Some(dec!(50000)), Some(dec!(0.01)), Some(12), Some(dec!(5000))),
    )
    .unwrap_err();
    assert!(matches!(err, LoanEngineError::InvalidInput { ref field, .. } if field == "periodic_rate"));
}

// ===========================================================================
// JSON requests
// ===========================================================================

#[test]
fn test_json_request_round_trip() {
    let request: CalculationRequest = serde_json::from_str(
        r#"{"mode":"compute_rate","inputs":{"principal":"50000","payment":"5000","period_count":12}}"#,
    )
    .unwrap();
    assert_eq!(request.mode, CalculationMode::ComputeRate);
    assert!(request.solver.is_none());

    let out = calculate_request(&request).unwrap();
    let json = serde_json::to_value(&out).unwrap();

    assert_eq!(json["result"]["kind"], "rate");
    assert_eq!(json["result"]["status"], "converged");
    assert_eq!(json["assumptions"]["mode"], "compute_rate");
    assert_eq!(json["metadata"]["precision"], "rust_decimal_128bit");
}

#[test]
fn test_json_schedule_result_shape() {
    let request = CalculationRequest {
        mode: CalculationMode::BuildSchedule,
        inputs: inputs(Some(dec!(1200)), Some(Decimal::ZERO), Some(12), Some(dec!(100))),
        solver: None,
    };
    let out = calculate_request(&request).unwrap();
    let json = serde_json::to_value(&out).unwrap();

    assert_eq!(json["result"]["kind"], "schedule");
    assert_eq!(json["result"]["schedule"]["rows"].as_array().unwrap().len(), 12);
    assert_eq!(json["result"]["schedule"]["summary"]["periods"], 12);
    assert!(json["assumptions"].get("solver").is_none());
}

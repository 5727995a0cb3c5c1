use loan_engine_core::annuity::{compute_payment, compute_period_count};
use loan_engine_core::rate_solver::{solve_periodic_rate, SolverConfig, SolverStatus};
use loan_engine_core::LoanEngineError;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ===========================================================================
// Closed-form annuity
// ===========================================================================

#[test]
fn test_payment_known_scenario() {
    let payment = compute_payment(dec!(100000), dec!(0.01), 12).unwrap();
    assert_eq!(payment.round_dp(2), dec!(8884.88));
}

#[test]
fn test_period_count_boundary_payment_equals_interest() {
    // 200000 at 0.5% a month accrues exactly 1000 of interest
    match compute_period_count(dec!(200000), dec!(0.005), dec!(1000)).unwrap_err() {
        LoanEngineError::InvalidInput { field, .. } => assert_eq!(field, "payment"),
        e => panic!("Expected InvalidInput, got {e:?}"),
    }
}

#[test]
fn test_period_count_mortgage_term() {
    // 1342.05 is rounded down from 1342.054, leaving a sliver of a 361st payment
    let count = compute_period_count(dec!(250000), dec!(0.05) / dec!(12), dec!(1342.05)).unwrap();
    assert_eq!(count.periods, 361);
    assert!(count.fractional_periods > dec!(360) && count.fractional_periods < dec!(360.01));

    let exact = compute_payment(dec!(250000), dec!(0.05) / dec!(12), 360).unwrap();
    let count = compute_period_count(dec!(250000), dec!(0.05) / dec!(12), exact).unwrap();
    assert_eq!(count.periods, 360);
}

// ===========================================================================
// Rate solver
// ===========================================================================

#[test]
fn test_solver_concrete_scenario() {
    let result =
        solve_periodic_rate(dec!(50000), dec!(5000), 12, &SolverConfig::default()).unwrap();
    assert_eq!(result.status, SolverStatus::Converged);
    let payment = compute_payment(dec!(50000), result.periodic_rate, 12).unwrap();
    assert!(
        (payment - dec!(5000)).abs() < dec!(0.000001),
        "payment at solved rate was {payment}"
    );
}

#[test]
fn test_solver_zero_rate_scenario() {
    let result =
        solve_periodic_rate(dec!(1200), dec!(100), 12, &SolverConfig::default()).unwrap();
    assert_eq!(result.status, SolverStatus::Converged);
    assert!(result.periodic_rate.abs() < dec!(0.000000001));
}

// ===========================================================================
// Laws
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_period_count_round_trips_payment(
        principal in 1_000u32..2_000_000,
        rate_bp in 0i64..300,
        n in 1u32..480,
    ) {
        let principal = Decimal::from(principal);
        let rate = Decimal::new(rate_bp, 4);
        let payment = compute_payment(principal, rate, n).unwrap();
        let count = compute_period_count(principal, rate, payment).unwrap();
        prop_assert!(
            count.periods.abs_diff(n) <= 1,
            "n = {}, recovered {} ({})", n, count.periods, count.fractional_periods
        );
    }

    #[test]
    fn prop_solved_rate_reproduces_payment(
        principal in 1_000u32..1_000_000,
        n in 1u32..360,
        premium_permille in 1u32..2_000,
    ) {
        let principal = Decimal::from(principal);
        let n_dec = Decimal::from(n);
        let payment = principal / n_dec * (Decimal::ONE + Decimal::new(i64::from(premium_permille), 3));
        let result = solve_periodic_rate(principal, payment, n, &SolverConfig::default()).unwrap();
        prop_assert_eq!(result.status, SolverStatus::Converged);
        prop_assert!(result.periodic_rate > Decimal::ZERO);
        let recomputed = compute_payment(principal, result.periodic_rate, n).unwrap();
        prop_assert!(
            (recomputed - payment).abs() <= payment * dec!(0.000000001),
            "payment {} recomputed as {}", payment, recomputed
        );
    }
}

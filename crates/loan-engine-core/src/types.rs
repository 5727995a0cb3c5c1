use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.005 = 0.5% per period). Never as percentages.
pub type Rate = Decimal;

/// Payment periods in a year for the monthly-compounding model.
pub const MONTHS_PER_YEAR: u32 = 12;

/// Decimal places of the smallest currency unit.
pub const CURRENCY_DP: u32 = 2;

/// Fully resolved terms of a fixed-rate amortizing loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanTerms {
    /// Amount borrowed
    pub principal: Money,
    /// Interest rate per payment period (monthly)
    pub periodic_rate: Rate,
    /// Number of payment periods
    pub period_count: u32,
    /// Fixed payment per period
    pub payment: Money,
}

/// Round a currency amount to the smallest currency unit.
///
/// Only applied at presentation boundaries; the engine itself carries full
/// precision between periods.
pub fn round_currency(amount: Money) -> Money {
    amount.round_dp_with_strategy(CURRENCY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

impl<T: Serialize> ComputationOutput<T> {
    /// Replace the result, keeping methodology, assumptions, warnings and metadata.
    pub fn map_result<U: Serialize>(self, f: impl FnOnce(T) -> U) -> ComputationOutput<U> {
        ComputationOutput {
            result: f(self.result),
            methodology: self.methodology,
            assumptions: self.assumptions,
            warnings: self.warnings,
            metadata: self.metadata,
        }
    }
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_currency_midpoint_away_from_zero() {
        assert_eq!(round_currency(dec!(8884.875)), dec!(8884.88));
        assert_eq!(round_currency(dec!(0.005)), dec!(0.01));
        assert_eq!(round_currency(dec!(12.344999)), dec!(12.34));
    }

    #[test]
    fn test_with_metadata_echoes_assumptions() {
        let terms = LoanTerms {
            principal: dec!(1000),
            periodic_rate: dec!(0.01),
            period_count: 10,
            payment: dec!(105.58),
        };
        let out = with_metadata("test", &terms, vec!["w".into()], 7, dec!(1));
        assert_eq!(out.methodology, "test");
        assert_eq!(out.warnings, vec!["w".to_string()]);
        assert_eq!(out.metadata.computation_time_us, 7);
        assert_eq!(out.metadata.precision, "rust_decimal_128bit");
        assert_eq!(out.assumptions["period_count"], serde_json::json!(10));
    }
}

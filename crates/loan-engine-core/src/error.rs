use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoanEngineError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Non-amortizing loan: payment of {payment} does not reduce the balance in period {period} (interest due {interest})")]
    NonAmortizingLoan {
        period: u32,
        interest: Decimal,
        payment: Decimal,
    },

    #[error("No bracket found: payment function still below target at rate {upper_bound} after {expansions} expansions")]
    NoBracketFound { upper_bound: Decimal, expansions: u32 },

    #[error("Missing input for {mode}: {}", fields.join(", "))]
    MissingInput { mode: String, fields: Vec<String> },

    #[error("Date error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl LoanEngineError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        LoanEngineError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for LoanEngineError {
    fn from(e: serde_json::Error) -> Self {
        LoanEngineError::SerializationError(e.to_string())
    }
}

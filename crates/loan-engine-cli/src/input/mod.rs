use loan_engine_core::dispatch::LoanInputs;
use serde_json::Value;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Loan inputs from `--input <file.json>` if given, else from piped stdin.
///
/// Returns None when neither source is available, in which case the command
/// falls back to its individual flags.
pub fn read_loan_inputs(path: Option<&str>) -> Result<Option<LoanInputs>, Box<dyn std::error::Error>> {
    let value = match path {
        Some(p) => Some(read_json_file(p)?),
        None => read_stdin()?,
    };
    match value {
        Some(v) => Ok(Some(serde_json::from_value(v)?)),
        None => Ok(None),
    }
}

fn read_json_file(path: &str) -> Result<Value, Box<dyn std::error::Error>> {
    let canonical = resolve_path(path)?;
    let contents = fs::read_to_string(&canonical)
        .map_err(|e| format!("Failed to read '{}': {}", canonical.display(), e))?;
    let value: Value = serde_json::from_str(&contents)
        .map_err(|e| format!("Failed to parse '{}': {}", canonical.display(), e))?;
    Ok(value)
}

/// JSON from stdin if data is being piped; None for an interactive TTY.
fn read_stdin() -> Result<Option<Value>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;

    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(trimmed)?;
    Ok(Some(value))
}

fn resolve_path(path: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let p = Path::new(path);
    let canonical = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()?.join(p)
    };

    if !canonical.is_file() {
        return Err(format!("File not found: {}", canonical.display()).into());
    }

    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reads_inputs_file() {
        let path = std::env::temp_dir().join(format!("loancalc-inputs-{}.json", std::process::id()));
        fs::write(&path, r#"{"principal": "1200", "periodic_rate": "0", "period_count": 12}"#).unwrap();

        let inputs = read_loan_inputs(path.to_str()).unwrap().unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(inputs.principal, Some(dec!(1200)));
        assert_eq!(inputs.period_count, Some(12));
        assert!(inputs.payment.is_none());
    }

    #[test]
    fn test_missing_file_reported() {
        let err = read_loan_inputs(Some("/definitely/not/here.json")).unwrap_err();
        assert!(err.to_string().contains("File not found"));
    }
}

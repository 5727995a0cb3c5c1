use serde_json::Value;

/// Key answer of each loan command, in order of priority.
const PRIORITY_KEYS: [&str; 5] = [
    "payment",
    "payoff_date",
    "annual_rate",
    "periods",
    "total_interest",
];

/// Print just the key answer value from the output.
///
/// Schedules have a payment in every row but none at the top level, so they
/// resolve to their payoff date.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    match pick_minimal(result_obj) {
        Some((None, val)) => println!("{}", format_minimal(val)),
        Some((Some(key), val)) => println!("{}: {}", key, format_minimal(val)),
        None => println!("{}", format_minimal(result_obj)),
    }
}

/// The value to show, labelled with its key when no priority key matched.
fn pick_minimal(result: &Value) -> Option<(Option<&str>, &Value)> {
    let map = result.as_object()?;
    for key in PRIORITY_KEYS {
        if let Some(val) = map.get(key).filter(|v| !v.is_null()) {
            return Some((None, val));
        }
    }
    map.iter().next().map(|(k, v)| (Some(k.as_str()), v))
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payment_wins_over_periods() {
        let result = json!({"periods": 12, "payment": "8884.88", "payoff_date": "2025-10-01"});
        let (key, val) = pick_minimal(&result).unwrap();
        assert!(key.is_none());
        assert_eq!(format_minimal(val), "8884.88");
    }

    #[test]
    fn test_schedule_resolves_to_payoff_date() {
        let result = json!({"periods": 58, "payoff_date": "2029-08-01", "rows": []});
        let (_, val) = pick_minimal(&result).unwrap();
        assert_eq!(format_minimal(val), "2029-08-01");
    }

    #[test]
    fn test_unknown_result_falls_back_to_first_field() {
        let result = json!({"status": "converged"});
        let (key, val) = pick_minimal(&result).unwrap();
        assert_eq!(key, Some("status"));
        assert_eq!(format_minimal(val), "converged");
    }
}

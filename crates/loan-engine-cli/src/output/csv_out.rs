use serde_json::Value;
use std::io;

use super::row_headers;

/// Write output as CSV to stdout.
///
/// A result carrying schedule rows is written as one record per row;
/// anything else as two-column field/value pairs.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    match value {
        Value::Object(map) => match map.get("result") {
            Some(Value::Object(result)) => {
                if let Some(Value::Array(rows)) = result.get("rows") {
                    write_array_csv(&mut wtr, rows);
                } else {
                    let _ = wtr.write_record(["field", "value"]);
                    for (key, val) in result {
                        let _ = wtr.write_record([key.as_str(), &format_csv_value(val)]);
                    }
                }
            }
            _ => {
                let _ = wtr.write_record(["field", "value"]);
                for (key, val) in map {
                    let _ = wtr.write_record([key.as_str(), &format_csv_value(val)]);
                }
            }
        },
        Value::Array(arr) => {
            write_array_csv(&mut wtr, arr);
        }
        _ => {
            let _ = wtr.write_record([&format_csv_value(value)]);
        }
    }

    let _ = wtr.flush();
}

fn write_array_csv<W: io::Write>(wtr: &mut csv::Writer<W>, arr: &[Value]) {
    if arr.is_empty() {
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers = row_headers(first);
        let _ = wtr.write_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(h.as_str()).map(format_csv_value).unwrap_or_default())
                    .collect();
                let _ = wtr.write_record(&row);
            }
        }
    } else {
        for item in arr {
            let _ = wtr.write_record([&format_csv_value(item)]);
        }
    }
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schedule_rows_written_in_column_order() {
        let rows = json!([
            {"balance": "92115.12", "date": "2024-11-01", "interest": "1000.00",
             "payment": "8884.88", "period": 1, "principal": "7884.88"}
        ]);
        let mut wtr = csv::Writer::from_writer(Vec::new());
        write_array_csv(&mut wtr, rows.as_array().unwrap());
        let out = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
        assert_eq!(
            out,
            "period,date,payment,interest,principal,balance\n\
             1,2024-11-01,8884.88,1000.00,7884.88,92115.12\n"
        );
    }
}

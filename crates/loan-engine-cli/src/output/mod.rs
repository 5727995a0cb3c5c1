pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::Value;

/// Column order for schedule rows; JSON objects do not keep insertion order.
pub(crate) const ROW_COLUMNS: [&str; 6] =
    ["period", "date", "payment", "interest", "principal", "balance"];

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// Headers for an array of row objects: known schedule columns first, then
/// any remaining keys of the first row.
pub(crate) fn row_headers(first: &serde_json::Map<String, Value>) -> Vec<String> {
    let mut headers: Vec<String> = ROW_COLUMNS
        .iter()
        .filter(|c| first.contains_key(**c))
        .map(|c| c.to_string())
        .collect();
    headers.extend(
        first
            .keys()
            .filter(|k| !ROW_COLUMNS.contains(&k.as_str()))
            .cloned(),
    );
    headers
}

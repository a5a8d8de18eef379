//! Agent output inspection.
//!
//! Headless and dispatched runs capture the agent's stream-json output:
//! newline-delimited JSON records, the last `"type": "result"` record
//! carrying the final answer.

use std::path::Path;

use serde_json::Value;

use crate::error::Result;

/// Parses newline-delimited JSON, skipping blank and malformed lines.
pub fn parse_ndjson(content: &str) -> Vec<Value> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect()
}

/// Finds the last result record, falling back to the last record of any
/// type when the stream carries none.
pub fn find_result(records: &[Value]) -> Option<&Value> {
    records
        .iter()
        .rev()
        .find(|record| record.get("type").and_then(Value::as_str) == Some("result"))
        .or_else(|| records.last())
}

/// Extracts the result text from a record: the `result` field, then
/// `message`, then a placeholder.
pub fn extract_result(record: &Value) -> String {
    record
        .get("result")
        .and_then(Value::as_str)
        .or_else(|| record.get("message").and_then(Value::as_str))
        .unwrap_or("No result found")
        .to_string()
}

/// Reads an output file and produces the final result text, when the
/// file exists and holds at least one JSON record.
pub fn read_result_file(path: &Path) -> Result<Option<String>> {
    if !path.is_file() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)?;
    let records = parse_ndjson(&content);
    Ok(find_result(&records).map(extract_result))
}

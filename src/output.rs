//! Output formatting for query results.
//!
//! Provides text and JSON renderings of a `QueryResult`.

use crate::db::{QueryResult, Value};
use serde::Serialize;

/// Output format for printed results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Aligned table with a summary line.
    #[default]
    Text,
    /// JSON object with columns, rows and metadata.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {s}. Expected: text or json")),
        }
    }
}

/// JSON output structure.
#[derive(Debug, Serialize)]
struct JsonOutput<'a> {
    columns: Vec<&'a str>,
    rows: Vec<Vec<serde_json::Value>>,
    row_count: usize,
    execution_time_ms: u64,
}

/// Renders a result in the given format.
pub fn render(result: &QueryResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => render_text(result),
        OutputFormat::Json => render_json(result),
    }
}

fn render_text(result: &QueryResult) -> String {
    let summary = format!(
        "{} {} in {}ms\n",
        result.row_count,
        if result.row_count == 1 { "row" } else { "rows" },
        result.execution_time.as_millis()
    );

    if result.columns.is_empty() {
        return summary;
    }

    let headers: Vec<String> = result.columns.iter().map(|c| c.name.clone()).collect();
    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(Value::to_display_string).collect())
        .collect();

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            cells
                .iter()
                .filter_map(|row| row.get(i))
                .map(|cell| cell.chars().count())
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let format_line = |values: &[String]| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(value, width)| format!("{value:<width$}"))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let separator = widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>()
        .join("-+-");

    let mut out = String::new();
    out.push_str(&format_line(&headers));
    out.push('\n');
    out.push_str(&separator);
    out.push('\n');
    for row in &cells {
        out.push_str(&format_line(row));
        out.push('\n');
    }
    out.push_str(&summary);
    out
}

fn render_json(result: &QueryResult) -> String {
    let json_output = JsonOutput {
        columns: result.columns.iter().map(|c| c.name.as_str()).collect(),
        rows: result
            .rows
            .iter()
            .map(|row| row.iter().map(json_value).collect())
            .collect(),
        row_count: result.row_count,
        execution_time_ms: result.execution_time.as_millis() as u64,
    };

    serde_json::to_string_pretty(&json_output)
        .unwrap_or_else(|e| format!("{{\"error\": \"Failed to serialize: {}\"}}", e))
}

fn json_value(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::from(*i),
        Value::Float(f) => serde_json::Value::from(*f),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Bytes(_) => serde_json::Value::String(value.to_display_string()),
    }
}

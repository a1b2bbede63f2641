//! Output formatting for human and JSON modes.

use serde_json::{json, Value};
use veclayer::{Error, GetResult, SearchResult};

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Aligned text
    Human,
    /// One JSON document per command
    Json,
}

/// Everything a command can print.
#[derive(Debug)]
pub enum CliOutput {
    /// Nothing to report
    Ok,
    /// Read of a collection that does not exist
    Missing,
    /// Yes/no answer
    Bool(bool),
    /// Collection or backend names
    Names(Vec<String>),
    /// Stored items
    Items(GetResult),
    /// Ranked hits
    Hits(SearchResult),
}

/// Render an output.
pub fn format_output(output: &CliOutput, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => to_json(output).to_string(),
        OutputMode::Human => to_human(output),
    }
}

/// Render an error.
pub fn format_error(err: &Error, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => json!({"error": err.to_string()}).to_string(),
        OutputMode::Human => format!("(error) {}", err),
    }
}

fn to_json(output: &CliOutput) -> Value {
    match output {
        CliOutput::Ok => json!("OK"),
        CliOutput::Missing => Value::Null,
        CliOutput::Bool(b) => json!(b),
        CliOutput::Names(names) => json!(names),
        CliOutput::Items(result) => serde_json::to_value(result).unwrap_or(Value::Null),
        CliOutput::Hits(result) => serde_json::to_value(result).unwrap_or(Value::Null),
    }
}

fn to_human(output: &CliOutput) -> String {
    match output {
        CliOutput::Ok => "OK".to_string(),
        CliOutput::Missing => "(nil)".to_string(),
        CliOutput::Bool(b) => (if *b { "(true)" } else { "(false)" }).to_string(),
        CliOutput::Names(names) if names.is_empty() => "(empty)".to_string(),
        CliOutput::Names(names) => names
            .iter()
            .enumerate()
            .map(|(i, name)| format!("{}) {}", i + 1, name))
            .collect::<Vec<_>>()
            .join("\n"),
        CliOutput::Items(result) if result.is_empty() => "(empty)".to_string(),
        CliOutput::Items(result) => result
            .iter()
            .map(|(id, text, metadata)| {
                format!("{}\t{}\t{}", id, text, Value::Object(metadata.clone()))
            })
            .collect::<Vec<_>>()
            .join("\n"),
        CliOutput::Hits(result) => {
            let mut lines = Vec::new();
            for row in 0..result.rows() {
                if result.rows() > 1 {
                    lines.push(format!("query {}:", row + 1));
                }
                let hits: Vec<String> = result
                    .hits(row)
                    .enumerate()
                    .map(|(rank, hit)| {
                        format!(
                            "{}) {} ({:.4})\t{}",
                            rank + 1,
                            hit.id,
                            hit.distance,
                            hit.document
                        )
                    })
                    .collect();
                if hits.is_empty() {
                    lines.push("(empty)".to_string());
                } else {
                    lines.extend(hits);
                }
            }
            lines.join("\n")
        }
    }
}

//! Output formatters for query results.

use clap::ValueEnum;
use comfy_table::{Cell, Table};
use routescope_proto::{CompiledQuery, QueryResult};

use crate::commands::Explanation;

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Trait for formatting output.
pub trait Formatter: Send + Sync {
    /// Format an execution result.
    fn format_result(&self, result: &QueryResult) -> String;

    /// Format a compiled query.
    fn format_compiled(&self, compiled: &CompiledQuery) -> String;

    /// Format a query plan.
    fn format_explanation(&self, explanation: &Explanation) -> String;

    /// Format an error message.
    fn format_error(&self, error: &str) -> String;
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Table => Box::new(TableFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Csv => Box::new(CsvFormatter),
    }
}

fn explanation_rows(e: &Explanation) -> [(&'static str, String); 6] {
    [
        ("description", e.description.clone()),
        ("hash", e.hash.clone()),
        ("tier", e.tier.clone()),
        ("predicate", e.predicate.clone()),
        ("statement", e.statement.clone()),
        ("post_filter", e.post_filter.to_string()),
    ]
}

fn compiled_rows(c: &CompiledQuery) -> Vec<(String, String)> {
    let mut rows = vec![
        ("version".to_string(), c.version.clone()),
        ("find".to_string(), c.find.as_str().to_string()),
        ("hash".to_string(), c.hash.clone()),
    ];
    if let Some(main) = c.main_clause() {
        rows.push((
            "main".to_string(),
            format!("{} {} ({}m)", main.relation.as_str(), main.target.as_str(), main.distance),
        ));
    }
    for (i, s) in c.supplemental().enumerate() {
        rows.push((
            format!("block {}", i + 1),
            format!("{} {}", s.block_type, s.clause.operator()),
        ));
    }
    rows
}

/// Table formatter using comfy-table.
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn format_result(&self, result: &QueryResult) -> String {
        if let Some(message) = result.message() {
            return self.format_error(&message);
        }
        let mut table = Table::new();
        table.set_header(vec!["service_id"]);
        for id in result.ids() {
            table.add_row(vec![Cell::new(id)]);
        }
        format!("{}\n{} match(es)", table, result.ids().len())
    }

    fn format_compiled(&self, compiled: &CompiledQuery) -> String {
        let mut table = Table::new();
        table.set_header(vec!["field", "value"]);
        for (k, v) in compiled_rows(compiled) {
            table.add_row(vec![k, v]);
        }
        table.to_string()
    }

    fn format_explanation(&self, explanation: &Explanation) -> String {
        let mut table = Table::new();
        table.set_header(vec!["field", "value"]);
        for (k, v) in explanation_rows(explanation) {
            table.add_row(vec![Cell::new(k), Cell::new(v)]);
        }
        table.to_string()
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}", error)
    }
}

/// JSON formatter.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_result(&self, result: &QueryResult) -> String {
        serde_json::to_string_pretty(result).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_compiled(&self, compiled: &CompiledQuery) -> String {
        serde_json::to_string_pretty(compiled).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_explanation(&self, explanation: &Explanation) -> String {
        serde_json::to_string_pretty(explanation).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({
            "success": false,
            "error": error
        })
        .to_string()
    }
}

/// CSV formatter.
pub struct CsvFormatter;

impl Formatter for CsvFormatter {
    fn format_result(&self, result: &QueryResult) -> String {
        if let Some(message) = result.message() {
            return self.format_error(&message);
        }
        let mut output = String::from("service_id\n");
        for id in result.ids() {
            output.push_str(&format!("\"{}\"\n", escape_csv(id)));
        }
        output
    }

    fn format_compiled(&self, compiled: &CompiledQuery) -> String {
        let mut output = String::from("field,value\n");
        for (k, v) in compiled_rows(compiled) {
            output.push_str(&format!("{},\"{}\"\n", k, escape_csv(&v)));
        }
        output
    }

    fn format_explanation(&self, explanation: &Explanation) -> String {
        let mut output = String::from("field,value\n");
        for (k, v) in explanation_rows(explanation) {
            output.push_str(&format!("{},\"{}\"\n", k, escape_csv(&v)));
        }
        output
    }

    fn format_error(&self, error: &str) -> String {
        format!("error\n\"{}\"", escape_csv(error))
    }
}

/// Escape a string for CSV.
fn escape_csv(s: &str) -> String {
    s.replace('"', "\"\"")
}

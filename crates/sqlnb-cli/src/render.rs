//! Terminal rendering of cell results

use std::fmt::Write;

use comfy_table::{Table, presets::UTF8_FULL};
use sqlnb_core::QueryResult;
use sqlnb_query::{BatchExecutionResult, BatchResult, StatementStatus};

/// Render every statement result of a cell, followed by a summary line
pub fn render_batch(batch: &BatchExecutionResult) -> String {
    let mut out = String::new();
    for result in &batch.results {
        render_statement(&mut out, result);
        out.push('\n');
    }

    let _ = write!(
        out,
        "{} statement(s): {} succeeded, {} failed, {} skipped ({} ms)",
        batch.statement_count(),
        batch.success_count,
        batch.failure_count,
        batch.skipped_count,
        batch.total_execution_time.as_millis()
    );
    out
}

fn render_statement(out: &mut String, result: &BatchResult) {
    let _ = writeln!(out, "[{}] {}", result.index + 1, headline(&result.sql));

    for notice in &result.notices {
        let _ = writeln!(out, "{}", notice);
    }

    match result.status {
        StatementStatus::Success => match &result.query_result {
            Some(query_result) if query_result.has_columns() => {
                let _ = writeln!(out, "{}", render_rows(query_result));
                let _ = writeln!(out, "({} rows)", query_result.row_count());
            }
            _ => {
                let _ = writeln!(out, "OK, {} row(s) affected", result.affected_rows());
            }
        },
        StatementStatus::Failed => {
            if let Some(error) = &result.error {
                let _ = writeln!(out, "ERROR: {}", error);
            }
        }
        StatementStatus::Skipped => {
            let _ = writeln!(out, "skipped");
        }
    }
}

/// Build a table for a row set
pub fn render_rows(result: &QueryResult) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(result.columns.iter().map(|c| c.name.as_str()));
    for row in &result.rows {
        table.add_row(row.values.iter().map(|v| v.to_string()));
    }
    table
}

/// First line of a statement, shortened for display
fn headline(sql: &str) -> String {
    const MAX: usize = 80;
    let line = sql
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with("--"))
        .unwrap_or_else(|| sql.trim());
    if line.chars().count() > MAX {
        let short: String = line.chars().take(MAX).collect();
        format!("{short}...")
    } else {
        line.to_string()
    }
}

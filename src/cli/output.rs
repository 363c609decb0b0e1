//! CLI output formatting utilities.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Map, Value};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a SQL statement.
    pub fn sql(sql: &str) {
        for line in sql.lines() {
            println!("  {}", style(line).cyan());
        }
    }

    /// Print query rows as an aligned table.
    pub fn rows(rows: &[Map<String, Value>]) {
        if rows.is_empty() {
            println!("  {}", style("(no rows)").dim());
            return;
        }
        let (header, body) = format_table(rows, 40);
        println!("  {}", style(header).bold());
        for line in body {
            println!("  {}", line);
        }
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Lay out rows as a header line and body lines, truncating wide cells.
fn format_table(rows: &[Map<String, Value>], max_width: usize) -> (String, Vec<String>) {
    let columns: Vec<&String> = rows[0].keys().collect();

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|c| truncate(&display_value(row.get(*c)), max_width))
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            cells
                .iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(c.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let pad = |values: Vec<&str>| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:<width$}", v, width = *w))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let header = pad(columns.iter().map(|c| c.as_str()).collect());
    let body = cells
        .iter()
        .map(|r| pad(r.iter().map(String::as_str).collect()))
        .collect();
    (header, body)
}

fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "NULL".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Truncate to `max_len` characters with an ellipsis.
pub fn truncate(s: &str, max_len: usize) -> String {
    let s = s.replace('\n', " ");
    if s.chars().count() <= max_len {
        s
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_table_aligns_columns() {
        let rows: Vec<Map<String, Value>> = vec![
            json!({"city": "Oslo", "units": 12}).as_object().unwrap().clone(),
            json!({"city": "Bergen", "units": null}).as_object().unwrap().clone(),
        ];
        let (header, body) = format_table(&rows, 40);
        assert_eq!(header, "city   | units");
        assert_eq!(body, vec!["Oslo   | 12", "Bergen | NULL"]);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a longer line of text", 10), "a longe...");
        assert_eq!(truncate("two\nlines", 20), "two lines");
    }
}

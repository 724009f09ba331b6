use std::path::Path;

use chrono::{DateTime, Local};
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, Table};

use crate::error::Result;
use crate::generator::Policy;
use crate::spammer::Summary;

pub fn status_description(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Unsupported Status Code",
    }
}

/// Two-column table with the labels centred; values may span lines.
fn two_column(rows: Vec<(String, String)>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    for (label, value) in rows {
        table.add_row(vec![
            Cell::new(label).set_alignment(CellAlignment::Center),
            Cell::new(value),
        ]);
    }
    table
}

pub fn parameter_rows(url: &str, requests: usize, workers: usize, policy: &Policy) -> Vec<(String, String)> {
    vec![
        ("URL".to_string(), url.to_string()),
        ("Requests".to_string(), requests.to_string()),
        ("Workers".to_string(), workers.to_string()),
        ("Required Fields".to_string(), policy.required_only.to_string()),
        ("Garbage Length".to_string(), policy.garbage_length.to_string()),
    ]
}

pub fn print_parameters(url: &str, requests: usize, workers: usize, policy: &Policy) {
    println!("\n[~] Starting spammer...\n");
    println!("{}\n", two_column(parameter_rows(url, requests, workers, policy)));
}

pub fn completion_rows(summary: &Summary) -> Vec<(String, String)> {
    let mut rows = vec![
        (
            "Execution Time".to_string(),
            format!("{:.2}s", summary.elapsed.as_secs_f64()),
        ),
        (
            "Success Ratio".to_string(),
            format!(
                "{}/{} ({:.2}%)",
                summary.successful,
                summary.requested,
                summary.success_ratio()
            ),
        ),
        ("Speed".to_string(), format!("{:.3} req/s", summary.speed())),
    ];

    let mut errors: Vec<String> = summary
        .errors
        .iter()
        .map(|(status, count)| format!("- {count} requests ({status}, {})", status_description(*status)))
        .collect();
    if summary.transport_failures > 0 {
        errors.push(format!("- {} requests (no response)", summary.transport_failures));
    }
    if !errors.is_empty() {
        rows.push(("Errors".to_string(), errors.join("\n")));
    }
    if summary.interrupted {
        rows.push((
            "Interrupted".to_string(),
            format!("after {} attempts", summary.attempted),
        ));
    }
    rows
}

pub fn print_summary(summary: &Summary) {
    println!("\n[=] Spammer finished!\n");
    println!("{}\n", two_column(completion_rows(summary)));
}

/// One CSV row per outcome: successes, each HTTP status, dropped connections.
pub fn write_csv(path: &Path, url: &str, started_at: DateTime<Local>, summary: &Summary) -> Result<()> {
    let mut writer = csv::WriterBuilder::default().from_path(path)?;
    writer.write_record(["started_at", "url", "outcome", "description", "count"])?;

    let stamp = started_at.to_rfc3339();
    let successful = summary.successful.to_string();
    writer.write_record([stamp.as_str(), url, "success", status_description(200), successful.as_str()])?;
    for (status, count) in &summary.errors {
        let status_text = status.to_string();
        let count_text = count.to_string();
        writer.write_record([
            stamp.as_str(),
            url,
            status_text.as_str(),
            status_description(*status),
            count_text.as_str(),
        ])?;
    }
    if summary.transport_failures > 0 {
        let count_text = summary.transport_failures.to_string();
        writer.write_record([stamp.as_str(), url, "transport", "No Response", count_text.as_str()])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use super::*;

    fn summary() -> Summary {
        Summary {
            requested: 10,
            attempted: 10,
            successful: 6,
            errors: BTreeMap::from([(429, 3), (418, 1)]),
            transport_failures: 0,
            elapsed: Duration::from_secs(2),
            interrupted: false,
        }
    }

    fn cells(table: &Table) -> Vec<Vec<String>> {
        table
            .row_iter()
            .map(|row| row.cell_iter().map(Cell::content).collect())
            .collect()
    }

    #[test]
    fn test_parameter_table() {
        let policy = Policy {
            required_only: true,
            garbage_length: 12,
        };
        let table = two_column(parameter_rows("https://example.test/form", 10, 3, &policy));
        assert_eq!(
            cells(&table),
            vec![
                vec!["URL", "https://example.test/form"],
                vec!["Requests", "10"],
                vec!["Workers", "3"],
                vec!["Required Fields", "true"],
                vec!["Garbage Length", "12"],
            ]
        );
        let rendered = table.to_string();
        assert!(rendered.starts_with('┌'));
        assert!(rendered.lines().any(|line| line.contains("Garbage Length") && line.contains("12")));
    }

    #[test]
    fn test_completion_rows() {
        let rows = completion_rows(&summary());
        let labels: Vec<&str> = rows.iter().map(|(label, _)| label.as_str()).collect();
        assert_eq!(labels, vec!["Execution Time", "Success Ratio", "Speed", "Errors"]);
        assert_eq!(rows[0].1, "2.00s");
        assert_eq!(rows[1].1, "6/10 (60.00%)");
        assert_eq!(rows[2].1, "3.000 req/s");
        assert_eq!(
            rows[3].1,
            "- 1 requests (418, Unsupported Status Code)\n- 3 requests (429, Too Many Requests)"
        );

        let rendered = two_column(rows).to_string();
        assert!(rendered.lines().any(|line| line.contains("- 3 requests (429, Too Many Requests)")));
    }

    #[test]
    fn test_interrupted_run_rows() {
        let interrupted = Summary {
            attempted: 4,
            transport_failures: 2,
            interrupted: true,
            ..summary()
        };
        let rows = completion_rows(&interrupted);
        assert!(rows[3].1.ends_with("- 2 requests (no response)"));
        assert_eq!(rows[4], ("Interrupted".to_string(), "after 4 attempts".to_string()));
    }

    #[test]
    fn test_write_csv() {
        let path = std::env::temp_dir().join(format!("form_spammer_report_{}.csv", std::process::id()));
        let started_at = Local::now();
        write_csv(&path, "https://example.test/form", started_at, &summary()).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "started_at,url,outcome,description,count");
        let stamp = started_at.to_rfc3339();
        assert_eq!(lines[1], format!("{stamp},https://example.test/form,success,OK,6"));
        assert_eq!(lines[2], format!("{stamp},https://example.test/form,418,Unsupported Status Code,1"));
        assert_eq!(lines[3], format!("{stamp},https://example.test/form,429,Too Many Requests,3"));
        assert_eq!(lines.len(), 4);
    }
}

use chrono::{DateTime, Utc};
use owo_colors::{OwoColorize, Stream, Style};
use serde::Serialize;

use crate::catalog::Catalog;
use crate::types::{AggregatedStat, BenchmarkResult, Failure};

/// Placeholder for a metric the benchmark does not report.
pub const UNDEFINED: &str = "-";

/// `mean ± stdev` with two decimals, or `-` when the metric is undefined.
pub fn format_stat(stat: Option<&AggregatedStat>) -> String {
    match stat {
        Some(s) => format!("{:.2} ± {:.2}", s.mean, s.stdev),
        None => UNDEFINED.to_string(),
    }
}

fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.6}", v),
        None => UNDEFINED.to_string(),
    }
}

fn style_header() -> Style {
    Style::new().dimmed().bold()
}

fn style_name() -> Style {
    Style::new().green()
}

/// Pad every cell to its column width. Widths are measured on the plain text
/// so that color codes do not skew alignment.
fn column_widths(header: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }
    widths
}

fn pad(cell: &str, width: usize, left: bool) -> String {
    if left {
        format!("{:<width$}", cell, width = width)
    } else {
        format!("{:>width$}", cell, width = width)
    }
}

fn render(header: &[&str], rows: &[Vec<String>], name_columns: usize) -> String {
    let widths = column_widths(header, rows);
    let header_style = style_header();
    let name_style = style_name();
    let mut out = String::new();

    let header_line: Vec<String> = header
        .iter()
        .zip(&widths)
        .enumerate()
        .map(|(i, (h, w))| pad(h, *w, i < name_columns))
        .collect();
    out.push_str(
        &header_line
            .join("  ")
            .trim_end()
            .if_supports_color(Stream::Stdout, |s| s.style(header_style))
            .to_string(),
    );
    out.push('\n');

    for row in rows {
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(i, (cell, w))| {
                let padded = pad(cell, *w, i < name_columns);
                if i == 0 {
                    padded
                        .if_supports_color(Stream::Stdout, |s| s.style(name_style))
                        .to_string()
                } else if cell == UNDEFINED {
                    padded
                        .if_supports_color(Stream::Stdout, |s| s.dimmed())
                        .to_string()
                } else {
                    padded
                }
            })
            .collect();
        out.push_str(cells.join("  ").trim_end());
        out.push('\n');
    }

    out
}

fn format_failures(failures: &[Failure]) -> String {
    if failures.is_empty() {
        return String::new();
    }
    let mut out = String::from("\n");
    for failure in failures {
        let line = format!("skipped {}: {}", failure.name, failure.message);
        out.push_str(
            &line
                .if_supports_color(Stream::Stdout, |s| s.yellow())
                .to_string(),
        );
        out.push('\n');
    }
    out
}

/// Default report: one row per benchmark, `mean ± stdev` per metric, in seconds.
pub fn format_table(results: &[BenchmarkResult], failures: &[Failure]) -> String {
    let header = ["app", "iters", "overall [s]", "inner [s]", "startup [s]"];
    let rows: Vec<Vec<String>> = results
        .iter()
        .map(|r| {
            vec![
                r.name.clone(),
                r.iterations.to_string(),
                format_stat(Some(&r.overall)),
                format_stat(r.inner.as_ref()),
                format_stat(r.start.as_ref()),
            ]
        })
        .collect();

    let mut out = render(&header, &rows, 1);
    out.push_str(&format_failures(failures));
    out
}

/// Detailed report: mean, variance and standard deviation for every metric.
pub fn format_full(results: &[BenchmarkResult], failures: &[Failure]) -> String {
    let header = ["app", "metric", "mean", "variance", "stdev"];
    let mut rows = Vec::with_capacity(results.len() * 3);
    for r in results {
        for (metric, stat) in [
            ("overall", Some(&r.overall)),
            ("inner", r.inner.as_ref()),
            ("startup", r.start.as_ref()),
        ] {
            rows.push(vec![
                r.name.clone(),
                metric.to_string(),
                format_value(stat.map(|s| s.mean)),
                format_value(stat.map(|s| s.variance)),
                format_value(stat.map(|s| s.stdev)),
            ]);
        }
    }

    let mut out = render(&header, &rows, 2);
    out.push_str(&format_failures(failures));
    out
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: String,
    results: &'a [BenchmarkResult],
    failures: &'a [Failure],
}

/// JSON report. Undefined metrics serialize as `null`.
pub fn format_json(results: &[BenchmarkResult], failures: &[Failure], now: DateTime<Utc>) -> String {
    let report = JsonReport {
        generated_at: now.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        results,
        failures,
    };
    serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())
}

/// What `--list` prints: name, iteration policy and command line.
pub fn format_listing(catalog: &Catalog) -> String {
    let header = ["app", "iterations", "command"];
    let rows: Vec<Vec<String>> = catalog
        .benchmarks
        .iter()
        .map(|b| {
            vec![
                b.name.clone(),
                b.iteration_policy.to_string(),
                b.command_line(),
            ]
        })
        .collect();
    render(&header, &rows, 3)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(mean: f64, variance: f64) -> AggregatedStat {
        AggregatedStat {
            mean,
            variance,
            stdev: variance.sqrt(),
        }
    }

    fn with_inner(name: &str) -> BenchmarkResult {
        BenchmarkResult {
            name: name.to_string(),
            iterations: 10,
            overall: stat(44.123, 0.25),
            inner: Some(stat(41.7, 0.04)),
            start: Some(stat(2.423, 0.01)),
        }
    }

    fn without_inner(name: &str) -> BenchmarkResult {
        BenchmarkResult {
            name: name.to_string(),
            iterations: 5,
            overall: stat(1.0, 0.0),
            inner: None,
            start: None,
        }
    }

    /// Layout assertions need uncolored output even when run from a terminal.
    fn plain() {
        owo_colors::set_override(false);
    }

    fn fixed_now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-02-18T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn stat_two_decimals() {
        assert_eq!(format_stat(Some(&stat(44.123, 0.25))), "44.12 ± 0.50");
    }

    #[test]
    fn undefined_stat_is_dash() {
        assert_eq!(format_stat(None), "-");
    }

    #[test]
    fn table_has_header_and_rows() {
        plain();
        let out = format_table(&[with_inner("SP.C.64 (master)"), without_inner("hello")], &[]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("app"));
        assert!(lines[0].contains("startup [s]"));
        assert!(lines[1].contains("SP.C.64 (master)"));
        assert!(lines[1].contains("41.70 ± 0.20"));
        assert!(lines[2].contains("1.00 ± 0.00"));
        assert!(lines[2].trim_end().ends_with('-'));
    }

    #[test]
    fn table_columns_are_aligned() {
        plain();
        let out = format_table(&[with_inner("a"), without_inner("a much longer name")], &[]);
        let lines: Vec<&str> = out.lines().collect();
        let iters_end = lines[0].find("iters").unwrap() + "iters".len();
        assert_eq!(lines[1].find("10").unwrap() + 2, iters_end);
        assert_eq!(lines[2].find('5').unwrap() + 1, iters_end);
    }

    #[test]
    fn table_lists_failures() {
        let failures = [Failure {
            name: "broken".to_string(),
            command: "./broken.sh".to_string(),
            message: "'./broken.sh' exited with exit status: 1".to_string(),
        }];
        let out = format_table(&[], &failures);
        assert!(out.contains("skipped broken: './broken.sh' exited"));
    }

    #[test]
    fn full_has_three_rows_per_benchmark() {
        plain();
        let out = format_full(&[with_inner("sp"), without_inner("ep")], &[]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 7);
        assert!(lines[1].contains("overall") && lines[1].contains("44.123000"));
        assert!(lines[1].contains("0.250000") && lines[1].contains("0.500000"));
        assert!(lines[6].contains("startup"));
        assert!(lines[6].trim_end().ends_with('-'));
    }

    #[test]
    fn json_shape() {
        let out = format_json(&[with_inner("sp"), without_inner("ep")], &[], fixed_now());
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["generated_at"], "2026-02-18T00:00:00Z");
        let results = parsed["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["name"], "sp");
        assert_eq!(results[0]["iterations"], 10);
        assert_eq!(results[0]["overall"]["variance"], 0.25);
        assert_eq!(results[0]["inner"]["mean"], 41.7);
        assert!(results[1]["inner"].is_null());
        assert!(results[1]["start"].is_null());
        assert_eq!(parsed["failures"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn listing_shows_policy_and_command() {
        let catalog = Catalog::parse(
            r#"
[[benchmark]]
name = "sp"
command = "./master.sh"
args = "64 2,3"
iterations = 4

[[benchmark]]
name = "bt"
command = "./bt.sh"
target_time = "1m"
"#,
        )
        .unwrap();
        let out = format_listing(&catalog);
        assert!(out.contains("./master.sh 64 2,3"));
        assert!(out.contains("4x"));
        assert!(out.contains("~60s"));
    }
}

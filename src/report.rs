use crate::config::DbConfig;
use crate::connect::connect;
use crate::error::PipelineError;
use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::mysql::MySqlRow;
use sqlx::types::Decimal;
use sqlx::{Connection, Row};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{info, warn};

/// One analytical report: a stored query plus the labels and description used
/// for display and the CSV artifact. The query text itself is opaque here.
#[derive(Debug, Clone)]
pub struct Report {
    /// File name under the SQL directory, e.g. `fastest_users.sql`.
    pub query_file: &'static str,
    pub labels: &'static [&'static str],
    /// Printed above the table; the query file name is used when empty.
    pub description: &'static str,
}

/// The four reports the default pipeline runs, in order.
pub fn default_reports() -> Vec<Report> {
    vec![
        Report {
            query_file: "fastest_users.sql",
            labels: &[
                "user_id",
                "user_email",
                "course_id",
                "course_title",
                "days_to_complete",
            ],
            description: "fastest 5 users completing a course",
        },
        Report {
            query_file: "slowest_users.sql",
            labels: &[
                "user_id",
                "user_email",
                "course_id",
                "course_title",
                "days_to_complete",
            ],
            description: "slowest 5 users completing a course",
        },
        Report {
            query_file: "avg_complete_time_per_course.sql",
            labels: &["course_id", "course_title", "average_days_to_complete"],
            description: "average days to complete each course individually",
        },
        Report {
            query_file: "avg_complete_time_courses.sql",
            labels: &["average_days_to_complete"],
            description: "average days to complete a course (across all courses)",
        },
    ]
}

/// Artifact name for a query file: strip `.sql`, prefix `result_`, `.csv`.
pub fn artifact_name(query_file: &str) -> String {
    let stem = query_file.strip_suffix(".sql").unwrap_or(query_file);
    format!("result_{stem}.csv")
}

/// Stringify one result cell. The analytics queries produce VARCHAR columns,
/// integer day counts, DECIMAL averages and occasionally dates; anything
/// outside that set renders empty with a warning.
fn cell_text(row: &MySqlRow, idx: usize) -> String {
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.unwrap_or_default();
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(|n| n.to_string()).unwrap_or_default();
    }
    if let Ok(v) = row.try_get::<Option<u64>, _>(idx) {
        return v.map(|n| n.to_string()).unwrap_or_default();
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(|n| n.to_string()).unwrap_or_default();
    }
    if let Ok(v) = row.try_get::<Option<Decimal>, _>(idx) {
        return v.map(|n| n.to_string()).unwrap_or_default();
    }
    if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
        return v.map(|n| n.to_string()).unwrap_or_default();
    }
    if let Ok(v) = row.try_get::<Option<NaiveDate>, _>(idx) {
        return v.map(|n| n.to_string()).unwrap_or_default();
    }
    warn!(column = idx, "could not decode result cell, rendering empty");
    String::new()
}

/// Verify the caller's labels agree with the actual result width.
pub fn check_labels(
    query_file: &str,
    labels: &[&str],
    width: usize,
) -> Result<(), PipelineError> {
    if width != labels.len() {
        return Err(PipelineError::LabelMismatch {
            query: query_file.to_string(),
            expected: labels.len(),
            actual: width,
        });
    }
    Ok(())
}

/// Render rows as an aligned text table under the given headers.
/// Widths are measured in characters, not bytes, so non-ASCII data aligns.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            let chars = cell.chars().count();
            if i < widths.len() && chars > widths[i] {
                widths[i] = chars;
            }
        }
    }

    let mut out = String::new();
    let render_row = |cells: &[String]| -> String {
        let line = cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let width = widths.get(i).copied().unwrap_or(cell.len());
                format!("{cell:<width$}")
            })
            .collect::<Vec<_>>()
            .join("  ");
        line.trim_end().to_string()
    };

    let header_cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    out.push_str(&render_row(&header_cells));
    out.push('\n');
    let rules: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&render_row(&rules));
    for row in rows {
        out.push('\n');
        out.push_str(&render_row(row));
    }
    out
}

/// Write the header row and data rows to `path`, overwriting any prior file.
pub fn write_csv(path: &Path, headers: &[&str], rows: &[Vec<String>]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Execute a stored query and produce the console table plus the CSV
/// artifact. A label count that disagrees with the actual result width is an
/// error, not a malformed report.
pub async fn run_report(
    cfg: &DbConfig,
    sql_dir: &Path,
    out_dir: &Path,
    report: &Report,
) -> Result<PathBuf> {
    let query_path = sql_dir.join(report.query_file);
    let query = fs::read_to_string(&query_path)
        .with_context(|| format!("failed to read query file {}", query_path.display()))?;

    let mut conn = connect(cfg, Some(&cfg.database)).await?;
    let result = sqlx::query(&query)
        .fetch_all(&mut conn)
        .await
        .with_context(|| format!("executing query from {}", report.query_file))?;
    conn.close().await.ok();

    if let Some(first) = result.first() {
        check_labels(report.query_file, report.labels, first.len())?;
    }

    let rows: Vec<Vec<String>> = result
        .iter()
        .map(|row| (0..row.len()).map(|i| cell_text(row, i)).collect())
        .collect();

    if report.description.is_empty() {
        println!("Results for query in {}", report.query_file);
    } else {
        println!("Results for {}", report.description);
    }
    println!("{}\n", render_table(report.labels, &rows));

    let out_path = out_dir.join(artifact_name(report.query_file));
    write_csv(&out_path, report.labels, &rows)?;
    info!(path = %out_path.display(), rows = rows.len(), "wrote report artifact");
    Ok(out_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn artifact_names_strip_suffix_and_prefix_result() {
        assert_eq!(artifact_name("fastest_users.sql"), "result_fastest_users.csv");
        // no .sql suffix to strip
        assert_eq!(artifact_name("adhoc"), "result_adhoc.csv");
    }

    #[test]
    fn four_default_reports() {
        let reports = default_reports();
        assert_eq!(reports.len(), 4);
        assert_eq!(reports[0].query_file, "fastest_users.sql");
        assert_eq!(reports[3].labels, &["average_days_to_complete"]);
    }

    #[test]
    fn table_columns_align_to_widest_cell() {
        let rows = vec![
            vec!["u1".to_string(), "3".to_string()],
            vec!["user_with_long_id".to_string(), "12".to_string()],
        ];
        let rendered = render_table(&["user_id", "days"], &rows);
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "user_id            days");
        assert_eq!(lines[1], "-----------------  ----");
        assert_eq!(lines[2], "u1                 3");
        assert_eq!(lines[3], "user_with_long_id  12");
    }

    #[test]
    fn non_ascii_cells_align_by_character_count() {
        let rows = vec![
            vec!["Åsa Öberg".to_string(), "3".to_string()],
            vec!["Bo".to_string(), "12".to_string()],
        ];
        let rendered = render_table(&["name", "days"], &rows);
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines[0], "name       days");
        assert_eq!(lines[1], "---------  ----");
        assert_eq!(lines[2], "Åsa Öberg  3");
        assert_eq!(lines[3], "Bo         12");
    }

    #[test]
    fn matching_labels_pass_the_width_check() {
        assert!(check_labels("fastest_users.sql", &["user_id", "days"], 2).is_ok());
    }

    #[test]
    fn label_count_disagreeing_with_result_width_is_an_error() {
        let err = check_labels("fastest_users.sql", &["user_id", "days"], 5).unwrap_err();
        match err {
            PipelineError::LabelMismatch {
                query,
                expected,
                actual,
            } => {
                assert_eq!(query, "fastest_users.sql");
                assert_eq!(expected, 2);
                assert_eq!(actual, 5);
            }
            other => panic!("expected LabelMismatch, got {other}"),
        }
    }

    #[test]
    fn empty_result_renders_header_and_rule_only() {
        let rendered = render_table(&["a", "bb"], &[]);
        assert_eq!(rendered, "a  bb\n-  --");
    }

    #[test]
    fn csv_artifact_has_header_then_rows() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("result_fastest_users.csv");
        let rows = vec![
            vec!["u1".to_string(), "3".to_string()],
            vec!["u2".to_string(), "5".to_string()],
        ];
        write_csv(&path, &["user_id", "days"], &rows)?;

        let text = fs::read_to_string(&path)?;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, ["user_id,days", "u1,3", "u2,5"]);
        Ok(())
    }
}

use crate::config::DbConfig;
use crate::connect::connect;
use crate::error::PipelineError;
use crate::schema::TableDef;
use crate::source::Record;
use anyhow::{Context, Result};
use sqlx::{Connection, MySql, Transaction};
use std::str::FromStr;
use tracing::{info, warn};

/// Policy for existing rows in the target table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Delete all existing rows, then insert.
    Replace,
    /// Insert without deleting.
    Append,
}

impl FromStr for LoadMode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "replace" => Ok(LoadMode::Replace),
            "append" => Ok(LoadMode::Append),
            other => Err(PipelineError::InvalidLoadMode(other.to_string())),
        }
    }
}

/// What a load call accomplished. Partial success leaves the inserted subset
/// committed; the caller decides whether that warrants aborting the pipeline.
#[derive(Debug)]
pub struct LoadOutcome {
    pub inserted: usize,
    pub total: usize,
}

impl LoadOutcome {
    pub fn is_complete(&self) -> bool {
        self.inserted == self.total
    }
}

/// Render a JSON value the way it should land in a VARCHAR column. Strings
/// drop their quotes; anything else keeps its JSON form.
fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Project a record onto the table's columns, preserving the record's own key
/// order. Keys outside the column list are dropped; a column absent from the
/// record fails the whole record.
pub fn project<'r>(
    record: &'r Record,
    table: &TableDef,
) -> Result<Vec<(&'r str, String)>, PipelineError> {
    if let Some(missing) = table.columns.iter().find(|c| !record.contains_key(**c)) {
        return Err(PipelineError::MissingField {
            table: table.name.to_string(),
            field: missing.to_string(),
        });
    }
    Ok(record
        .iter()
        .filter(|(key, _)| table.columns.contains(&key.as_str()))
        .map(|(key, value)| (key.as_str(), value_text(value)))
        .collect())
}

/// Single-row parameterized INSERT; values are bound out-of-band, never
/// spliced into the statement text.
pub fn insert_sql(table: &str, columns: &[&str]) -> String {
    let cols = columns
        .iter()
        .map(|c| format!("`{c}`"))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!("INSERT INTO `{table}` ({cols}) VALUES ({placeholders})")
}

async fn insert_record(
    tx: &mut Transaction<'_, MySql>,
    table: &TableDef,
    record: &Record,
) -> Result<()> {
    let fields = project(record, table)?;
    let columns: Vec<&str> = fields.iter().map(|(key, _)| *key).collect();
    let sql = insert_sql(table.name, &columns);
    let mut query = sqlx::query(&sql);
    for (_, value) in &fields {
        query = query.bind(value);
    }
    query.execute(&mut **tx).await?;
    Ok(())
}

/// Insert `records` into `table`. Per-record failures are logged and counted
/// but do not abort the batch; one commit at the end covers whatever subset
/// succeeded.
pub async fn load(
    cfg: &DbConfig,
    records: &[Record],
    table: &TableDef,
    mode: LoadMode,
) -> Result<LoadOutcome> {
    let mut conn = connect(cfg, Some(&cfg.database)).await?;
    let mut tx = conn
        .begin()
        .await
        .with_context(|| format!("beginning transaction for `{}`", table.name))?;

    if mode == LoadMode::Replace {
        sqlx::query(&format!("DELETE FROM `{}` WHERE 1=1", table.name))
            .execute(&mut *tx)
            .await
            .with_context(|| format!("deleting existing rows from `{}`", table.name))?;
        info!(table = table.name, "deleted existing rows");
    }

    info!(table = table.name, total = records.len(), "inserting records");
    let mut inserted = 0;
    for record in records {
        match insert_record(&mut tx, table, record).await {
            Ok(()) => inserted += 1,
            Err(err) => warn!(table = table.name, %err, ?record, "failed to insert record"),
        }
    }

    tx.commit()
        .await
        .with_context(|| format!("committing load into `{}`", table.name))?;
    conn.close().await.ok();

    info!(
        table = table.name,
        inserted,
        total = records.len(),
        "load finished"
    );
    Ok(LoadOutcome {
        inserted,
        total: records.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("replace".parse::<LoadMode>().unwrap(), LoadMode::Replace);
        assert_eq!("append".parse::<LoadMode>().unwrap(), LoadMode::Append);
        let err = "upsert".parse::<LoadMode>().unwrap_err();
        assert!(matches!(err, PipelineError::InvalidLoadMode(ref m) if m == "upsert"));
    }

    #[test]
    fn projection_preserves_record_key_order() {
        let courses = schema::table("courses").unwrap();
        // fields deliberately out of column order, plus a stray key
        let rec = record(json!({
            "title": "Intro",
            "id": "c1",
            "publishedAt": "2021-01-01",
            "stray": "x",
            "description": "d"
        }));

        let fields = project(&rec, courses).unwrap();
        let keys: Vec<&str> = fields.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, ["title", "id", "publishedAt", "description"]);
        assert_eq!(fields[0].1, "Intro");
    }

    #[test]
    fn missing_column_fails_the_record() {
        let courses = schema::table("courses").unwrap();
        let rec = record(json!({"id": "c1", "title": "Intro", "description": "d"}));

        let err = project(&rec, courses).unwrap_err();
        assert!(
            matches!(err, PipelineError::MissingField { ref field, .. } if field == "publishedAt")
        );
    }

    #[test]
    fn non_string_values_keep_their_json_form() {
        assert_eq!(value_text(&json!("plain")), "plain");
        assert_eq!(value_text(&json!(42)), "42");
        assert_eq!(value_text(&json!(null)), "");
    }

    #[test]
    fn insert_statement_uses_placeholders() {
        let sql = insert_sql("courses", &["id", "title"]);
        assert_eq!(sql, "INSERT INTO `courses` (`id`, `title`) VALUES (?, ?)");
    }
}

use anyhow::{Context, Result};
use std::{fs, path::Path};

/// One row of source data: field name → JSON value, in the order the source
/// file listed the fields.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Read a JSON array of flat records from `path`. A missing file or malformed
/// JSON is fatal; the source files are assumed well-formed.
pub fn read_records(path: &Path) -> Result<Vec<Record>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read data file {}", path.display()))?;
    let records: Vec<Record> = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse {} as a JSON array of records", path.display()))?;
    Ok(records)
}

use thiserror::Error;

/// Typed failures of the load-and-report pipeline.
///
/// Anything else (file I/O, JSON parsing, SQL execution) travels as
/// `anyhow::Error` with context attached at the call site.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Retry budget exhausted without a usable connection. Callers must treat
    /// this as fatal; there is no handle to fall back on.
    #[error("database unavailable after {attempts} connection attempts (last error: {last})")]
    ConnectionUnavailable { attempts: u32, last: String },

    #[error("unrecognized load mode `{0}` (expected `replace` or `append`)")]
    InvalidLoadMode(String),

    /// A record lacks a column its target table requires. Fails that record
    /// only; the surrounding batch keeps going.
    #[error("record is missing field `{field}` required by table `{table}`")]
    MissingField { table: String, field: String },

    #[error("query `{query}` returned {actual} columns but {expected} labels were supplied")]
    LabelMismatch {
        query: String,
        expected: usize,
        actual: usize,
    },
}

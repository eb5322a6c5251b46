//! Domain errors raised by the pipeline stages

use thiserror::Error;

/// Errors specific to the balance analysis. I/O, parsing and drawing
/// failures come straight from polars / plotters and are carried by
/// `anyhow` instead.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PipelineError {
    #[error("{table} table has no `{column}` column")]
    MissingColumn { table: &'static str, column: &'static str },
    #[error("histogram needs at least one bin")]
    InvalidBinCount,
    #[error("{path} is not a usable font file")]
    InvalidFont { path: String },
    #[error("unknown {kind} label `{label}`")]
    UnknownLabel { kind: &'static str, label: String },
}

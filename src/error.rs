use std::io;

use rust_decimal::Decimal;
use thiserror::Error;

/// Typed failures raised by the reconciliation pipeline.
///
/// Only [`ReconError::ConservationViolation`], [`ReconError::AmountOverflow`],
/// [`ReconError::Storage`] and [`ReconError::Document`] abort a run; the
/// remaining variants are reported and the affected file or sheet is skipped.
#[derive(Debug, Error)]
pub enum ReconError {
    #[error("cannot parse '{file}': {reason}")]
    Ingest { file: String, reason: String },
    #[error("sheet '{sheet}' is missing from the base document")]
    Schema { sheet: String },
    #[error("column '{column}' expects a number but found '{value}'")]
    NumericCoercion { column: String, value: String },
    #[error("taxable value drifted from {before} to {after} while reapportioning rate {rate}")]
    ConservationViolation {
        rate: Decimal,
        before: Decimal,
        after: Decimal,
    },
    #[error("{total} overflowed the decimal range")]
    AmountOverflow { total: String },
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("cannot decode filing document: {0}")]
    Document(#[from] serde_json::Error),
}

/// Failures surfaced by a [`crate::storage::ByteStore`].
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage key '{0}' was not found")]
    NotFound(String),
    #[error("storage I/O failed for '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },
}

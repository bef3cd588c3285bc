use thiserror::Error;

/// Result alias for the numeric core.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures surfaced by the decomposition engine, the estimators and the
/// calendar normalizer. Nothing here is retryable.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("data shape error: {0}")]
    DataShape(#[from] DataShapeError),

    #[error("degenerate sample: need at least {needed} values, got {got}")]
    DegenerateSample { needed: usize, got: usize },
}

/// Invalid caller-supplied configuration (bands, percentiles, levels).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("band set is empty")]
    NoBands,

    #[error("band label must not be empty")]
    EmptyLabel,

    #[error("band label '{0}' is reserved")]
    ReservedLabel(String),

    #[error("band label '{0}' appears more than once")]
    DuplicateLabel(String),

    #[error("band '{label}': {reason}")]
    MalformedBand { label: String, reason: String },

    #[error("upper bound '{0}' is neither a number of hours nor \"unbounded\"")]
    UnknownUpperBound(String),

    #[error("percentile {0} is outside [0, 100]")]
    Percentile(f64),

    #[error("confidence level {0} is outside (0, 1)")]
    ConfidenceLevel(f64),
}

/// The dataset does not satisfy the contiguous hourly grid contract.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DataShapeError {
    #[error("dataset has no rows")]
    Empty,

    #[error("dataset has {0} rows, at least 2 are required")]
    TooShort(usize),

    #[error("timestamps are not strictly increasing at row {0}")]
    NotIncreasing(usize),

    #[error("step at row {row} is {seconds}s, expected 3600s")]
    NonUniformStep { row: usize, seconds: i64 },

    #[error("column {key} has a missing or non-finite value at row {row}")]
    NonFinite { key: String, row: usize },

    #[error("column {key} has {got} values, index has {expected}")]
    RaggedColumn {
        key: String,
        expected: usize,
        got: usize,
    },

    #[error("column {key} has {got} tag values, expected {expected}")]
    KeyArity {
        key: String,
        expected: usize,
        got: usize,
    },

    #[error("tag '{0}' is declared more than once")]
    DuplicateTag(String),

    #[error("tag '{0}' already present")]
    TagExists(String),

    #[error("unknown tag '{0}'")]
    UnknownTag(String),

    #[error("leap day {0} rejected by the leap-day policy")]
    LeapDay(String),
}

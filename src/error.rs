//! Error type shared by the classifiers, the data types and the loaders.

use thiserror::Error;

/// Everything that can go wrong while loading data, training or predicting.
#[derive(Debug, Error)]
pub enum Error {
    /// Training data with zero rows or zero columns.
    #[error("invalid training set: {rows} rows x {cols} columns")]
    EmptyTrainingSet { rows: usize, cols: usize },

    #[error("model has not been trained")]
    NotTrained,

    #[error("expected {expected} labels, found {found}")]
    LabelCountMismatch { expected: usize, found: usize },

    #[error("row {row} has {found} columns, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// A query whose length differs from the training dimensionality.
    #[error("dimension mismatch: expected {expected} features, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("no neighbors available to vote on")]
    NoNeighbors,

    #[error("test set is empty")]
    EmptyTestSet,

    #[error("label {0} is not an integer class label")]
    InvalidLabel(f64),

    #[error("unknown model type `{0}`")]
    UnknownModel(String),

    #[error("model type `{0}` is not supported")]
    UnsupportedModel(String),

    #[error("invalid IDX magic number {0:#010x}")]
    BadMagic(u32),

    #[error("failed to parse `{token}` on line {line}")]
    Parse { line: usize, token: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

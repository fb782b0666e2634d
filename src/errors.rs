//! Errors
//!
//! Custom error types used throughout the `causalboost` crate.
use thiserror::Error;

/// Errors that can occur while preprocessing data or estimating treatment effects.
#[derive(Debug, Error)]
pub enum CausalError {
    /// A named column is not present in the dataset.
    #[error("Column {0} was not found in the dataset.")]
    ColumnNotFound(String),
    /// The non-null values of a column are neither all numeric nor all strings.
    #[error("Columns in the dataset must be either numeric or strings. Column {0} is neither.")]
    InvalidColumnType(String),
    /// Treatment column does not hold exactly two groups. Second value is the number found.
    #[error("Treatment column {0} must contain only two unique values indicating the treated and control groups, {1} found.")]
    InvalidTreatment(String, usize),
    /// Categorical outcome column does not hold exactly two values. Second value is the number found.
    #[error("If the outcome column {0} is categorical, it must contain only two unique values, {1} found.")]
    InvalidOutcome(String, usize),
    /// The table itself is malformed or empty.
    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),
    /// An operation that requires a fitted model was called before `fit`.
    #[error("The causal model has not been fitted, call fit before {0}.")]
    NotFitted(String),
    /// A row mask does not match the number of rows. First value is the mask length.
    #[error("Mask of length {0} does not match the {1} rows of the dataset.")]
    MaskLength(usize, usize),
    /// A row mask selected no rows, so no average can be taken.
    #[error("The mask selects no rows, the average treatment effect is undefined.")]
    EmptySelection,
    /// Wrong number of feature columns. First value is expected, second is what was passed.
    #[error("Expected {0} feature columns, but {1} were provided.")]
    FeatureMismatch(usize, usize),
    /// Propensity matching could not produce a matched sample.
    #[error("Propensity matching failed: {0}")]
    MatchingFailed(String),
    /// First value is the name of the parameter, second is expected, third is what was passed.
    #[error("Invalid parameter value passed for {0}, expected {1} but {2} provided.")]
    InvalidParameter(String, String, String),
    /// Invalid value parsing.
    #[error("Invalid value {0} passed for {1}, expected one of {2}.")]
    ParseString(String, String, String),
    /// Unable to read a file or a serialized object.
    #[error("Unable to read {0}")]
    UnableToRead(String),
    /// Unable to write a file or serialize an object.
    #[error("Unable to write {0}")]
    UnableToWrite(String),
}

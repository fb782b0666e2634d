//! Preprocess
//!
//! Turns a raw [`Dataset`](crate::dataset::Dataset) into learner-ready vectors: column
//! classification, treatment/outcome binarization and covariate encoding.
pub mod binarize;
pub mod classify;
pub mod encode;

pub use binarize::{binarize_column, BinarizedColumn, ColumnRole, ValueMapping};
pub use classify::{classify_column, is_binary, ColumnDescriptor, ColumnType};
pub use encode::{EncodedColumn, FeatureEncoder};

//! Data
//!
//! Dense numeric containers handed to the learners. `Matrix` borrows a column-major
//! buffer, `FeatureMatrix` owns one together with its column names.
use crate::errors::CausalError;
use serde::{Deserialize, Serialize};

/// Contiguous Column Major Matrix data container.
///
/// This structure borrows a dense matrix of values stored in a single contiguous memory block,
/// in column-major order (Fortran-style), which allows for efficient column slicing.
///
/// # Type Parameters
/// * `T` - The numeric type of the data (e.g., `f32`, `f64`).
#[derive(Debug)]
pub struct Matrix<'a, T> {
    /// The raw data stored in a single slice.
    pub data: &'a [T],
    /// Number of rows in the matrix.
    pub rows: usize,
    /// Number of columns in the matrix.
    pub cols: usize,
}

impl<'a, T> Matrix<'a, T> {
    /// Create a new Matrix.
    ///
    /// * `data` - Column-major values, `rows * cols` long.
    /// * `rows` - Number of rows.
    /// * `cols` - Number of columns.
    pub fn new(data: &'a [T], rows: usize, cols: usize) -> Self {
        debug_assert_eq!(data.len(), rows * cols);
        Matrix { data, rows, cols }
    }

    /// Get a single reference to an item in the matrix.
    ///
    /// * `i` - The ith row of the data to get.
    /// * `j` - the jth column of the data to get.
    pub fn get(&self, i: usize, j: usize) -> &T {
        &self.data[j * self.rows + i]
    }

    /// Get an entire column in the matrix.
    ///
    /// * `col` - The index of the column to get.
    pub fn get_col(&self, col: usize) -> &'a [T] {
        &self.data[col * self.rows..(col + 1) * self.rows]
    }
}

impl<'a, T> Matrix<'a, T>
where
    T: Copy,
{
    /// Get a row of the data as a vector.
    pub fn get_row(&self, row: usize) -> Vec<T> {
        (0..self.cols).map(|j| *self.get(row, j)).collect()
    }

    /// Copy the selected rows into a new column-major buffer, in the order given.
    pub fn select_rows(&self, index: &[usize]) -> Vec<T> {
        let mut out = Vec::with_capacity(index.len() * self.cols);
        for col in 0..self.cols {
            let col_data = self.get_col(col);
            out.extend(index.iter().map(|&i| col_data[i]));
        }
        out
    }
}

/// Owned numeric feature table, column-major, with one name per column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    names: Vec<String>,
    data: Vec<f64>,
    rows: usize,
}

impl FeatureMatrix {
    /// Build a feature matrix from named columns of equal length.
    pub fn from_columns(columns: Vec<(String, Vec<f64>)>, rows: usize) -> Result<Self, CausalError> {
        let mut names = Vec::with_capacity(columns.len());
        let mut data = Vec::with_capacity(columns.len() * rows);
        for (name, values) in columns {
            if values.len() != rows {
                return Err(CausalError::InvalidDataset(format!(
                    "feature {} has {} values, expected {}",
                    name,
                    values.len(),
                    rows
                )));
            }
            if names.contains(&name) {
                return Err(CausalError::InvalidDataset(format!("duplicate feature name {}", name)));
            }
            names.push(name);
            data.extend(values);
        }
        Ok(FeatureMatrix { names, data, rows })
    }

    /// Borrow the values as a `Matrix`.
    pub fn as_matrix(&self) -> Matrix<'_, f64> {
        Matrix::new(&self.data, self.rows, self.names.len())
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.data
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.names.len()
    }

    /// Values of the named column, if present.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|j| &self.data[j * self.rows..(j + 1) * self.rows])
    }

    /// New feature matrix holding only the selected rows, in the order given.
    pub fn select_rows(&self, index: &[usize]) -> FeatureMatrix {
        FeatureMatrix {
            names: self.names.clone(),
            data: self.as_matrix().select_rows(index),
            rows: index.len(),
        }
    }
}

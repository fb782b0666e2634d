//! Dataset
//!
//! A small in-memory table of named, heterogeneous columns. This is the raw input of the
//! causal pipeline: cells may be null, numeric or text, and nothing is validated beyond
//! the shape of the table until preprocessing runs.
use crate::errors::CausalError;
use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::Path;

/// A single cell of a [`Dataset`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Number(f64),
    Text(String),
}

impl Value {
    /// Null cells and NaN numbers are both missing.
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Number(v) => v.is_nan(),
            Value::Text(_) => false,
        }
    }

    /// Numeric value of the cell, `None` for text and null cells.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// String value of the cell, `None` for numeric and null cells.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Number(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Number(f64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// A named column of cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new<S: Into<String>, V: Into<Value>>(name: S, values: Vec<V>) -> Self {
        Column {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over the non-null cells of the column.
    pub fn non_null(&self) -> impl Iterator<Item = &Value> {
        self.values.iter().filter(|v| !v.is_null())
    }
}

/// A table of equally long, uniquely named columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<Column>,
    rows: usize,
}

impl Dataset {
    /// Create a dataset, checking that column lengths agree and names are unique.
    pub fn new(columns: Vec<Column>) -> Result<Self, CausalError> {
        let rows = columns.first().map(|c| c.len()).unwrap_or(0);
        let mut seen = HashSet::new();
        for c in &columns {
            if c.len() != rows {
                return Err(CausalError::InvalidDataset(format!(
                    "column {} has {} rows, expected {}",
                    c.name,
                    c.len(),
                    rows
                )));
            }
            if !seen.insert(c.name.as_str()) {
                return Err(CausalError::InvalidDataset(format!("duplicate column name {}", c.name)));
            }
        }
        drop(seen);
        Ok(Dataset { columns, rows })
    }

    /// Load a dataset from a CSV file with a header row.
    ///
    /// * `path` - Path of the file to read.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self, CausalError> {
        let file = std::fs::File::open(path.as_ref())
            .map_err(|e| CausalError::UnableToRead(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_reader(file)
    }

    /// Load a dataset from any CSV source with a header row.
    ///
    /// Empty cells become nulls. A column is numeric when every non-empty cell parses as a
    /// float, otherwise all of its non-empty cells are kept as text.
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, CausalError> {
        let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| CausalError::UnableToRead(e.to_string()))?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let mut raw: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for record in rdr.records() {
            let record = record.map_err(|e| CausalError::UnableToRead(e.to_string()))?;
            for (j, cell) in record.iter().enumerate() {
                if let Some(col) = raw.get_mut(j) {
                    col.push(cell.to_string());
                }
            }
        }

        let columns = headers
            .into_iter()
            .zip(raw)
            .map(|(name, cells)| {
                let numeric = cells
                    .iter()
                    .filter(|c| !c.trim().is_empty())
                    .all(|c| c.trim().parse::<f64>().is_ok());
                let values = cells
                    .into_iter()
                    .map(|c| {
                        if c.trim().is_empty() {
                            Value::Null
                        } else if numeric {
                            // Checked above.
                            c.trim().parse::<f64>().map(Value::Number).unwrap_or(Value::Null)
                        } else {
                            Value::Text(c)
                        }
                    })
                    .collect();
                Column { name, values }
            })
            .collect();
        Self::new(columns)
    }

    pub fn n_rows(&self) -> usize {
        self.rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Like [`Dataset::column`], but a missing column is an error.
    pub fn get(&self, name: &str) -> Result<&Column, CausalError> {
        self.column(name)
            .ok_or_else(|| CausalError::ColumnNotFound(name.to_string()))
    }

    /// Copy of the dataset with column names and string cells stripped of surrounding
    /// whitespace.
    pub fn trimmed(&self) -> Result<Dataset, CausalError> {
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.trim().to_string(),
                values: c
                    .values
                    .iter()
                    .map(|v| match v {
                        Value::Text(s) => Value::Text(s.trim().to_string()),
                        other => other.clone(),
                    })
                    .collect(),
            })
            .collect();
        Dataset::new(columns)
    }

    /// Copy of the dataset holding the rows where `keep` is true.
    pub fn filter_rows(&self, keep: &[bool]) -> Dataset {
        let index: Vec<usize> = keep
            .iter()
            .enumerate()
            .filter(|(_, &k)| k)
            .map(|(i, _)| i)
            .collect();
        self.select_rows(&index)
    }

    /// Copy of the dataset holding the given rows, in the order given.
    pub fn select_rows(&self, index: &[usize]) -> Dataset {
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                values: index.iter().map(|&i| c.values[i].clone()).collect(),
            })
            .collect();
        Dataset {
            columns,
            rows: index.len(),
        }
    }

    /// Add a column, replacing any column of the same name in place.
    pub fn insert_column(&mut self, column: Column) -> Result<(), CausalError> {
        if column.len() != self.rows && !self.columns.is_empty() {
            return Err(CausalError::InvalidDataset(format!(
                "column {} has {} rows, expected {}",
                column.name,
                column.len(),
                self.rows
            )));
        }
        if self.columns.is_empty() {
            self.rows = column.len();
        }
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
        Ok(())
    }

    /// Boolean row mask from a predicate over one column, for subgroup estimates.
    ///
    /// * `name` - Column the predicate inspects.
    /// * `predicate` - Called once per cell, in row order.
    pub fn mask<F>(&self, name: &str, predicate: F) -> Result<Vec<bool>, CausalError>
    where
        F: Fn(&Value) -> bool,
    {
        Ok(self.get(name)?.values.iter().map(predicate).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_ragged_and_duplicates() {
        let ragged = Dataset::new(vec![Column::new("a", vec![1.0, 2.0]), Column::new("b", vec![1.0])]);
        assert!(matches!(ragged, Err(CausalError::InvalidDataset(_))));

        let dup = Dataset::new(vec![Column::new("a", vec![1.0]), Column::new("a", vec![2.0])]);
        assert!(matches!(dup, Err(CausalError::InvalidDataset(_))));
    }

    #[test]
    fn test_trimmed_strips_names_and_text() {
        let ds = Dataset::new(vec![
            Column::new(" region ", vec![" east", "west "]),
            Column::new("age", vec![1.0, 2.0]),
        ])
        .unwrap();
        let t = ds.trimmed().unwrap();
        assert_eq!(t.column_names(), vec!["region", "age"]);
        assert_eq!(t.get("region").unwrap().values[0], Value::from("east"));
        // The source is untouched.
        assert_eq!(ds.column_names()[0], " region ");
    }

    #[test]
    fn test_trimmed_detects_collisions() {
        let ds = Dataset::new(vec![Column::new("a", vec![1.0]), Column::new("a ", vec![2.0])]).unwrap();
        assert!(ds.trimmed().is_err());
    }

    #[test]
    fn test_from_reader_infers_types() {
        let csv = "treatment,outcome,age,region\ntreated,yes,31,east\ncontrol,no,,west\ntreated,no,40.5,\n";
        let ds = Dataset::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(ds.n_rows(), 3);
        assert_eq!(ds.get("age").unwrap().values, vec![Value::Number(31.0), Value::Null, Value::Number(40.5)]);
        assert_eq!(ds.get("region").unwrap().values[2], Value::Null);
        assert_eq!(ds.get("treatment").unwrap().values[1], Value::from("control"));
    }

    #[test]
    fn test_from_reader_mixed_column_is_text() {
        let csv = "code\n1\nA\n";
        let ds = Dataset::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(ds.get("code").unwrap().values, vec![Value::from("1"), Value::from("A")]);
    }

    #[test]
    fn test_filter_insert_and_mask() {
        let mut ds = Dataset::new(vec![Column::new("x", vec![1.0, 2.0, 3.0])]).unwrap();
        let f = ds.filter_rows(&[true, false, true]);
        assert_eq!(f.n_rows(), 2);
        assert_eq!(f.get("x").unwrap().values[1], Value::Number(3.0));

        ds.insert_column(Column::new("y", vec![0.0, 0.0, 0.0])).unwrap();
        ds.insert_column(Column::new("y", vec![1.0, 1.0, 1.0])).unwrap();
        assert_eq!(ds.n_cols(), 2);
        assert_eq!(ds.get("y").unwrap().values[0], Value::Number(1.0));
        assert!(ds.insert_column(Column::new("z", vec![1.0])).is_err());

        let m = ds.mask("x", |v| v.as_f64().map(|x| x > 1.5).unwrap_or(false)).unwrap();
        assert_eq!(m, vec![false, true, true]);
        assert!(matches!(ds.mask("nope", |_| true), Err(CausalError::ColumnNotFound(_))));
    }
}

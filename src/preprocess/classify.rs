//! Column classification.
use crate::dataset::{Column, Value};
use crate::errors::CausalError;
use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

/// Semantic type of a column, decided from its non-null values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Numeric,
    Categorical,
}

/// Type and cardinality of a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub dtype: ColumnType,
    pub nunique: usize,
}

/// Classify a column as numeric or categorical and count its distinct non-null values.
///
/// Nulls take no part in the decision. A column without any non-null value is numeric.
/// Fails with [`CausalError::InvalidColumnType`] when numbers and strings are mixed.
pub fn classify_column(column: &Column) -> Result<ColumnDescriptor, CausalError> {
    let mut numbers: HashSet<u64> = HashSet::new();
    let mut strings: HashSet<&str> = HashSet::new();
    for v in column.non_null() {
        match v {
            // -0.0 and 0.0 are the same value
            Value::Number(x) => {
                numbers.insert((*x + 0.0).to_bits());
            }
            Value::Text(s) => {
                strings.insert(s.as_str());
            }
            Value::Null => {}
        }
    }
    let (dtype, nunique) = match (numbers.is_empty(), strings.is_empty()) {
        (_, true) => (ColumnType::Numeric, numbers.len()),
        (true, false) => (ColumnType::Categorical, strings.len()),
        (false, false) => return Err(CausalError::InvalidColumnType(column.name.clone())),
    };
    Ok(ColumnDescriptor {
        name: column.name.clone(),
        dtype,
        nunique,
    })
}

/// True when every non-null cell is the number 0 or 1.
pub fn is_binary(column: &Column) -> bool {
    column
        .non_null()
        .all(|v| matches!(v, Value::Number(x) if *x == 0.0 || *x == 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_numeric_ignores_nulls() {
        let c = Column::new("age", vec![Value::from(1.0), Value::Null, Value::from(2.0), Value::from(1.0)]);
        let d = classify_column(&c).unwrap();
        assert_eq!(d.dtype, ColumnType::Numeric);
        assert_eq!(d.nunique, 2);
    }

    #[test]
    fn test_classify_categorical() {
        let c = Column::new("region", vec![Value::from("east"), Value::from("west"), Value::Null]);
        let d = classify_column(&c).unwrap();
        assert_eq!(d.dtype, ColumnType::Categorical);
        assert_eq!(d.nunique, 2);
    }

    #[test]
    fn test_classify_mixed_fails_naming_column() {
        let c = Column::new("mixed", vec![Value::from("a"), Value::from(1.0)]);
        let err = classify_column(&c).unwrap_err();
        assert!(matches!(err, CausalError::InvalidColumnType(ref n) if n == "mixed"));
    }

    #[test]
    fn test_classify_signed_zero_counts_once() {
        let c = Column::new("z", vec![0.0, -0.0]);
        assert_eq!(classify_column(&c).unwrap().nunique, 1);
    }

    #[test]
    fn test_is_binary() {
        assert!(is_binary(&Column::new("t", vec![0.0, 1.0, 1.0])));
        assert!(!is_binary(&Column::new("t", vec![0.0, 2.0])));
        assert!(!is_binary(&Column::new("t", vec!["0", "1"])));
    }
}

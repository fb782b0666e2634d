//! Treatment and outcome binarization.
//!
//! Both columns end up as plain `f64` vectors. Two-valued string columns are mapped onto
//! {0, 1} by sorting their values, so the mapping only depends on the set of values and
//! never on row order.
use crate::dataset::{Column, Dataset, Value};
use crate::errors::CausalError;
use crate::preprocess::classify::{classify_column, is_binary, ColumnType};
use log::info;
use serde::{Deserialize, Serialize};

/// Which contract a column is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Treatment,
    Outcome,
}

/// Sorted pair of original values, the first coded as 0 and the second as 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueMapping {
    pub column: String,
    pub values: [String; 2],
}

impl ValueMapping {
    /// Code of an original value, `None` when the value is not part of the mapping.
    pub fn code(&self, value: &str) -> Option<f64> {
        self.values.iter().position(|v| v == value).map(|i| i as f64)
    }

    /// Original value behind a code.
    pub fn decode(&self, code: f64) -> Option<&str> {
        if code == 0.0 {
            Some(&self.values[0])
        } else if code == 1.0 {
            Some(&self.values[1])
        } else {
            None
        }
    }
}

/// A treatment or outcome column after binarization.
#[derive(Debug, Clone)]
pub struct BinarizedColumn {
    pub name: String,
    pub values: Vec<f64>,
    /// True when `values` only holds 0 and 1.
    pub is_binary: bool,
    /// Present when string values were recoded.
    pub mapping: Option<ValueMapping>,
}

/// Drop rows where `name` is null and recode the column according to its role.
///
/// Returns the filtered copy of the dataset, with the recoded column in place of the
/// original one, together with the recoded values.
///
/// * `dataset` - Source table, left untouched.
/// * `name` - Column to recode.
/// * `role` - Treatment columns must hold exactly two groups. Outcome columns may also be numeric.
/// * `verbose` - Log the mapping that was applied.
pub fn binarize_column(
    dataset: &Dataset,
    name: &str,
    role: ColumnRole,
    verbose: bool,
) -> Result<(Dataset, BinarizedColumn), CausalError> {
    let keep: Vec<bool> = dataset.get(name)?.values.iter().map(|v| !v.is_null()).collect();
    let mut filtered = dataset.filter_rows(&keep);
    if filtered.n_rows() == 0 {
        return Err(CausalError::InvalidDataset(format!(
            "no rows left after removing missing values in column {}",
            name
        )));
    }
    let column = filtered.get(name)?;

    if is_binary(column) {
        let values: Vec<f64> = column.values.iter().filter_map(Value::as_f64).collect();
        if role == ColumnRole::Treatment && !(values.contains(&0.0) && values.contains(&1.0)) {
            return Err(CausalError::InvalidTreatment(name.to_string(), 1));
        }
        let binarized = BinarizedColumn {
            name: name.to_string(),
            values,
            is_binary: true,
            mapping: None,
        };
        return Ok((filtered, binarized));
    }

    let descriptor = classify_column(column)?;
    match (role, descriptor.dtype) {
        (ColumnRole::Treatment, ColumnType::Numeric) => {
            return Err(CausalError::InvalidTreatment(name.to_string(), descriptor.nunique))
        }
        (ColumnRole::Treatment, ColumnType::Categorical) if descriptor.nunique != 2 => {
            return Err(CausalError::InvalidTreatment(name.to_string(), descriptor.nunique))
        }
        (ColumnRole::Outcome, ColumnType::Categorical) if descriptor.nunique != 2 => {
            return Err(CausalError::InvalidOutcome(name.to_string(), descriptor.nunique))
        }
        (ColumnRole::Outcome, ColumnType::Numeric) => {
            let values: Vec<f64> = column.values.iter().filter_map(Value::as_f64).collect();
            let binarized = BinarizedColumn {
                name: name.to_string(),
                values,
                is_binary: false,
                mapping: None,
            };
            return Ok((filtered, binarized));
        }
        _ => {}
    }

    let mapping = sorted_mapping(column);
    let values: Vec<f64> = column
        .values
        .iter()
        .filter_map(|v| v.as_str().and_then(|s| mapping.code(s)))
        .collect();
    if verbose {
        info!("replaced {:?} in column \"{}\" with [0, 1]", mapping.values, name);
    }
    filtered.insert_column(Column::new(name, values.clone()))?;
    let binarized = BinarizedColumn {
        name: name.to_string(),
        values,
        is_binary: true,
        mapping: Some(mapping),
    };
    Ok((filtered, binarized))
}

// Callers have checked the column holds exactly two distinct strings.
fn sorted_mapping(column: &Column) -> ValueMapping {
    let mut distinct: Vec<&str> = column.non_null().filter_map(Value::as_str).collect();
    distinct.sort_unstable();
    distinct.dedup();
    ValueMapping {
        column: column.name.clone(),
        values: [distinct[0].to_string(), distinct[1].to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(treatment: Vec<Value>, outcome: Vec<Value>) -> Dataset {
        Dataset::new(vec![Column::new("treatment", treatment), Column::new("outcome", outcome)]).unwrap()
    }

    #[test]
    fn test_treatment_sorted_mapping() {
        let ds = table(
            vec!["treated".into(), "control".into(), "treated".into()],
            vec![1.0.into(), 0.0.into(), 1.0.into()],
        );
        let (out, t) = binarize_column(&ds, "treatment", ColumnRole::Treatment, false).unwrap();
        assert_eq!(t.values, vec![1.0, 0.0, 1.0]);
        assert!(t.is_binary);
        let mapping = t.mapping.unwrap();
        assert_eq!(mapping.values, ["control".to_string(), "treated".to_string()]);
        assert_eq!(mapping.decode(1.0), Some("treated"));
        assert_eq!(out.get("treatment").unwrap().values[1], Value::Number(0.0));
        // The caller's table keeps its strings.
        assert_eq!(ds.get("treatment").unwrap().values[1], Value::from("control"));
    }

    #[test]
    fn test_treatment_drops_null_rows() {
        let ds = table(
            vec!["b".into(), Value::Null, "a".into()],
            vec![5.0.into(), 6.0.into(), 7.0.into()],
        );
        let (out, t) = binarize_column(&ds, "treatment", ColumnRole::Treatment, false).unwrap();
        assert_eq!(out.n_rows(), 2);
        assert_eq!(t.values, vec![1.0, 0.0]);
        assert_eq!(out.get("outcome").unwrap().values, vec![Value::Number(5.0), Value::Number(7.0)]);
    }

    #[test]
    fn test_treatment_contract_violations() {
        let three = table(vec!["a".into(), "b".into(), "c".into()], vec![0.0.into(), 1.0.into(), 0.0.into()]);
        assert!(matches!(
            binarize_column(&three, "treatment", ColumnRole::Treatment, false),
            Err(CausalError::InvalidTreatment(_, 3))
        ));

        let one = table(vec!["a".into(), "a".into()], vec![0.0.into(), 1.0.into()]);
        assert!(matches!(
            binarize_column(&one, "treatment", ColumnRole::Treatment, false),
            Err(CausalError::InvalidTreatment(_, 1))
        ));

        let numeric = table(vec![1.0.into(), 2.0.into()], vec![0.0.into(), 1.0.into()]);
        assert!(matches!(
            binarize_column(&numeric, "treatment", ColumnRole::Treatment, false),
            Err(CausalError::InvalidTreatment(_, 2))
        ));

        let all_treated = table(vec![1.0.into(), 1.0.into()], vec![0.0.into(), 1.0.into()]);
        assert!(matches!(
            binarize_column(&all_treated, "treatment", ColumnRole::Treatment, false),
            Err(CausalError::InvalidTreatment(_, 1))
        ));
    }

    #[test]
    fn test_binary_passes_through() {
        let ds = table(vec![0.0.into(), 1.0.into()], vec![1.0.into(), 0.0.into()]);
        let (_, o) = binarize_column(&ds, "outcome", ColumnRole::Outcome, false).unwrap();
        assert!(o.is_binary);
        assert!(o.mapping.is_none());
        assert_eq!(o.values, vec![1.0, 0.0]);
    }

    #[test]
    fn test_outcome_categorical_and_numeric() {
        let ds = table(vec![0.0.into(), 1.0.into(), 1.0.into()], vec!["yes".into(), "no".into(), "yes".into()]);
        let (_, o) = binarize_column(&ds, "outcome", ColumnRole::Outcome, false).unwrap();
        assert_eq!(o.values, vec![1.0, 0.0, 1.0]);

        let ds = table(vec![0.0.into(), 1.0.into(), 1.0.into()], vec![1.5.into(), 3.0.into(), 0.0.into()]);
        let (_, o) = binarize_column(&ds, "outcome", ColumnRole::Outcome, false).unwrap();
        assert!(!o.is_binary);
        assert_eq!(o.values, vec![1.5, 3.0, 0.0]);

        let ds = table(vec![0.0.into(), 1.0.into(), 1.0.into()], vec!["a".into(), "b".into(), "c".into()]);
        assert!(matches!(
            binarize_column(&ds, "outcome", ColumnRole::Outcome, false),
            Err(CausalError::InvalidOutcome(_, 3))
        ));
    }

    #[test]
    fn test_all_null_column_is_invalid() {
        let ds = table(vec![Value::Null, Value::Null], vec![0.0.into(), 1.0.into()]);
        assert!(matches!(
            binarize_column(&ds, "treatment", ColumnRole::Treatment, false),
            Err(CausalError::InvalidDataset(_))
        ));
    }
}

//! Feature encoding.
//!
//! Numeric covariates are kept with missing values replaced by a sentinel. Categorical
//! covariates are one-hot encoded over their sorted categories, with the first category
//! dropped as the reference level. The fitted layout is kept so the same encoding can be
//! applied to new tables.
use crate::data::FeatureMatrix;
use crate::dataset::{Dataset, Value};
use crate::errors::CausalError;
use crate::preprocess::classify::{classify_column, ColumnType};
use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

/// How one source column turns into feature columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EncodedColumn {
    /// Passed through, nulls imputed.
    Numeric { source: String },
    /// One indicator per category except `reference`.
    OneHot {
        source: String,
        reference: String,
        categories: Vec<String>,
    },
}

impl EncodedColumn {
    pub fn source(&self) -> &str {
        match self {
            EncodedColumn::Numeric { source } => source,
            EncodedColumn::OneHot { source, .. } => source,
        }
    }

    fn feature_names(&self) -> Vec<String> {
        match self {
            EncodedColumn::Numeric { source } => vec![source.clone()],
            EncodedColumn::OneHot { source, categories, .. } => {
                categories.iter().map(|c| format!("{}_{}", source, c)).collect()
            }
        }
    }
}

/// Imputes and one-hot encodes covariates into a [`FeatureMatrix`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureEncoder {
    na_cont_value: f64,
    na_cat_value: String,
    columns: Vec<EncodedColumn>,
}

impl FeatureEncoder {
    /// * `na_cont_value` - Replacement for missing numeric values.
    /// * `na_cat_value` - Category given to missing categorical values.
    pub fn new<S: Into<String>>(na_cont_value: f64, na_cat_value: S) -> Self {
        FeatureEncoder {
            na_cont_value,
            na_cat_value: na_cat_value.into(),
            columns: Vec::new(),
        }
    }

    /// Learn the encoding of `features`, in the order given.
    pub fn fit(&mut self, dataset: &Dataset, features: &[String]) -> Result<(), CausalError> {
        let mut columns = Vec::with_capacity(features.len());
        for name in features {
            let column = dataset.get(name)?;
            let descriptor = classify_column(column)?;
            let encoded = match descriptor.dtype {
                ColumnType::Numeric => EncodedColumn::Numeric { source: name.clone() },
                ColumnType::Categorical => {
                    let mut categories: Vec<String> = column
                        .values
                        .iter()
                        .map(|v| self.category_of(v).to_string())
                        .collect();
                    categories.sort_unstable();
                    categories.dedup();
                    let reference = categories.remove(0);
                    EncodedColumn::OneHot {
                        source: name.clone(),
                        reference,
                        categories,
                    }
                }
            };
            columns.push(encoded);
        }

        let mut seen: HashSet<String> = HashSet::new();
        for name in columns.iter().flat_map(|c| c.feature_names()) {
            if !seen.insert(name.clone()) {
                return Err(CausalError::InvalidDataset(format!(
                    "encoded feature {} is produced by more than one column",
                    name
                )));
            }
        }
        self.columns = columns;
        Ok(())
    }

    /// Encode a table with the fitted layout.
    ///
    /// Categories that were not seen during `fit` encode like the reference category.
    pub fn transform(&self, dataset: &Dataset) -> Result<FeatureMatrix, CausalError> {
        let rows = dataset.n_rows();
        let mut out = Vec::new();
        for encoded in &self.columns {
            let column = dataset.get(encoded.source())?;
            match encoded {
                EncodedColumn::Numeric { source } => {
                    let values = column
                        .values
                        .iter()
                        .map(|v| match v {
                            Value::Number(x) if !x.is_nan() => Ok(*x),
                            Value::Text(_) => Err(CausalError::InvalidColumnType(source.clone())),
                            _ => Ok(self.na_cont_value),
                        })
                        .collect::<Result<Vec<f64>, CausalError>>()?;
                    out.push((source.clone(), values));
                }
                EncodedColumn::OneHot { source, categories, .. } => {
                    let index: HashMap<&str, usize> =
                        categories.iter().enumerate().map(|(i, c)| (c.as_str(), i)).collect();
                    let mut indicators = vec![vec![0.0; rows]; categories.len()];
                    for (i, v) in column.values.iter().enumerate() {
                        if let Value::Number(x) = v {
                            if !x.is_nan() {
                                return Err(CausalError::InvalidColumnType(source.clone()));
                            }
                        }
                        if let Some(&k) = index.get(self.category_of(v)) {
                            indicators[k][i] = 1.0;
                        }
                    }
                    out.extend(
                        categories
                            .iter()
                            .zip(indicators)
                            .map(|(c, ind)| (format!("{}_{}", source, c), ind)),
                    );
                }
            }
        }
        FeatureMatrix::from_columns(out, rows)
    }

    /// Fit the encoder and encode the same table.
    pub fn fit_transform(&mut self, dataset: &Dataset, features: &[String]) -> Result<FeatureMatrix, CausalError> {
        self.fit(dataset, features)?;
        self.transform(dataset)
    }

    /// Names of the encoded feature columns, in output order.
    pub fn feature_names(&self) -> Vec<String> {
        self.columns.iter().flat_map(|c| c.feature_names()).collect()
    }

    pub fn columns(&self) -> &[EncodedColumn] {
        &self.columns
    }

    fn category_of<'a>(&'a self, value: &'a Value) -> &'a str {
        match value {
            Value::Text(s) => s.as_str(),
            _ => self.na_cat_value.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Column;

    fn covariates() -> Dataset {
        Dataset::new(vec![
            Column::new("region", vec![Value::from("west"), Value::Null, Value::from("east"), Value::from("west")]),
            Column::new("age", vec![Value::from(30.0), Value::Null, Value::from(40.0), Value::from(50.0)]),
        ])
        .unwrap()
    }

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_one_hot_drops_first_category_and_imputes() {
        let ds = covariates();
        let mut enc = FeatureEncoder::new(-1.0, "MISSING");
        let fm = enc.fit_transform(&ds, &names(&["region", "age"])).unwrap();
        // Sorted categories: "MISSING", "east", "west" -> "MISSING" is the reference.
        assert_eq!(fm.names(), &names(&["region_east", "region_west", "age"])[..]);
        assert_eq!(fm.column("region_east").unwrap(), &[0.0, 0.0, 1.0, 0.0]);
        assert_eq!(fm.column("region_west").unwrap(), &[1.0, 0.0, 0.0, 1.0]);
        assert_eq!(fm.column("age").unwrap(), &[30.0, -1.0, 40.0, 50.0]);
        assert_eq!(fm.rows(), ds.n_rows());
    }

    #[test]
    fn test_indicators_plus_reference_sum_to_one() {
        let ds = covariates();
        let mut enc = FeatureEncoder::new(-1.0, "MISSING");
        let fm = enc.fit_transform(&ds, &names(&["region"])).unwrap();
        assert_eq!(fm.cols(), 2);
        let reference = &ds.get("region").unwrap().values;
        for i in 0..fm.rows() {
            let row_sum: f64 = fm.as_matrix().get_row(i).iter().sum();
            let is_reference = if reference[i].is_null() { 1.0 } else { 0.0 };
            assert_eq!(row_sum + is_reference, 1.0);
        }
    }

    #[test]
    fn test_colliding_feature_names_fail_fit() {
        let ds = Dataset::new(vec![
            Column::new("region", vec!["east", "west", "east"]),
            Column::new("region_west", vec![1.0, 2.0, 3.0]),
        ])
        .unwrap();
        let mut enc = FeatureEncoder::new(-1.0, "MISSING");
        let res = enc.fit(&ds, &names(&["region", "region_west"]));
        assert!(matches!(res, Err(CausalError::InvalidDataset(msg)) if msg.contains("region_west")));
        assert!(enc.columns().is_empty());
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let ds = covariates();
        let mut a = FeatureEncoder::new(-1.0, "MISSING");
        let mut b = FeatureEncoder::new(-1.0, "MISSING");
        let fa = a.fit_transform(&ds, &names(&["age", "region"])).unwrap();
        let fb = b.fit_transform(&ds, &names(&["age", "region"])).unwrap();
        assert_eq!(fa, fb);
        assert_eq!(fa.names()[0], "age");
    }

    #[test]
    fn test_transform_new_table() {
        let mut enc = FeatureEncoder::new(-1.0, "MISSING");
        enc.fit(&covariates(), &names(&["region", "age"])).unwrap();

        let new = Dataset::new(vec![
            Column::new("age", vec![Value::from(20.0)]),
            Column::new("region", vec![Value::from("north")]),
        ])
        .unwrap();
        let fm = enc.transform(&new).unwrap();
        assert_eq!(fm.values(), &[0.0, 0.0, 20.0]);

        let missing = Dataset::new(vec![Column::new("age", vec![1.0])]).unwrap();
        assert!(matches!(enc.transform(&missing), Err(CausalError::ColumnNotFound(_))));

        let retyped = Dataset::new(vec![
            Column::new("age", vec![Value::from("old")]),
            Column::new("region", vec![Value::from("east")]),
        ])
        .unwrap();
        assert!(matches!(enc.transform(&retyped), Err(CausalError::InvalidColumnType(_))));
    }
}

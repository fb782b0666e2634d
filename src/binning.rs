//! Binning
//!
//! Features are discretized once before boosting. Each column gets a sorted list of cut
//! values; a value falls in bin `k` when exactly `k` cuts are less than or equal to it.
//! Missing values (NaN) always go to bin 0, and trees send them left.
use crate::data::Matrix;
use crate::errors::CausalError;
use rayon::prelude::*;

#[derive(Debug)]
pub struct BinnedData {
    /// Column-major bin indices, same shape as the source matrix.
    pub binned_data: Vec<u16>,
    /// Cut values for each column.
    pub cuts: Vec<Vec<f64>>,
    pub rows: usize,
    pub cols: usize,
}

impl BinnedData {
    /// Bin indices of one column.
    pub fn get_col(&self, col: usize) -> &[u16] {
        &self.binned_data[col * self.rows..(col + 1) * self.rows]
    }

    /// Number of bins of a column.
    pub fn n_bins(&self, col: usize) -> usize {
        self.cuts[col].len() + 1
    }
}

/// Bin index of a single value.
#[inline]
pub fn map_bin(cuts: &[f64], v: f64) -> u16 {
    if v.is_nan() {
        0
    } else {
        cuts.partition_point(|c| *c <= v) as u16
    }
}

/// If there are fewer unique values than bins, every unique value past the smallest
/// becomes a cut. Otherwise cuts sit at evenly spaced ranks of the sorted column.
fn column_cuts(col: &[f64], max_bin: u16) -> Vec<f64> {
    let mut sorted: Vec<f64> = col.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_unstable_by(|a, b| a.total_cmp(b));
    let mut unique = sorted.clone();
    unique.dedup();
    if unique.len() <= 1 {
        return Vec::new();
    }
    if unique.len() <= max_bin as usize {
        return unique[1..].to_vec();
    }
    let n = sorted.len();
    let nbins = max_bin as usize;
    let mut cuts: Vec<f64> = (1..nbins).map(|i| sorted[i * n / nbins]).collect();
    cuts.dedup();
    cuts.retain(|c| *c > unique[0]);
    cuts
}

/// Bin a numeric matrix.
///
/// * `data` - A numeric matrix, of data to be binned.
/// * `max_bin` - The maximum number of bins each column can be split into.
pub fn bin_matrix(data: &Matrix<f64>, max_bin: u16) -> Result<BinnedData, CausalError> {
    if max_bin < 2 {
        return Err(CausalError::InvalidParameter(
            "max_bin".to_string(),
            "a value of at least 2".to_string(),
            max_bin.to_string(),
        ));
    }
    let cuts: Vec<Vec<f64>> = (0..data.cols)
        .into_par_iter()
        .map(|j| column_cuts(data.get_col(j), max_bin))
        .collect();
    let binned_data: Vec<u16> = (0..data.cols)
        .into_par_iter()
        .flat_map_iter(|j| {
            let col_cuts = &cuts[j];
            data.get_col(j).iter().map(move |v| map_bin(col_cuts, *v))
        })
        .collect();
    Ok(BinnedData {
        binned_data,
        cuts,
        rows: data.rows,
        cols: data.cols,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_few_unique_values() {
        let v = vec![3.0, 1.0, 2.0, 1.0, f64::NAN];
        let m = Matrix::new(&v, 5, 1);
        let b = bin_matrix(&m, 255).unwrap();
        assert_eq!(b.cuts[0], vec![2.0, 3.0]);
        assert_eq!(b.get_col(0), &[2, 0, 1, 0, 0]);
        assert_eq!(b.n_bins(0), 3);
    }

    #[test]
    fn test_quantile_cuts_are_bounded() {
        let v: Vec<f64> = (0..1000).map(|i| i as f64).collect();
        let m = Matrix::new(&v, 1000, 1);
        let b = bin_matrix(&m, 10).unwrap();
        assert!(b.n_bins(0) <= 10);
        assert!(b.cuts[0].windows(2).all(|w| w[0] < w[1]));
        assert_eq!(*b.get_col(0).first().unwrap(), 0);
        assert_eq!(*b.get_col(0).last().unwrap() as usize, b.n_bins(0) - 1);
    }

    #[test]
    fn test_constant_column_single_bin() {
        let v = vec![5.0; 4];
        let m = Matrix::new(&v, 4, 1);
        let b = bin_matrix(&m, 16).unwrap();
        assert!(b.cuts[0].is_empty());
        assert!(b.get_col(0).iter().all(|&x| x == 0));
    }

    #[test]
    fn test_invalid_max_bin() {
        let v = vec![1.0];
        let m = Matrix::new(&v, 1, 1);
        assert!(bin_matrix(&m, 1).is_err());
    }
}

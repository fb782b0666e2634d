//! Tree
//!
//! Depth-limited regression trees grown on binned data from gradient and hessian
//! statistics. Leaf weights are the regularized Newton step `-G / (H + lambda)`,
//! scaled by the learning rate.
use crate::binning::BinnedData;
use crate::constants::HESSIAN_EPS;
use crate::data::Matrix;
use crate::utils::nan_as_null;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TreeParams {
    /// Maximum depth of a leaf; the root is depth 0.
    pub max_depth: usize,
    /// Minimum hessian sum on each side of a split.
    pub min_child_weight: f64,
    /// Minimum number of rows on each side of a split.
    pub min_samples_leaf: usize,
    /// L2 regularization on leaf weights.
    pub lambda: f64,
    /// Minimum gain for a split to be kept.
    pub gamma: f64,
    /// Shrinkage applied to leaf weights.
    pub eta: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub num: usize,
    pub weight_value: f64,
    pub hessian_sum: f64,
    pub depth: usize,
    pub split_feature: usize,
    /// Rows with a value below this go left, as do missing values. NaN on leaves.
    #[serde(with = "nan_as_null")]
    pub split_value: f64,
    pub split_gain: f64,
    pub left_child: usize,
    pub right_child: usize,
    pub is_leaf: bool,
}

impl Node {
    fn leaf(num: usize, weight_value: f64, hessian_sum: f64, depth: usize) -> Self {
        Node {
            num,
            weight_value,
            hessian_sum,
            depth,
            split_feature: 0,
            split_value: f64::NAN,
            split_gain: 0.0,
            left_child: 0,
            right_child: 0,
            is_leaf: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitInfo {
    feature: usize,
    /// Rows in bins below this go left.
    bin: u16,
    gain: f64,
    left_gradient: f64,
    left_hessian: f64,
    right_gradient: f64,
    right_hessian: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

#[inline]
fn leaf_weight(gradient_sum: f64, hessian_sum: f64, params: &TreeParams) -> f64 {
    -gradient_sum / (hessian_sum + params.lambda).max(HESSIAN_EPS) * params.eta
}

#[inline]
fn score(gradient_sum: f64, hessian_sum: f64, lambda: f64) -> f64 {
    gradient_sum * gradient_sum / (hessian_sum + lambda).max(HESSIAN_EPS)
}

impl Tree {
    pub fn new() -> Self {
        Tree { nodes: Vec::new() }
    }

    /// Grow the tree on the rows in `index`.
    ///
    /// * `binned` - Binned training features.
    /// * `index` - Rows used to grow this tree.
    /// * `grad` - Gradient of every training row.
    /// * `hess` - Hessian of every training row.
    /// * `params` - Growth and regularization settings.
    pub fn fit(&mut self, binned: &BinnedData, index: Vec<usize>, grad: &[f64], hess: &[f64], params: &TreeParams) {
        let g_root: f64 = index.iter().map(|&i| grad[i]).sum();
        let h_root: f64 = index.iter().map(|&i| hess[i]).sum();
        self.nodes = vec![Node::leaf(0, leaf_weight(g_root, h_root, params), h_root, 0)];

        let min_rows = 2 * params.min_samples_leaf.max(1);
        let mut stack = vec![(0usize, index)];
        while let Some((n, idx)) = stack.pop() {
            let depth = self.nodes[n].depth;
            if depth >= params.max_depth || idx.len() < min_rows {
                continue;
            }
            let Some(split) = best_split(binned, &idx, grad, hess, params) else {
                continue;
            };

            let col = binned.get_col(split.feature);
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = idx.into_iter().partition(|&i| col[i] < split.bin);

            let l = self.nodes.len();
            let r = l + 1;
            self.nodes.push(Node::leaf(
                l,
                leaf_weight(split.left_gradient, split.left_hessian, params),
                split.left_hessian,
                depth + 1,
            ));
            self.nodes.push(Node::leaf(
                r,
                leaf_weight(split.right_gradient, split.right_hessian, params),
                split.right_hessian,
                depth + 1,
            ));

            let node = &mut self.nodes[n];
            node.is_leaf = false;
            node.split_feature = split.feature;
            node.split_value = binned.cuts[split.feature][split.bin as usize - 1];
            node.split_gain = split.gain;
            node.left_child = l;
            node.right_child = r;

            stack.push((r, right_idx));
            stack.push((l, left_idx));
        }
    }

    /// Raw score of one row, reading feature `j` through `value`.
    #[inline]
    fn predict_row<F: Fn(usize) -> f64>(&self, value: F) -> f64 {
        let mut node = match self.nodes.first() {
            Some(n) => n,
            None => return 0.0,
        };
        while !node.is_leaf {
            let v = value(node.split_feature);
            node = if v.is_nan() || v < node.split_value {
                &self.nodes[node.left_child]
            } else {
                &self.nodes[node.right_child]
            };
        }
        node.weight_value
    }

    /// Predict every row of `data`.
    ///
    /// * `data` - Raw (unbinned) features.
    /// * `parallel` - Predict rows in parallel.
    pub fn predict(&self, data: &Matrix<f64>, parallel: bool) -> Vec<f64> {
        if parallel {
            (0..data.rows)
                .into_par_iter()
                .map(|i| self.predict_row(|j| *data.get(i, j)))
                .collect()
        } else {
            (0..data.rows)
                .map(|i| self.predict_row(|j| *data.get(i, j)))
                .collect()
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf).count()
    }
}

fn best_split(
    binned: &BinnedData,
    index: &[usize],
    grad: &[f64],
    hess: &[f64],
    params: &TreeParams,
) -> Option<SplitInfo> {
    let g_total: f64 = index.iter().map(|&i| grad[i]).sum();
    let h_total: f64 = index.iter().map(|&i| hess[i]).sum();
    let parent_score = score(g_total, h_total, params.lambda);

    let candidates: Vec<Option<SplitInfo>> = (0..binned.cols)
        .into_par_iter()
        .map(|feature| {
            let n_bins = binned.n_bins(feature);
            if n_bins < 2 {
                return None;
            }
            let col = binned.get_col(feature);
            let mut g_hist = vec![0.0; n_bins];
            let mut h_hist = vec![0.0; n_bins];
            let mut c_hist = vec![0usize; n_bins];
            for &i in index {
                let b = col[i] as usize;
                g_hist[b] += grad[i];
                h_hist[b] += hess[i];
                c_hist[b] += 1;
            }

            let mut best: Option<SplitInfo> = None;
            let (mut gl, mut hl, mut cl) = (0.0, 0.0, 0usize);
            for k in 1..n_bins {
                gl += g_hist[k - 1];
                hl += h_hist[k - 1];
                cl += c_hist[k - 1];
                let (gr, hr, cr) = (g_total - gl, h_total - hl, index.len() - cl);
                if cl < params.min_samples_leaf.max(1) || cr < params.min_samples_leaf.max(1) {
                    continue;
                }
                if hl < params.min_child_weight || hr < params.min_child_weight {
                    continue;
                }
                let gain = 0.5 * (score(gl, hl, params.lambda) + score(gr, hr, params.lambda) - parent_score)
                    - params.gamma;
                if gain > 0.0 && best.map_or(true, |b| gain > b.gain) {
                    best = Some(SplitInfo {
                        feature,
                        bin: k as u16,
                        gain,
                        left_gradient: gl,
                        left_hessian: hl,
                        right_gradient: gr,
                        right_hessian: hr,
                    });
                }
            }
            best
        })
        .collect();

    // Sequential reduction keeps ties on the lowest feature index.
    candidates
        .into_iter()
        .flatten()
        .fold(None, |acc: Option<SplitInfo>, s| match acc {
            Some(a) if a.gain >= s.gain => Some(a),
            _ => Some(s),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binning::bin_matrix;

    fn params() -> TreeParams {
        TreeParams {
            max_depth: 1,
            min_child_weight: 0.0,
            min_samples_leaf: 1,
            lambda: 0.0,
            gamma: 0.0,
            eta: 1.0,
        }
    }

    #[test]
    fn test_single_split() {
        let x = vec![1.0, 2.0, 3.0, 4.0];
        let m = Matrix::new(&x, 4, 1);
        let binned = bin_matrix(&m, 255).unwrap();
        let y = [0.0, 0.0, 10.0, 10.0];
        let grad: Vec<f64> = y.iter().map(|v| -v).collect();
        let hess = vec![1.0; 4];

        let mut tree = Tree::new();
        tree.fit(&binned, (0..4).collect(), &grad, &hess, &params());
        assert_eq!(tree.nodes.len(), 3);
        assert_eq!(tree.nodes[0].split_value, 3.0);
        assert_eq!(tree.predict(&m, false), vec![0.0, 0.0, 10.0, 10.0]);
        assert_eq!(tree.predict(&m, true), vec![0.0, 0.0, 10.0, 10.0]);
    }

    #[test]
    fn test_missing_goes_left() {
        let x = vec![1.0, 2.0, 3.0, 4.0];
        let m = Matrix::new(&x, 4, 1);
        let binned = bin_matrix(&m, 255).unwrap();
        let grad = vec![0.0, 0.0, -10.0, -10.0];
        let mut tree = Tree::new();
        tree.fit(&binned, (0..4).collect(), &grad, &[1.0; 4], &params());

        let missing = vec![f64::NAN];
        let preds = tree.predict(&Matrix::new(&missing, 1, 1), false);
        assert_eq!(preds, vec![0.0]);
    }

    #[test]
    fn test_min_samples_leaf_blocks_split() {
        let x = vec![1.0, 2.0, 3.0, 4.0];
        let m = Matrix::new(&x, 4, 1);
        let binned = bin_matrix(&m, 255).unwrap();
        let mut p = params();
        p.min_samples_leaf = 3;
        let mut tree = Tree::new();
        tree.fit(&binned, (0..4).collect(), &[1.0, 1.0, -1.0, -1.0], &[1.0; 4], &p);
        assert_eq!(tree.n_leaves(), 1);
    }
}

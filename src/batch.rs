//! Batch-axis bookkeeping for routing.
//!
//! Routing splits a batch into per-child groups, evaluates each group
//! separately and then restores the original sample order. The helpers here
//! keep that bookkeeping explicit:
//!
//! ```text
//! decisions:  [1, 0, 1, 1, 0]
//! groups:     [[1, 4], [0, 2, 3]]          (order preserved inside each group)
//! order:      [1, 4, 0, 2, 3]              (groups concatenated)
//! inverse:    [2, 0, 3, 4, 1]              (inverse[order[j]] = j)
//! ```
//!
//! Selecting the grouped rows with `inverse` puts row `b` back at position `b`.

use ndarray::{Array2, ArrayD, ArrayView2, ArrayViewD, Axis};

/// Flatten every sample of a `[B, ...]` batch into a row of `[B, prod(...)]`.
///
/// A rank-1 batch becomes a single column.
pub fn flatten_batch(batch: ArrayViewD<'_, f32>) -> Array2<f32> {
    let n_rows = batch.shape().first().copied().unwrap_or(0);
    let n_cols: usize = batch.shape().iter().skip(1).product();
    let data: Vec<f32> = batch.iter().copied().collect();
    Array2::from_shape_vec((n_rows, n_cols), data)
        .expect("a batch holds n_rows * prod(sample_shape) elements")
}

/// Index of the largest value per row. Ties resolve to the first maximum;
/// NaN never wins against a number.
pub fn argmax_rows(values: ArrayView2<'_, f32>) -> Vec<usize> {
    values
        .rows()
        .into_iter()
        .map(|row| {
            let mut best = 0;
            let mut best_value = f32::NEG_INFINITY;
            for (idx, &v) in row.iter().enumerate() {
                if v > best_value {
                    best = idx;
                    best_value = v;
                }
            }
            best
        })
        .collect()
}

/// Partition sample indices by their decision, preserving batch order
/// inside each group. Decisions outside `0..n_groups` are ignored.
pub fn partition_by_decision(decisions: &[usize], n_groups: usize) -> Vec<Vec<usize>> {
    let mut groups = vec![Vec::new(); n_groups];
    for (sample, &decision) in decisions.iter().enumerate() {
        if let Some(group) = groups.get_mut(decision) {
            group.push(sample);
        }
    }
    groups
}

/// Gather the given rows of a batch, in the given order.
pub fn gather_rows(batch: ArrayViewD<'_, f32>, rows: &[usize]) -> ArrayD<f32> {
    batch.select(Axis(0), rows)
}

/// Inverse of a permutation of `0..order.len()`.
///
/// # Panics
///
/// Panics (in debug builds) if `order` is not a permutation.
pub fn invert_permutation(order: &[usize]) -> Vec<usize> {
    let mut inverse = vec![usize::MAX; order.len()];
    for (position, &sample) in order.iter().enumerate() {
        inverse[sample] = position;
    }
    debug_assert!(
        inverse.iter().all(|&p| p != usize::MAX),
        "order is not a permutation: {order:?}"
    );
    inverse
}

/// Copy `values` into a `[n_rows, width]` array, zero-filling extra columns.
pub fn pad_columns(values: ArrayView2<'_, f32>, width: usize) -> Array2<f32> {
    debug_assert!(values.ncols() <= width);
    let mut padded = Array2::zeros((values.nrows(), width));
    padded
        .slice_mut(ndarray::s![.., ..values.ncols()])
        .assign(&values);
    padded
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array, IxDyn};

    #[test]
    fn flatten_keeps_row_major_order() {
        let batch = Array::from_shape_fn(IxDyn(&[2, 2, 3]), |ix| {
            (ix[0] * 100 + ix[1] * 10 + ix[2]) as f32
        });
        let flat = flatten_batch(batch.view());
        assert_eq!(flat.dim(), (2, 6));
        assert_eq!(flat.row(1).to_vec(), vec![100.0, 101.0, 102.0, 110.0, 111.0, 112.0]);
    }

    #[test]
    fn flatten_rank_one_is_single_column() {
        let batch = ArrayD::from_shape_vec(IxDyn(&[3]), vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(flatten_batch(batch.view()), array![[1.0], [2.0], [3.0]]);
    }

    #[test]
    fn flatten_empty_batch() {
        let batch = ArrayD::<f32>::zeros(IxDyn(&[0, 5, 51]));
        assert_eq!(flatten_batch(batch.view()).dim(), (0, 255));
    }

    #[test]
    fn argmax_first_max_wins() {
        let values = array![[0.2, 0.5, 0.5], [0.9, 0.1, 0.0], [f32::NAN, 0.1, 0.0]];
        assert_eq!(argmax_rows(values.view()), vec![1, 0, 1]);
    }

    #[test]
    fn partition_preserves_order() {
        let groups = partition_by_decision(&[1, 0, 1, 1, 0], 3);
        assert_eq!(groups, vec![vec![1, 4], vec![0, 2, 3], vec![]]);
    }

    #[test]
    fn inverse_restores_order() {
        let order = [1, 4, 0, 2, 3];
        let inverse = invert_permutation(&order);
        assert_eq!(inverse, vec![2, 0, 3, 4, 1]);
        for (b, &p) in inverse.iter().enumerate() {
            assert_eq!(order[p], b);
        }
    }

    #[test]
    fn gather_selects_rows() {
        let batch = Array::from_shape_fn(IxDyn(&[4, 2]), |ix| (ix[0] * 2 + ix[1]) as f32);
        let picked = gather_rows(batch.view(), &[3, 0]);
        assert_eq!(picked.shape(), &[2, 2]);
        assert_eq!(picked.iter().copied().collect::<Vec<_>>(), vec![6.0, 7.0, 0.0, 1.0]);
    }

    #[test]
    fn pad_columns_zero_fills() {
        let padded = pad_columns(array![[1.0], [2.0]].view(), 3);
        assert_eq!(padded, array![[1.0, 0.0, 0.0], [2.0, 0.0, 0.0]]);
    }
}

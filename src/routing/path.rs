//! Per-sample decision trails produced by routing.

use ndarray::{s, Array2, Array3, ArrayView2, ArrayView3, Axis};

use crate::batch::{invert_permutation, pad_columns};

/// Decision trail of every sample in a batch, from the node that produced it
/// down to the leaf each sample reached.
///
/// `trails` has shape `[n_samples, max_depth, width]`:
///
/// ```text
/// trails[[b, 0, ..]]          decision vector of the producing node
/// trails[[b, d, ..]]          decision vector d levels below
/// trails[[b, depths[b].., ..]] zero padding (sample reached a shallower leaf)
/// ```
///
/// Decision vectors narrower than `width` are zero-padded on the last axis.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionPath {
    trails: Array3<f32>,
    depths: Vec<usize>,
    leaves: Vec<usize>,
}

impl DecisionPath {
    /// Single-level path: one decision vector per sample, all at `leaf`.
    pub fn leaf(decisions: ArrayView2<'_, f32>, width: usize, leaf: usize) -> Self {
        let n_samples = decisions.nrows();
        let padded = pad_columns(decisions, width);
        let trails = padded.insert_axis(Axis(1));
        Self {
            trails,
            depths: vec![1; n_samples],
            leaves: vec![leaf; n_samples],
        }
    }

    /// Path for a batch with no samples.
    pub fn empty(max_depth: usize, width: usize) -> Self {
        Self {
            trails: Array3::zeros((0, max_depth, width)),
            depths: Vec::new(),
            leaves: Vec::new(),
        }
    }

    /// Stack `parts` along the batch axis, zero-padding each to `max_depth`.
    pub(crate) fn concat(parts: &[DecisionPath], max_depth: usize, width: usize) -> Self {
        let n_samples = parts.iter().map(DecisionPath::n_samples).sum();
        let mut trails = Array3::zeros((n_samples, max_depth, width));
        let mut depths = Vec::with_capacity(n_samples);
        let mut leaves = Vec::with_capacity(n_samples);

        let mut row = 0;
        for part in parts {
            let (rows, depth, part_width) = part.trails.dim();
            debug_assert!(depth <= max_depth && part_width == width);
            trails
                .slice_mut(s![row..row + rows, ..depth, ..])
                .assign(&part.trails);
            depths.extend_from_slice(&part.depths);
            leaves.extend_from_slice(&part.leaves);
            row += rows;
        }

        Self {
            trails,
            depths,
            leaves,
        }
    }

    /// Undo a grouping: row `j` of `self` belongs to sample `order[j]`.
    pub(crate) fn scatter(&self, order: &[usize]) -> Self {
        debug_assert_eq!(order.len(), self.n_samples());
        let inverse = invert_permutation(order);
        Self {
            trails: self.trails.select(Axis(0), &inverse),
            depths: inverse.iter().map(|&j| self.depths[j]).collect(),
            leaves: inverse.iter().map(|&j| self.leaves[j]).collect(),
        }
    }

    /// Put one more level of decisions in front of every trail.
    pub(crate) fn prepend(&self, decisions: ArrayView2<'_, f32>) -> Self {
        let (n_samples, depth, width) = self.trails.dim();
        debug_assert_eq!(decisions.nrows(), n_samples);

        let mut trails = Array3::zeros((n_samples, depth + 1, width));
        trails
            .slice_mut(s![.., 0, ..decisions.ncols()])
            .assign(&decisions);
        trails.slice_mut(s![.., 1.., ..]).assign(&self.trails);

        Self {
            trails,
            depths: self.depths.iter().map(|d| d + 1).collect(),
            leaves: self.leaves.clone(),
        }
    }

    /// Number of samples.
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.trails.dim().0
    }

    /// Length of the path axis (longest possible trail).
    #[inline]
    pub fn max_depth(&self) -> usize {
        self.trails.dim().1
    }

    /// Width of each decision vector slot.
    #[inline]
    pub fn width(&self) -> usize {
        self.trails.dim().2
    }

    /// Trail tensor, shape `[n_samples, max_depth, width]`.
    #[inline]
    pub fn trails(&self) -> ArrayView3<'_, f32> {
        self.trails.view()
    }

    /// Number of levels each sample actually traversed.
    #[inline]
    pub fn depths(&self) -> &[usize] {
        &self.depths
    }

    /// Flat index of the leaf each sample reached.
    #[inline]
    pub fn leaves(&self) -> &[usize] {
        &self.leaves
    }

    /// Flatten to `[n_samples, max_depth * width]`.
    pub fn flatten(&self) -> Array2<f32> {
        let (n_samples, depth, width) = self.trails.dim();
        let data: Vec<f32> = self.trails.iter().copied().collect();
        Array2::from_shape_vec((n_samples, depth * width), data)
            .expect("trails hold n_samples * max_depth * width elements")
    }

    /// Consume into `(trails, depths, leaves)`.
    pub fn into_parts(self) -> (Array3<f32>, Vec<usize>, Vec<usize>) {
        (self.trails, self.depths, self.leaves)
    }
}

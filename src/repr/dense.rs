//! Dense (affine) layer used for decision heads, prediction heads and dense
//! node units.

use ndarray::{s, Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::Activation;

/// Affine layer followed by a row-wise [`Activation`].
///
/// Weights are stored as an `Array2<f32>` with shape `[n_inputs + 1, n_outputs]`:
///
/// ```text
/// weights[[input, output]] → coefficient
/// weights[[n_inputs, output]] → bias (last row)
/// ```
///
/// so that `forward(x) = activation(x · weights[:-1, :] + weights[-1, :])`.
///
/// # Example
///
/// ```
/// use arbor_route::repr::{Activation, Dense};
/// use ndarray::array;
///
/// // 2 inputs, 2 outputs
/// let weights = array![
///     [1.0, 0.0],  // input 0
///     [0.0, 1.0],  // input 1
///     [0.0, 0.0],  // bias
/// ];
/// let head = Dense::from_array(weights, Activation::Identity);
///
/// let out = head.forward(array![[3.0, 4.0]].view());
/// assert_eq!(out, array![[3.0, 4.0]]);
/// ```
#[derive(Debug, Clone)]
pub struct Dense {
    /// Weight matrix: shape `[n_inputs + 1, n_outputs]`.
    /// Last row is the bias term.
    weights: Array2<f32>,
    activation: Activation,
}

impl Dense {
    /// Create a layer from an ndarray.
    ///
    /// # Panics
    ///
    /// Panics if the array has no rows (the bias row is required).
    pub fn from_array(weights: Array2<f32>, activation: Activation) -> Self {
        assert!(
            weights.nrows() >= 1,
            "weights must have at least 1 row (bias)"
        );
        Self {
            weights,
            activation,
        }
    }

    /// Create a zero-initialized layer.
    pub fn zeros(n_inputs: usize, n_outputs: usize, activation: Activation) -> Self {
        Self {
            weights: Array2::zeros((n_inputs + 1, n_outputs)),
            activation,
        }
    }

    /// Glorot-uniform weights with zero biases, deterministic in `seed`.
    pub fn glorot(n_inputs: usize, n_outputs: usize, activation: Activation, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let limit = (6.0 / (n_inputs + n_outputs).max(1) as f32).sqrt();
        let width = 2.0 * limit;

        let mut weights = Array2::zeros((n_inputs + 1, n_outputs));
        weights
            .slice_mut(s![..n_inputs, ..])
            .mapv_inplace(|_: f32| -limit + rng.gen::<f32>() * width);

        Self {
            weights,
            activation,
        }
    }

    /// Number of input features.
    #[inline]
    pub fn n_inputs(&self) -> usize {
        self.weights.nrows() - 1
    }

    /// Number of outputs.
    #[inline]
    pub fn n_outputs(&self) -> usize {
        self.weights.ncols()
    }

    #[inline]
    pub fn activation(&self) -> Activation {
        self.activation
    }

    /// Weight matrix excluding the bias row, shape `[n_inputs, n_outputs]`.
    #[inline]
    pub fn weight_matrix(&self) -> ArrayView2<'_, f32> {
        self.weights.slice(s![..self.n_inputs(), ..])
    }

    /// Bias vector of length `n_outputs`.
    #[inline]
    pub fn biases(&self) -> ArrayView1<'_, f32> {
        self.weights.row(self.n_inputs())
    }

    /// Apply the layer to a `[n_rows, n_inputs]` batch.
    ///
    /// Returns `[n_rows, n_outputs]`.
    ///
    /// # Panics
    ///
    /// Panics if `input.ncols() != n_inputs`. Callers size their input from the
    /// same declared shapes the layer was built from.
    pub fn forward(&self, input: ArrayView2<'_, f32>) -> Array2<f32> {
        assert_eq!(
            input.ncols(),
            self.n_inputs(),
            "dense layer expects {} inputs, got {}",
            self.n_inputs(),
            input.ncols()
        );

        let mut output = input.dot(&self.weight_matrix());
        output += &self.biases();
        self.activation.apply_inplace(output.view_mut());
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn forward_adds_bias() {
        let weights = array![[0.5, -1.0], [2.0, 0.0], [1.0, 3.0]];
        let layer = Dense::from_array(weights, Activation::Identity);

        let out = layer.forward(array![[2.0, 1.0], [0.0, 0.0]].view());
        assert_eq!(out, array![[4.0, 1.0], [1.0, 3.0]]);
    }

    #[test]
    fn softmax_head_outputs_distribution() {
        let layer = Dense::glorot(6, 3, Activation::Softmax, 7);
        let input = Array2::from_shape_fn((4, 6), |(r, c)| (r * 6 + c) as f32 * 0.1);

        let out = layer.forward(input.view());
        assert_eq!(out.dim(), (4, 3));
        for row in out.rows() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn glorot_is_deterministic_and_bounded() {
        let a = Dense::glorot(10, 4, Activation::Identity, 42);
        let b = Dense::glorot(10, 4, Activation::Identity, 42);
        let c = Dense::glorot(10, 4, Activation::Identity, 43);

        assert_eq!(a.weight_matrix(), b.weight_matrix());
        assert_ne!(a.weight_matrix(), c.weight_matrix());

        let limit = (6.0f32 / 14.0).sqrt();
        assert!(a.weight_matrix().iter().all(|w| w.abs() <= limit));
        assert!(a.biases().iter().all(|&b| b == 0.0));
    }

    #[test]
    fn empty_batch_forward() {
        let layer = Dense::zeros(3, 2, Activation::Softmax);
        let out = layer.forward(Array2::<f32>::zeros((0, 3)).view());
        assert_eq!(out.dim(), (0, 2));
    }

    #[test]
    #[should_panic(expected = "dense layer expects 3 inputs, got 2")]
    fn panics_on_width_mismatch() {
        let layer = Dense::zeros(3, 1, Activation::Sigmoid);
        layer.forward(Array2::<f32>::zeros((1, 2)).view());
    }
}

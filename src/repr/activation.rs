//! Row-wise activations applied after a dense layer.
//!
//! # Variants
//!
//! - [`Identity`](Activation::Identity): No transformation
//! - [`Relu`](Activation::Relu): `max(0, x)`, used inside dense node units
//! - [`Sigmoid`](Activation::Sigmoid): Logistic sigmoid for single-output heads
//! - [`Softmax`](Activation::Softmax): Softmax for multi-output heads

use ndarray::{ArrayViewMut1, ArrayViewMut2};

/// Activation applied to each row of a dense layer's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Activation {
    /// No transformation; output = pre-activation.
    #[default]
    Identity,

    /// Rectified linear unit.
    Relu,

    /// Logistic sigmoid: output = 1 / (1 + exp(-x)).
    Sigmoid,

    /// Softmax: output_i = exp(x_i) / sum(exp(x_j)).
    Softmax,
}

impl Activation {
    /// Activation used by decision and prediction heads.
    ///
    /// Softmax when choosing among several outputs, sigmoid for a single score.
    #[inline]
    pub fn for_head(n_outputs: usize) -> Self {
        if n_outputs > 1 {
            Activation::Softmax
        } else {
            Activation::Sigmoid
        }
    }

    /// Apply the activation in-place to every row of `output`.
    ///
    /// # Numerical Stability
    ///
    /// - Sigmoid clamps input to [-500, 500] to avoid overflow.
    /// - Softmax subtracts the max per row before exponentiating.
    ///
    /// NaN inputs propagate through without panics.
    pub fn apply_inplace(&self, mut output: ArrayViewMut2<'_, f32>) {
        match self {
            Activation::Identity => {}
            Activation::Relu => output.mapv_inplace(|x| x.max(0.0)),
            Activation::Sigmoid => output.mapv_inplace(sigmoid),
            Activation::Softmax => {
                for row in output.rows_mut() {
                    softmax_inplace(row);
                }
            }
        }
    }
}

/// Numerically stable sigmoid.
#[inline]
fn sigmoid(x: f32) -> f32 {
    let clamped = x.clamp(-500.0, 500.0);
    if clamped >= 0.0 {
        1.0 / (1.0 + (-clamped).exp())
    } else {
        let e = clamped.exp();
        e / (1.0 + e)
    }
}

#[inline]
fn softmax_inplace(mut row: ArrayViewMut1<'_, f32>) {
    if row.is_empty() {
        return;
    }

    let max = row.iter().cloned().fold(f32::NEG_INFINITY, f32::max);

    let mut sum = 0.0f32;
    for x in row.iter_mut() {
        *x = (*x - max).exp();
        sum += *x;
    }

    if sum > 0.0 {
        row.mapv_inplace(|x| x / sum);
    }
}

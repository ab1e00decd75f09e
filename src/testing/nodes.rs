use ndarray::Array2;

use crate::repr::{Activation, Dense, FnNode};

/// Decision head whose output `c` follows input feature `c`.
///
/// For inputs with at least `n_outputs` features the argmax of the head is
/// the argmax of the first `n_outputs` features, so routing can be steered
/// by the sample values alone.
pub fn selector_head(n_inputs: usize, n_outputs: usize) -> Dense {
    let mut weights = Array2::<f32>::zeros((n_inputs + 1, n_outputs));
    for c in 0..n_inputs.min(n_outputs) {
        weights[[c, c]] = 10.0;
    }
    Dense::from_array(weights, Activation::for_head(n_outputs))
}

/// Node unit of shape `[width]` that multiplies every value by `factor`.
///
/// Useful for telling apart routing of inputs and routing of outputs.
pub fn scale_node(width: usize, factor: f32) -> FnNode {
    FnNode::new(format!("scale({factor})"), [width], [width], move |batch| {
        batch.mapv(|x| x * factor)
    })
}

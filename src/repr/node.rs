//! Per-node sub-networks.
//!
//! [`NodeUnit`] is the only capability the tree needs from a node: a
//! batch-preserving transform with fixed per-sample input and output shapes.
//! Concrete architectures live outside this crate; the units here cover
//! demos, tests and simple dense stacks:
//!
//! - [`IdentityNode`]: passes samples through unchanged
//! - [`FnNode`]: wraps a closure
//! - [`DenseNode`]: flatten → [`Dense`] → reshape
//! - [`Chain`]: runs one unit after another (e.g. encoder then decoder)

use std::fmt;

use ndarray::{ArrayD, ArrayViewD, IxDyn};

use super::{Activation, Dense};
use crate::batch::flatten_batch;
use crate::error::{ConfigError, ContractStage, ContractViolation};

// =============================================================================
// NodeUnit Trait
// =============================================================================

/// A batch-to-batch transform with declared per-sample shapes.
///
/// Shapes exclude the batch axis: a unit with `input_shape() == [5, 51]`
/// accepts batches of shape `[B, 5, 51]`. `transform` must return exactly
/// `[B] ++ output_shape()` for a batch of `B` samples, and row `b` of the
/// output must depend only on row `b` of the input.
///
/// A unit that detects a shape problem inside itself (for example between
/// the stages of a [`Chain`]) returns a [`ContractViolation`] instead of
/// panicking. The tree node running the unit attributes it to its index.
///
/// Implementations must be reentrant for a tree to be shared across threads.
pub trait NodeUnit: Send + Sync {
    /// Per-sample input shape.
    fn input_shape(&self) -> &[usize];

    /// Per-sample output shape.
    fn output_shape(&self) -> &[usize];

    /// Transform a batch.
    fn transform(&self, batch: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, ContractViolation>;

    /// Short label for diagnostics.
    fn describe(&self) -> String {
        format!("NodeUnit({:?} -> {:?})", self.input_shape(), self.output_shape())
    }
}

impl<N: NodeUnit + ?Sized> NodeUnit for Box<N> {
    fn input_shape(&self) -> &[usize] {
        (**self).input_shape()
    }

    fn output_shape(&self) -> &[usize] {
        (**self).output_shape()
    }

    fn transform(&self, batch: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, ContractViolation> {
        (**self).transform(batch)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

// =============================================================================
// IdentityNode
// =============================================================================

/// Returns its input unchanged.
#[derive(Debug, Clone)]
pub struct IdentityNode {
    shape: Vec<usize>,
}

impl IdentityNode {
    pub fn new(shape: impl Into<Vec<usize>>) -> Self {
        Self {
            shape: shape.into(),
        }
    }
}

impl NodeUnit for IdentityNode {
    fn input_shape(&self) -> &[usize] {
        &self.shape
    }

    fn output_shape(&self) -> &[usize] {
        &self.shape
    }

    fn transform(&self, batch: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, ContractViolation> {
        Ok(batch.to_owned())
    }

    fn describe(&self) -> String {
        format!("Identity({:?})", self.shape)
    }
}

// =============================================================================
// FnNode
// =============================================================================

type TransformFn = dyn Fn(ArrayViewD<'_, f32>) -> ArrayD<f32> + Send + Sync;

/// Closure-backed node unit.
///
/// The closure itself cannot fail; a wrong output shape is caught by
/// whatever consumes the result.
///
/// # Example
///
/// ```
/// use arbor_route::repr::{FnNode, NodeUnit};
/// use ndarray::ArrayD;
///
/// let double = FnNode::new("double", [3], [3], |batch| batch.mapv(|x| x * 2.0));
/// let out = double.transform(ArrayD::ones(vec![2, 3]).view()).unwrap();
/// assert!(out.iter().all(|&x| x == 2.0));
/// ```
pub struct FnNode {
    name: String,
    input_shape: Vec<usize>,
    output_shape: Vec<usize>,
    f: Box<TransformFn>,
}

impl FnNode {
    pub fn new<F>(
        name: impl Into<String>,
        input_shape: impl Into<Vec<usize>>,
        output_shape: impl Into<Vec<usize>>,
        f: F,
    ) -> Self
    where
        F: Fn(ArrayViewD<'_, f32>) -> ArrayD<f32> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            input_shape: input_shape.into(),
            output_shape: output_shape.into(),
            f: Box::new(f),
        }
    }
}

impl fmt::Debug for FnNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnNode")
            .field("name", &self.name)
            .field("input_shape", &self.input_shape)
            .field("output_shape", &self.output_shape)
            .finish_non_exhaustive()
    }
}

impl NodeUnit for FnNode {
    fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    fn output_shape(&self) -> &[usize] {
        &self.output_shape
    }

    fn transform(&self, batch: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, ContractViolation> {
        Ok((self.f)(batch))
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

// =============================================================================
// DenseNode
// =============================================================================

/// Flattens each sample, applies a [`Dense`] layer and reshapes the result.
#[derive(Debug, Clone)]
pub struct DenseNode {
    input_shape: Vec<usize>,
    output_shape: Vec<usize>,
    layer: Dense,
}

impl DenseNode {
    /// Glorot-initialised dense unit.
    pub fn new(
        input_shape: impl Into<Vec<usize>>,
        output_shape: impl Into<Vec<usize>>,
        activation: Activation,
        seed: u64,
    ) -> Self {
        let input_shape = input_shape.into();
        let output_shape = output_shape.into();
        let layer = Dense::glorot(
            input_shape.iter().product(),
            output_shape.iter().product(),
            activation,
            seed,
        );
        Self {
            input_shape,
            output_shape,
            layer,
        }
    }

    /// Dense unit with explicit weights.
    ///
    /// Fails if the layer's width does not match the flattened shapes.
    pub fn with_layer(
        input_shape: impl Into<Vec<usize>>,
        output_shape: impl Into<Vec<usize>>,
        layer: Dense,
    ) -> Result<Self, ConfigError> {
        let input_shape = input_shape.into();
        let output_shape = output_shape.into();
        let n_in: usize = input_shape.iter().product();
        let n_out: usize = output_shape.iter().product();
        if layer.n_inputs() != n_in || layer.n_outputs() != n_out {
            return Err(ConfigError::LayerMismatch {
                expected: (n_in, n_out),
                actual: (layer.n_inputs(), layer.n_outputs()),
            });
        }
        Ok(Self {
            input_shape,
            output_shape,
            layer,
        })
    }

    pub fn layer(&self) -> &Dense {
        &self.layer
    }
}

impl NodeUnit for DenseNode {
    fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    fn output_shape(&self) -> &[usize] {
        &self.output_shape
    }

    fn transform(&self, batch: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, ContractViolation> {
        ContractViolation::check(ContractStage::Input, batch.shape(), &self.input_shape)?;

        let n_rows = batch.shape()[0];
        let out = self.layer.forward(flatten_batch(batch).view());

        let mut shape = Vec::with_capacity(self.output_shape.len() + 1);
        shape.push(n_rows);
        shape.extend_from_slice(&self.output_shape);
        let actual = out.shape().to_vec();
        out.into_shape_with_order(IxDyn(&shape))
            .map_err(|_| ContractViolation {
                index: 0,
                stage: ContractStage::Output,
                expected: shape,
                actual,
            })
    }

    fn describe(&self) -> String {
        format!(
            "Dense({:?} -> {:?}, {:?})",
            self.input_shape,
            self.output_shape,
            self.layer.activation()
        )
    }
}

// =============================================================================
// Chain
// =============================================================================

/// Runs `first`, then feeds its output to `second`.
pub struct Chain {
    first: Box<dyn NodeUnit>,
    second: Box<dyn NodeUnit>,
}

impl Chain {
    /// Compose two units. Fails if `first`'s output shape is not `second`'s
    /// input shape.
    pub fn new(first: Box<dyn NodeUnit>, second: Box<dyn NodeUnit>) -> Result<Self, ConfigError> {
        if first.output_shape() != second.input_shape() {
            return Err(ConfigError::ChainMismatch {
                expected: first.output_shape().to_vec(),
                actual: second.input_shape().to_vec(),
            });
        }
        Ok(Self { first, second })
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Chain({} -> {})", self.first.describe(), self.second.describe())
    }
}

impl NodeUnit for Chain {
    fn input_shape(&self) -> &[usize] {
        self.first.input_shape()
    }

    fn output_shape(&self) -> &[usize] {
        self.second.output_shape()
    }

    /// Fails if `first` returns anything but `[B] ++ first.output_shape()`,
    /// before `second` ever sees it.
    fn transform(&self, batch: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, ContractViolation> {
        let hidden = self.first.transform(batch)?;
        ContractViolation::check(ContractStage::Output, hidden.shape(), self.first.output_shape())?;
        self.second.transform(hidden.view())
    }

    fn describe(&self) -> String {
        format!("{} -> {}", self.first.describe(), self.second.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    #[test]
    fn identity_round_trips() {
        let node = IdentityNode::new([2, 3]);
        let batch = Array::from_shape_fn(IxDyn(&[4, 2, 3]), |ix| ix[0] as f32 + ix[2] as f32);
        assert_eq!(node.transform(batch.view()).unwrap(), batch);
        assert_eq!(node.describe(), "Identity([2, 3])");
    }

    #[test]
    fn dense_node_reshapes_output() {
        let node = DenseNode::new([5, 4], [2, 3], Activation::Relu, 1);
        let batch = ArrayD::<f32>::ones(IxDyn(&[7, 5, 4]));
        let out = node.transform(batch.view()).unwrap();
        assert_eq!(out.shape(), &[7, 2, 3]);
        assert!(out.iter().all(|&x| x >= 0.0));
    }

    #[test]
    fn dense_node_rejects_wrong_layer() {
        let err = DenseNode::with_layer([3], [2], Dense::zeros(4, 2, Activation::Identity))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::LayerMismatch {
                expected: (3, 2),
                actual: (4, 2)
            }
        );
    }

    #[test]
    fn chain_composes_encoder_decoder() {
        let encoder = DenseNode::new([5, 51], [16], Activation::Relu, 3);
        let decoder = DenseNode::new([16], [5, 51], Activation::Identity, 4);
        let chain = Chain::new(Box::new(encoder), Box::new(decoder)).unwrap();

        assert_eq!(chain.input_shape(), &[5, 51]);
        assert_eq!(chain.output_shape(), &[5, 51]);

        let out = chain
            .transform(ArrayD::<f32>::zeros(IxDyn(&[3, 5, 51])).view())
            .unwrap();
        assert_eq!(out.shape(), &[3, 5, 51]);
    }

    #[test]
    fn dense_node_reports_wrong_input() {
        let node = DenseNode::new([3], [3], Activation::Identity, 2);
        let err = node
            .transform(ArrayD::<f32>::zeros(IxDyn(&[2, 7])).view())
            .unwrap_err();
        assert_eq!(
            err,
            ContractViolation {
                index: 0,
                stage: ContractStage::Input,
                expected: vec![2, 3],
                actual: vec![2, 7],
            }
        );
    }

    #[test]
    fn chain_reports_misshaped_intermediate() {
        let encoder = FnNode::new("widen", [3], [3], |b| {
            ArrayD::zeros(IxDyn(&[b.shape()[0], 7]))
        });
        let decoder = DenseNode::new([3], [3], Activation::Identity, 5);
        let chain = Chain::new(Box::new(encoder), Box::new(decoder)).unwrap();

        let err = chain
            .transform(ArrayD::<f32>::zeros(IxDyn(&[2, 3])).view())
            .unwrap_err();
        assert_eq!(err.stage, ContractStage::Output);
        assert_eq!(err.expected, vec![2, 3]);
        assert_eq!(err.actual, vec![2, 7]);
    }

    #[test]
    fn chain_rejects_mismatched_units() {
        let err = Chain::new(
            Box::new(IdentityNode::new([4])),
            Box::new(IdentityNode::new([5])),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ChainMismatch { .. }));
    }

    #[test]
    fn fn_node_uses_name() {
        let node = FnNode::new("negate", [2], [2], |b| b.mapv(|x| -x));
        assert_eq!(node.describe(), "negate");
        let out = node.transform(ArrayD::<f32>::ones(IxDyn(&[1, 2])).view()).unwrap();
        assert!(out.iter().all(|&x| x == -1.0));
    }
}

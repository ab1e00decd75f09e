//! Root-level model: routing tree plus prediction head.

use std::fmt;

use ndarray::{Array2, ArrayViewD};

use super::TreeShape;
use crate::error::{ConfigError, Result};
use crate::repr::{Activation, Dense};
use crate::routing::{DecisionPath, RoutingWrapper};

/// Diagnostic record of one tree node, in flat construction order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSummary {
    pub index: usize,
    pub is_leaf: bool,
    pub output_dim: usize,
    pub depth_remaining: isize,
    pub children: Vec<usize>,
    pub description: String,
}

impl NodeSummary {
    fn of(node: &RoutingWrapper) -> Self {
        Self {
            index: node.index(),
            is_leaf: node.is_leaf(),
            output_dim: node.output_dim(),
            depth_remaining: node.depth_remaining(),
            children: node.children().iter().map(RoutingWrapper::index).collect(),
            description: node.node().describe(),
        }
    }
}

/// A routing tree with a dense prediction head over the flattened decision
/// trail.
///
/// ```text
/// inputs [B, ...] → root.call → trails [B, depth, width]
///                 → flatten   → [B, depth * width]
///                 → head      → [B, output_dim]   (softmax, or sigmoid if output_dim == 1)
/// ```
///
/// The model owns the whole tree; nothing is mutated by a call.
pub struct TreeModel {
    root: RoutingWrapper,
    output_dim: usize,
    head: Dense,
    registry: Vec<NodeSummary>,
    shape: Option<TreeShape>,
}

impl TreeModel {
    /// Wrap an assembled tree.
    ///
    /// Every internal node must already own all its children, since the
    /// prediction head is sized from the tree's depth.
    pub fn new(root: RoutingWrapper, output_dim: usize, seed: u64) -> Result<Self, ConfigError> {
        if output_dim < 1 {
            return Err(ConfigError::InvalidOutputDim {
                field: "output_dim",
                value: output_dim,
            });
        }
        if let Some(node) = root.find_incomplete() {
            return Err(ConfigError::MissingChildren {
                index: node.index(),
                n_children: node.children().len(),
                expected: node.output_dim(),
            });
        }

        let n_inputs = root.max_depth() * root.path_width();
        let head = Dense::glorot(n_inputs, output_dim, Activation::for_head(output_dim), seed);

        let mut registry = Vec::new();
        root.walk(&mut |node| registry.push(NodeSummary::of(node)));
        registry.sort_by_key(|summary| summary.index);

        Ok(Self {
            root,
            output_dim,
            head,
            registry,
            shape: None,
        })
    }

    pub(crate) fn set_shape(&mut self, shape: TreeShape) {
        self.shape = Some(shape);
    }

    /// Replace the prediction head. It must read `depth * path_width` inputs
    /// and emit `output_dim` values.
    pub fn with_head(mut self, head: Dense) -> Result<Self, ConfigError> {
        let expected = (self.head.n_inputs(), self.output_dim);
        let actual = (head.n_inputs(), head.n_outputs());
        if expected != actual {
            return Err(ConfigError::HeadMismatch {
                owner: "tree".to_string(),
                expected,
                actual,
            });
        }
        self.head = head;
        Ok(self)
    }

    // =========================================================================
    // Evaluation
    // =========================================================================

    /// Predict a batch. Returns `[B, output_dim]`.
    pub fn call(&self, inputs: ArrayViewD<'_, f32>) -> Result<Array2<f32>> {
        let path = self.decision_paths(inputs)?;
        Ok(self.head.forward(path.flatten().view()))
    }

    /// Decision trail of every sample, before the prediction head.
    pub fn decision_paths(&self, inputs: ArrayViewD<'_, f32>) -> Result<DecisionPath> {
        self.root.call(inputs)
    }

    /// Flat index of the leaf each sample is routed to.
    pub fn route(&self, inputs: ArrayViewD<'_, f32>) -> Result<Vec<usize>> {
        let (_, _, leaves) = self.decision_paths(inputs)?.into_parts();
        Ok(leaves)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[inline]
    pub fn root(&self) -> &RoutingWrapper {
        &self.root
    }

    #[inline]
    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    #[inline]
    pub fn head(&self) -> &Dense {
        &self.head
    }

    /// Balanced layout, when built by [`TreeBuilder`](super::TreeBuilder).
    #[inline]
    pub fn shape(&self) -> Option<&TreeShape> {
        self.shape.as_ref()
    }

    /// Every node in flat construction order.
    #[inline]
    pub fn registry(&self) -> &[NodeSummary] {
        &self.registry
    }

    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.registry.len()
    }

    /// Length of the path axis fed to the head.
    #[inline]
    pub fn depth(&self) -> usize {
        self.root.max_depth()
    }
}

impl fmt::Display for TreeModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for summary in &self.registry {
            let children: Vec<String> = summary.children.iter().map(usize::to_string).collect();
            writeln!(
                f,
                "{}: {}\t Children: {}",
                summary.index,
                summary.description,
                children.join(", ")
            )?;
        }
        Ok(())
    }
}

impl fmt::Debug for TreeModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeModel")
            .field("n_nodes", &self.registry.len())
            .field("depth", &self.depth())
            .field("output_dim", &self.output_dim)
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::balanced_tree;
    use crate::repr::{IdentityNode, NodeUnit};
    use crate::testing::data::random_batch;
    use approx::assert_abs_diff_eq;

    fn identity_nodes(n: usize, width: usize) -> Vec<Box<dyn NodeUnit>> {
        (0..n)
            .map(|_| Box::new(IdentityNode::new([width])) as Box<dyn NodeUnit>)
            .collect()
    }

    #[test]
    fn predictions_are_distributions() {
        let tree = balanced_tree(identity_nodes(7, 4), 2, 3).unwrap();
        let out = tree.call(random_batch(20, &[4], 1, -1.0, 1.0).view()).unwrap();
        assert_eq!(out.dim(), (20, 3));
        for row in out.rows() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn single_output_uses_sigmoid() {
        let tree = balanced_tree(identity_nodes(3, 4), 2, 1).unwrap();
        assert_eq!(tree.head().activation(), Activation::Sigmoid);
        let out = tree.call(random_batch(8, &[4], 2, -1.0, 1.0).view()).unwrap();
        assert!(out.iter().all(|&p| p > 0.0 && p < 1.0));
    }

    #[test]
    fn registry_in_flat_order() {
        let tree = balanced_tree(identity_nodes(7, 2), 2, 2).unwrap();
        let indices: Vec<usize> = tree.registry().iter().map(|s| s.index).collect();
        assert_eq!(indices, (0..7).collect::<Vec<_>>());
        assert_eq!(tree.registry()[1].children, vec![3, 4]);
        assert!(tree.registry()[5].is_leaf);
    }

    #[test]
    fn display_one_line_per_node() {
        let tree = balanced_tree(identity_nodes(3, 2), 2, 2).unwrap();
        let text = tree.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "0: Identity([2])\t Children: 1, 2",
                "1: Identity([2])\t Children: ",
                "2: Identity([2])\t Children: ",
            ]
        );
    }

    #[test]
    fn rejects_incomplete_tree() {
        let root = RoutingWrapper::builder()
            .node(Box::new(IdentityNode::new([2])))
            .is_leaf(false)
            .output_dim(2)
            .build()
            .unwrap();
        let err = TreeModel::new(root, 2, 0).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingChildren {
                index: 0,
                n_children: 0,
                expected: 2
            }
        );
    }

    #[test]
    fn with_head_checks_dimensions() {
        let tree = balanced_tree(identity_nodes(3, 2), 2, 2).unwrap();
        // depth 2 * width 2 inputs
        assert_eq!(tree.head().n_inputs(), 4);
        let err = tree
            .with_head(Dense::zeros(3, 2, Activation::Softmax))
            .unwrap_err();
        assert!(matches!(err, ConfigError::HeadMismatch { .. }));
    }
}

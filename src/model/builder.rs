//! Balanced tree assembly.
//!
//! Nodes are laid out in a flat, breadth-first array. For branching factor
//! `k` the children of flat index `i` sit at `i*k + 1 ..= i*k + k` and the last
//! `k^(h+1) - k^h` indices are leaves:
//!
//! ```text
//! k = 2, h = 2, n = 7
//!
//!             0
//!           /   \
//!          1     2
//!         / \   / \
//!        3   4 5   6      leaves: 3..=6
//! ```

use std::ops::Range;

use super::{TreeConfig, TreeModel};
use crate::error::{ConfigError, Result};
use crate::repr::NodeUnit;
use crate::routing::RoutingWrapper;

/// Number of nodes [`TreeBuilder`] expects for a tree of the given height:
/// `k^(h+1) - 1`, or `None` if that does not fit in a `usize`.
#[inline]
pub fn checked_nodes_in_balanced_tree(branching_factor: usize, height: usize) -> Option<usize> {
    level_capacity(branching_factor, height).map(|capacity| capacity - 1)
}

/// [`checked_nodes_in_balanced_tree`] for sizes known to fit, such as demo
/// and test trees. Saturates at `usize::MAX`, which is never a valid count.
#[inline]
pub fn nodes_in_balanced_tree(branching_factor: usize, height: usize) -> usize {
    checked_nodes_in_balanced_tree(branching_factor, height).unwrap_or(usize::MAX)
}

/// `k^(h+1)`: one more than the node count of a tree of height `h`.
#[inline]
fn level_capacity(branching_factor: usize, height: usize) -> Option<usize> {
    let exp = u32::try_from(height.checked_add(1)?).ok()?;
    branching_factor.checked_pow(exp)
}

// =============================================================================
// TreeShape
// =============================================================================

/// Validated layout of a balanced tree over a flat node array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeShape {
    pub branching_factor: usize,
    pub height: usize,
    pub n_nodes: usize,
    pub n_leaves: usize,
}

impl TreeShape {
    /// Validate that `n_nodes == k^(h+1) - 1` for some integer `h >= 0`.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::NoNodes`] if `n_nodes == 0`
    /// - [`ConfigError::InvalidBranchingFactor`] if `branching_factor == 0`
    /// - [`ConfigError::DegenerateBranchingFactor`] if `branching_factor == 1`
    /// - [`ConfigError::UnbalancedNodeCount`] otherwise, with the node counts
    ///   for the neighbouring integer heights
    /// - [`ConfigError::NodeCountOverflow`] if the next larger tree would
    ///   hold more than `usize::MAX` nodes
    pub fn balanced(n_nodes: usize, branching_factor: usize) -> Result<Self, ConfigError> {
        if n_nodes < 1 {
            return Err(ConfigError::NoNodes);
        }
        if branching_factor < 1 {
            return Err(ConfigError::InvalidBranchingFactor(branching_factor));
        }
        if branching_factor == 1 {
            return Err(ConfigError::DegenerateBranchingFactor { nodes: n_nodes });
        }

        // capacity == k^(h+1) == node count + 1, always representable.
        // Heights below zero have no nodes to offer, so the floor starts at
        // the smallest tree.
        let mut height = 0;
        let mut capacity = branching_factor;
        let mut lower = (0, capacity - 1);
        while capacity - 1 < n_nodes {
            lower = (height, capacity - 1);
            match level_capacity(branching_factor, height + 1) {
                Some(next) => {
                    height += 1;
                    capacity = next;
                }
                None => {
                    return Err(ConfigError::NodeCountOverflow {
                        nodes: n_nodes,
                        branching_factor,
                        max_height: lower.0,
                        max_nodes: lower.1,
                    });
                }
            }
        }

        if capacity - 1 > n_nodes {
            let (lower_height, lower_nodes) = lower;
            return Err(ConfigError::UnbalancedNodeCount {
                nodes: n_nodes,
                branching_factor,
                height: fractional_height(n_nodes, branching_factor),
                lower_height,
                lower_nodes,
                upper_height: height,
                upper_nodes: capacity - 1,
            });
        }

        // k^(h+1) - k^h
        let n_leaves = capacity - capacity / branching_factor;
        Ok(Self {
            branching_factor,
            height,
            n_nodes,
            n_leaves,
        })
    }

    /// Whether flat index `i` is a leaf.
    #[inline]
    pub fn is_leaf(&self, i: usize) -> bool {
        i >= self.n_nodes - self.n_leaves
    }

    /// Flat indices of the children of `i`, clipped to the node array.
    #[inline]
    pub fn children(&self, i: usize) -> Range<usize> {
        let first = i.saturating_mul(self.branching_factor).saturating_add(1);
        let end = first.saturating_add(self.branching_factor);
        first.min(self.n_nodes)..end.min(self.n_nodes)
    }

    /// Diagnostic depth hint for flat index `i`: `height - i / k - 1`.
    #[inline]
    pub fn depth_remaining(&self, i: usize) -> isize {
        self.height as isize - (i / self.branching_factor) as isize - 1
    }
}

/// `log_k(n + 1) - 1`, for error reporting only.
fn fractional_height(n_nodes: usize, branching_factor: usize) -> f64 {
    (n_nodes as f64 + 1.0).ln() / (branching_factor as f64).ln() - 1.0
}

// =============================================================================
// TreeBuilder
// =============================================================================

/// Assembles node units into a balanced [`TreeModel`].
///
/// # Example
///
/// ```
/// use arbor_route::model::{TreeBuilder, TreeConfig};
/// use arbor_route::repr::{IdentityNode, NodeUnit};
/// use ndarray::ArrayD;
///
/// let config = TreeConfig::builder().branching_factor(2).output_dim(3).build().unwrap();
/// let nodes: Vec<Box<dyn NodeUnit>> = (0..7)
///     .map(|_| Box::new(IdentityNode::new([4])) as Box<dyn NodeUnit>)
///     .collect();
///
/// let tree = TreeBuilder::new(config).build(nodes).unwrap();
/// let predictions = tree.call(ArrayD::zeros(vec![10, 4]).view()).unwrap();
/// assert_eq!(predictions.dim(), (10, 3));
/// ```
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    config: TreeConfig,
}

impl TreeBuilder {
    pub fn new(config: TreeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Wrap every node, wire children and attach the prediction head.
    ///
    /// Either the whole tree is returned or an error; nothing is built
    /// partially.
    pub fn build(&self, nodes: Vec<Box<dyn NodeUnit>>) -> Result<TreeModel> {
        let config = &self.config;
        let n_nodes = nodes.len();
        let mut units = nodes.into_iter();
        let Some(root_unit) = units.next() else {
            return Err(ConfigError::NoNodes.into());
        };
        let shape = TreeShape::balanced(n_nodes, config.branching_factor)?;

        let mut root = self.wrap(&shape, 0, root_unit)?;
        // descendants[i - 1] holds flat index i until its parent takes it
        let mut descendants = units
            .enumerate()
            .map(|(j, unit)| self.wrap(&shape, j + 1, unit).map(Some))
            .collect::<Result<Vec<_>, ConfigError>>()?;

        // Children always sit at higher flat indices than their parent, so
        // walking backwards attaches complete subtrees.
        for i in (1..n_nodes).rev() {
            let children = take_children(&mut descendants, shape.children(i));
            if let Some(parent) = descendants[i - 1].as_mut() {
                for child in children {
                    parent.push_child(child)?;
                }
            }
        }
        for child in take_children(&mut descendants, shape.children(0)) {
            root.push_child(child)?;
        }

        tracing::debug!(
            n_nodes = shape.n_nodes,
            height = shape.height,
            branching_factor = shape.branching_factor,
            n_leaves = shape.n_leaves,
            "assembled balanced tree"
        );

        let seed = config.seed.wrapping_add(shape.n_nodes as u64);
        let mut model = TreeModel::new(root, config.output_dim, seed)?;
        model.set_shape(shape);
        Ok(model)
    }

    /// Wrap the unit at flat index `i` according to its place in `shape`.
    fn wrap(
        &self,
        shape: &TreeShape,
        i: usize,
        node: Box<dyn NodeUnit>,
    ) -> Result<RoutingWrapper, ConfigError> {
        let config = &self.config;
        let is_leaf = shape.is_leaf(i);
        let output_dim = if is_leaf {
            config.leaf_output_dim()
        } else {
            config.branching_factor
        };
        RoutingWrapper::builder()
            .node(node)
            .is_leaf(is_leaf)
            .output_dim(output_dim)
            .send_output_to_children(config.send_output_to_children)
            .index(i)
            .depth_remaining(shape.depth_remaining(i))
            .path_width(config.path_width())
            .seed(config.seed.wrapping_add(i as u64))
            .build()
    }
}

/// Take the wrappers at flat indices `children` (all at least 1) out of the
/// descendant slots.
fn take_children(
    descendants: &mut [Option<RoutingWrapper>],
    children: Range<usize>,
) -> Vec<RoutingWrapper> {
    children
        .filter_map(|c| descendants[c - 1].take())
        .collect()
}

/// Build a balanced tree with default options.
///
/// `nodes.len()` must be `branching_factor^(h+1) - 1` for some height `h`.
/// Leaves decide among `branching_factor` outcomes; the final head emits
/// `output_dim` values.
pub fn balanced_tree(
    nodes: Vec<Box<dyn NodeUnit>>,
    branching_factor: usize,
    output_dim: usize,
) -> Result<TreeModel> {
    if nodes.is_empty() {
        return Err(ConfigError::NoNodes.into());
    }
    let config = TreeConfig::builder()
        .branching_factor(branching_factor)
        .output_dim(output_dim)
        .build()?;
    TreeBuilder::new(config).build(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(2, 0, 1)]
    #[case(2, 1, 3)]
    #[case(2, 2, 7)]
    #[case(3, 0, 2)]
    #[case(3, 1, 8)]
    #[case(4, 2, 63)]
    fn node_counts(#[case] k: usize, #[case] h: usize, #[case] n: usize) {
        assert_eq!(nodes_in_balanced_tree(k, h), n);
    }

    #[test]
    fn node_count_overflow_is_detected() {
        assert_eq!(checked_nodes_in_balanced_tree(2, 62), Some(usize::MAX / 2));
        assert_eq!(checked_nodes_in_balanced_tree(2, 63), None);
        assert_eq!(checked_nodes_in_balanced_tree(2, 200), None);
        assert_eq!(nodes_in_balanced_tree(2, 200), usize::MAX);
    }

    #[rstest]
    #[case(usize::MAX, 2, 62)]
    #[case(usize::MAX, 3, 39)]
    #[case(usize::MAX - 5, 3, 39)]
    fn counts_past_the_largest_tree_are_rejected(
        #[case] n: usize,
        #[case] k: usize,
        #[case] max_height: usize,
    ) {
        let err = TreeShape::balanced(n, k).unwrap_err();
        let max_nodes = checked_nodes_in_balanced_tree(k, max_height).unwrap();
        assert_eq!(
            err,
            ConfigError::NodeCountOverflow {
                nodes: n,
                branching_factor: k,
                max_height,
                max_nodes,
            }
        );
        assert_eq!(checked_nodes_in_balanced_tree(k, max_height + 1), None);
    }

    #[test]
    fn largest_binary_tree_below_overflow_has_exact_leaf_count() {
        let n = checked_nodes_in_balanced_tree(2, 62).unwrap();
        let shape = TreeShape::balanced(n, 2).unwrap();
        assert_eq!(shape.height, 62);
        assert_eq!(shape.n_leaves, 1 << 62);
        assert!(shape.is_leaf(n - 1));
        assert!(!shape.is_leaf(n - (1 << 62) - 1));
    }

    #[test]
    fn binary_height_two() {
        let shape = TreeShape::balanced(7, 2).unwrap();
        assert_eq!(shape.height, 2);
        assert_eq!(shape.n_leaves, 4);
        assert!(!shape.is_leaf(2));
        assert!(shape.is_leaf(3));
        assert_eq!(shape.children(0), 1..3);
        assert_eq!(shape.children(2), 5..7);
        assert!(shape.children(3).is_empty());
        assert_eq!(shape.depth_remaining(0), 1);
        assert_eq!(shape.depth_remaining(6), -2);
    }

    #[test]
    fn single_node_is_a_leaf() {
        let shape = TreeShape::balanced(1, 2).unwrap();
        assert_eq!(shape.height, 0);
        assert_eq!(shape.n_leaves, 1);
        assert!(shape.is_leaf(0));
    }

    #[test]
    fn ternary_leaf_count() {
        // 3^2 - 3^1 = 6 of the 8 nodes are leaves
        let shape = TreeShape::balanced(8, 3).unwrap();
        assert_eq!(shape.height, 1);
        assert_eq!(shape.n_leaves, 6);
        assert_eq!(shape.children(2), 7..8);
    }

    #[test]
    fn unbalanced_count_reports_neighbours() {
        let err = TreeShape::balanced(5, 2).unwrap_err();
        match err {
            ConfigError::UnbalancedNodeCount {
                lower_height,
                lower_nodes,
                upper_height,
                upper_nodes,
                height,
                ..
            } => {
                assert_eq!((lower_height, lower_nodes), (1, 3));
                assert_eq!((upper_height, upper_nodes), (2, 7));
                assert!(height > 1.0 && height < 2.0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn below_smallest_tree_clamps_lower_height() {
        // k = 3 has no tree with a single node; the smallest holds 2
        let err = TreeShape::balanced(1, 3).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnbalancedNodeCount {
                lower_height: 0,
                lower_nodes: 2,
                upper_height: 0,
                upper_nodes: 2,
                ..
            }
        ));
    }

    #[test]
    fn builder_rejects_empty_node_list() {
        let config = TreeConfig::builder()
            .branching_factor(2)
            .output_dim(1)
            .build()
            .unwrap();
        let err = TreeBuilder::new(config).build(Vec::new()).unwrap_err();
        assert_eq!(err, crate::TreeError::Config(ConfigError::NoNodes));
    }

    #[test]
    fn builder_wires_every_index_once() {
        let config = TreeConfig::builder()
            .branching_factor(3)
            .output_dim(2)
            .build()
            .unwrap();
        let nodes = (0..8)
            .map(|_| Box::new(crate::repr::IdentityNode::new([3])) as Box<dyn NodeUnit>)
            .collect();
        let tree = TreeBuilder::new(config).build(nodes).unwrap();

        let indices: Vec<usize> = tree.registry().iter().map(|s| s.index).collect();
        assert_eq!(indices, (0..8).collect::<Vec<_>>());
        // Node 2 is a leaf that still owns flat index 7
        assert_eq!(tree.registry()[2].children, vec![7]);
        assert_eq!(tree.depth(), 3);
    }

    #[rstest]
    #[case(0, 2, ConfigError::NoNodes)]
    #[case(3, 0, ConfigError::InvalidBranchingFactor(0))]
    #[case(3, 1, ConfigError::DegenerateBranchingFactor { nodes: 3 })]
    fn invalid_inputs(#[case] n: usize, #[case] k: usize, #[case] expected: ConfigError) {
        assert_eq!(TreeShape::balanced(n, k).unwrap_err(), expected);
    }
}

//! Error types for tree assembly and evaluation.
//!
//! - [`ConfigError`]: structural problems (tree shape, child counts, declared
//!   node shapes). Always carries the values needed to fix the configuration.
//! - [`ContractViolation`]: a [`NodeUnit`](crate::NodeUnit) produced or was
//!   handed a tensor whose shape disagrees with what it declared.
//! - [`TreeError`]: the union of both, returned by every fallible operation.

use std::fmt;

// =============================================================================
// ConfigError
// =============================================================================

/// Structural configuration errors. Never repaired silently.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// No nodes were supplied.
    #[error("number of nodes must be greater than or equal to one")]
    NoNodes,

    /// Branching factor below one.
    #[error("branching factor must be greater than or equal to one, got {0}")]
    InvalidBranchingFactor(usize),

    /// A branching factor of one gives `1^(h+1) - 1 == 0` nodes at every
    /// height, so no node count can ever be balanced.
    #[error(
        "branching factor 1 cannot form a balanced tree from {nodes} nodes; \
         use a branching factor of at least 2"
    )]
    DegenerateBranchingFactor { nodes: usize },

    /// Node count is not `k^(h+1) - 1` for any integer height.
    #[error(
        "invalid number of nodes ({nodes}) for branching factor {branching_factor}: \
         there are enough nodes for a balanced tree of height {height:.3}.\n\
         Use {lower_nodes} nodes for a balanced tree of height {lower_height}\n\
         or {upper_nodes} nodes for a balanced tree of height {upper_height}."
    )]
    UnbalancedNodeCount {
        nodes: usize,
        branching_factor: usize,
        height: f64,
        lower_height: usize,
        lower_nodes: usize,
        upper_height: usize,
        upper_nodes: usize,
    },

    /// Node count beyond the largest balanced tree whose size fits in a
    /// `usize`.
    #[error(
        "invalid number of nodes ({nodes}) for branching factor {branching_factor}: \
         the largest representable balanced tree has {max_nodes} nodes (height {max_height})"
    )]
    NodeCountOverflow {
        nodes: usize,
        branching_factor: usize,
        max_height: usize,
        max_nodes: usize,
    },

    /// An output or decision dimension of zero.
    #[error("{field} must be at least 1, got {value}")]
    InvalidOutputDim { field: &'static str, value: usize },

    /// An internal node does not own exactly `output_dim` children.
    #[error(
        "node {index} is internal but has {n_children} children, expected {expected}"
    )]
    MissingChildren {
        index: usize,
        n_children: usize,
        expected: usize,
    },

    /// A child's declared input shape disagrees with what its parent sends.
    #[error(
        "node {child} expects input shape {actual:?}, but parent {parent} routes samples of shape {expected:?}"
    )]
    ShapeMismatch {
        parent: usize,
        child: usize,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Path tensors are narrower than the node's decision arity.
    #[error("node {index} has path width {path_width}, below its decision arity {output_dim}")]
    InvalidPathWidth {
        index: usize,
        path_width: usize,
        output_dim: usize,
    },

    /// Parent and child disagree on the width of path tensors.
    #[error("node {child} has path width {child_width}, but parent {parent} uses {parent_width}")]
    PathWidthMismatch {
        parent: usize,
        child: usize,
        parent_width: usize,
        child_width: usize,
    },

    /// A replacement head does not fit the layer it replaces.
    /// Dimensions are `(n_inputs, n_outputs)`.
    #[error("head of {owner} must be {expected:?} (inputs, outputs), got {actual:?}")]
    HeadMismatch {
        owner: String,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// A dense layer does not match the flattened shapes of its node unit.
    #[error("dense layer must be {expected:?} (inputs, outputs), got {actual:?}")]
    LayerMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// Two chained units disagree on the intermediate shape.
    #[error("cannot chain a unit producing {expected:?} into one expecting {actual:?}")]
    ChainMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
}

// =============================================================================
// ContractViolation
// =============================================================================

/// Which side of a node transform a shape check failed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractStage {
    Input,
    Output,
}

impl fmt::Display for ContractStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// Runtime tensor shape disagreeing with a node's declared shape.
///
/// Shapes include the batch axis. Node units report violations with
/// `index == 0`; the tree node running the unit replaces it with its own
/// flat index.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("node {index} {stage} shape mismatch: expected {expected:?}, got {actual:?}")]
pub struct ContractViolation {
    pub index: usize,
    pub stage: ContractStage,
    pub expected: Vec<usize>,
    pub actual: Vec<usize>,
}

impl ContractViolation {
    /// Check that a `[B, ...]` tensor shape is `[B] ++ declared`.
    ///
    /// # Example
    ///
    /// ```
    /// use arbor_route::{ContractStage, ContractViolation};
    ///
    /// assert!(ContractViolation::check(ContractStage::Input, &[4, 3], &[3]).is_ok());
    ///
    /// let err = ContractViolation::check(ContractStage::Output, &[4, 7], &[3]).unwrap_err();
    /// assert_eq!(err.expected, vec![4, 3]);
    /// ```
    pub fn check(stage: ContractStage, actual: &[usize], declared: &[usize]) -> Result<(), Self> {
        if actual.len() == declared.len() + 1 && &actual[1..] == declared {
            return Ok(());
        }
        let n_samples = actual.first().copied().unwrap_or(0);
        let mut expected = Vec::with_capacity(declared.len() + 1);
        expected.push(n_samples);
        expected.extend_from_slice(declared);
        Err(Self {
            index: 0,
            stage,
            expected,
            actual: actual.to_vec(),
        })
    }

    /// Attribute the violation to tree node `index`.
    #[inline]
    pub fn at_node(self, index: usize) -> Self {
        Self { index, ..self }
    }
}

// =============================================================================
// TreeError
// =============================================================================

/// Any failure surfaced by building or calling a tree.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TreeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Contract(#[from] ContractViolation),
}

/// Crate result alias.
pub type Result<T, E = TreeError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbalanced_message_names_both_remedies() {
        let err = ConfigError::UnbalancedNodeCount {
            nodes: 5,
            branching_factor: 2,
            height: 1.585,
            lower_height: 1,
            lower_nodes: 3,
            upper_height: 2,
            upper_nodes: 7,
        };
        let msg = err.to_string();
        assert!(msg.contains("Use 3 nodes"), "{msg}");
        assert!(msg.contains("or 7 nodes"), "{msg}");
    }

    #[test]
    fn contract_violation_converts_into_tree_error() {
        let violation = ContractViolation {
            index: 4,
            stage: ContractStage::Output,
            expected: vec![2, 3],
            actual: vec![2, 4],
        };
        let err: TreeError = violation.clone().into();
        assert_eq!(err, TreeError::Contract(violation));
        assert!(err.to_string().starts_with("node 4 output shape mismatch"));
    }

    #[test]
    fn check_compares_sample_shape_only() {
        assert!(ContractViolation::check(ContractStage::Input, &[0, 5, 51], &[5, 51]).is_ok());

        let rank = ContractViolation::check(ContractStage::Input, &[2, 5], &[5, 51]).unwrap_err();
        assert_eq!(rank.expected, vec![2, 5, 51]);

        let moved = rank.at_node(6);
        assert_eq!(moved.index, 6);
        assert_eq!(moved.stage, ContractStage::Input);
    }
}

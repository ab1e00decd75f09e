//! Routing wrapper: one tree node plus its decision head and children.

use std::fmt;

use ndarray::ArrayViewD;

use super::DecisionPath;
use crate::batch::{argmax_rows, flatten_batch, gather_rows, partition_by_decision};
use crate::error::{ConfigError, ContractStage, ContractViolation, Result};
use crate::repr::{Activation, Dense, NodeUnit};

/// A tree node: a [`NodeUnit`], a decision head over its output, and (for
/// internal nodes) the children it routes samples to.
///
/// Calling a wrapper evaluates its unit on the whole batch, picks one child
/// per sample by argmax of the decision head, evaluates each child on its
/// share of the batch and merges the children's trails back into batch
/// order behind this node's own decisions.
///
/// # Example
///
/// ```
/// use arbor_route::repr::IdentityNode;
/// use arbor_route::routing::RoutingWrapper;
/// use ndarray::ArrayD;
///
/// let mut root = RoutingWrapper::builder()
///     .node(Box::new(IdentityNode::new([3])))
///     .is_leaf(false)
///     .output_dim(2)
///     .build()
///     .unwrap();
/// for index in 1..=2 {
///     let leaf = RoutingWrapper::builder()
///         .node(Box::new(IdentityNode::new([3])))
///         .is_leaf(true)
///         .output_dim(2)
///         .index(index)
///         .build()
///         .unwrap();
///     root.push_child(leaf).unwrap();
/// }
///
/// let path = root.call(ArrayD::zeros(vec![4, 3]).view()).unwrap();
/// assert_eq!(path.trails().dim(), (4, 2, 2));
/// ```
pub struct RoutingWrapper {
    node: Box<dyn NodeUnit>,
    head: Dense,
    is_leaf: bool,
    output_dim: usize,
    send_output_to_children: bool,
    children: Vec<RoutingWrapper>,
    index: usize,
    depth_remaining: isize,
    path_width: usize,
    max_depth: usize,
}

#[bon::bon]
impl RoutingWrapper {
    /// Wrap `node`.
    ///
    /// - `output_dim`: decision arity (number of children for internal nodes)
    /// - `send_output_to_children`: route the unit's output instead of its input
    /// - `index`: position in the flat construction order, for diagnostics
    /// - `depth_remaining`: levels expected below this node, for diagnostics
    /// - `path_width`: last-axis width of path tensors; defaults to `output_dim`
    /// - `seed`: decision head initialisation
    #[builder]
    pub fn new(
        node: Box<dyn NodeUnit>,
        is_leaf: bool,
        output_dim: usize,
        #[builder(default)] send_output_to_children: bool,
        #[builder(default)] index: usize,
        #[builder(default)] depth_remaining: isize,
        path_width: Option<usize>,
        #[builder(default = 42)] seed: u64,
    ) -> std::result::Result<Self, ConfigError> {
        if output_dim == 0 {
            return Err(ConfigError::InvalidOutputDim {
                field: "output_dim",
                value: output_dim,
            });
        }
        let path_width = path_width.unwrap_or(output_dim);
        if path_width < output_dim {
            return Err(ConfigError::InvalidPathWidth {
                index,
                path_width,
                output_dim,
            });
        }

        let n_features = node.output_shape().iter().product();
        let head = Dense::glorot(n_features, output_dim, Activation::for_head(output_dim), seed);

        Ok(Self {
            node,
            head,
            is_leaf,
            output_dim,
            send_output_to_children,
            children: Vec::new(),
            index,
            depth_remaining,
            path_width,
            max_depth: 1,
        })
    }
}

impl RoutingWrapper {
    // =========================================================================
    // Assembly
    // =========================================================================

    /// Append a child. Children are routed to in the order they are pushed.
    ///
    /// Fails if the child cannot accept what this node sends it, or if the
    /// two disagree on path width.
    pub fn push_child(&mut self, child: RoutingWrapper) -> std::result::Result<(), ConfigError> {
        let sent = self.routed_shape();
        if child.node.input_shape() != sent {
            return Err(ConfigError::ShapeMismatch {
                parent: self.index,
                child: child.index,
                expected: sent.to_vec(),
                actual: child.node.input_shape().to_vec(),
            });
        }
        if child.path_width != self.path_width {
            return Err(ConfigError::PathWidthMismatch {
                parent: self.index,
                child: child.index,
                parent_width: self.path_width,
                child_width: child.path_width,
            });
        }
        if !self.is_leaf {
            self.max_depth = self.max_depth.max(child.max_depth + 1);
        }
        self.children.push(child);
        Ok(())
    }

    /// Replace the decision head.
    ///
    /// The head must read the flattened unit output and emit `output_dim`
    /// values. Its activation is kept as given.
    pub fn with_head(mut self, head: Dense) -> std::result::Result<Self, ConfigError> {
        let expected = (self.head.n_inputs(), self.output_dim);
        let actual = (head.n_inputs(), head.n_outputs());
        if expected != actual {
            return Err(ConfigError::HeadMismatch {
                owner: format!("node {}", self.index),
                expected,
                actual,
            });
        }
        self.head = head;
        Ok(self)
    }

    /// Per-sample shape of what this node sends to its children.
    fn routed_shape(&self) -> &[usize] {
        if self.send_output_to_children {
            self.node.output_shape()
        } else {
            self.node.input_shape()
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Leaf, or internal node owning exactly `output_dim` children.
    #[inline]
    pub fn has_all_children(&self) -> bool {
        self.is_leaf || self.children.len() == self.output_dim
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.is_leaf
    }

    #[inline]
    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    #[inline]
    pub fn send_output_to_children(&self) -> bool {
        self.send_output_to_children
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn depth_remaining(&self) -> isize {
        self.depth_remaining
    }

    #[inline]
    pub fn path_width(&self) -> usize {
        self.path_width
    }

    #[inline]
    pub fn children(&self) -> &[RoutingWrapper] {
        &self.children
    }

    #[inline]
    pub fn node(&self) -> &dyn NodeUnit {
        self.node.as_ref()
    }

    #[inline]
    pub fn head(&self) -> &Dense {
        &self.head
    }

    /// Length of the path axis this node produces: one for a leaf, one plus
    /// the deepest child otherwise. Kept up to date by [`push_child`].
    ///
    /// [`push_child`]: RoutingWrapper::push_child
    #[inline]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Visit this node and every descendant, parents before children.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a RoutingWrapper)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    /// First node in the subtree that is internal but short of children.
    pub(crate) fn find_incomplete(&self) -> Option<&RoutingWrapper> {
        let mut found = None;
        self.walk(&mut |node| {
            if found.is_none() && !node.has_all_children() {
                found = Some(node);
            }
        });
        found
    }

    fn missing_children(&self) -> ConfigError {
        ConfigError::MissingChildren {
            index: self.index,
            n_children: self.children.len(),
            expected: self.output_dim,
        }
    }

    // =========================================================================
    // Routing
    // =========================================================================

    /// Evaluate this subtree on a batch of shape `[B] ++ node.input_shape()`.
    ///
    /// Returns the decision trail of every sample, row `b` belonging to input
    /// sample `b`.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingChildren`] if an internal node on the way is
    ///   short of children
    /// - [`ContractViolation`] if a unit is handed or returns a tensor of the
    ///   wrong shape, or reports one from inside itself
    pub fn call(&self, inputs: ArrayViewD<'_, f32>) -> Result<DecisionPath> {
        if !self.has_all_children() {
            return Err(self.missing_children().into());
        }
        self.check_shape(ContractStage::Input, inputs.shape(), self.node.input_shape())?;

        let n_samples = inputs.shape()[0];
        let _span = tracing::trace_span!("route", index = self.index, n_samples).entered();

        if n_samples == 0 {
            return Ok(DecisionPath::empty(self.max_depth, self.path_width));
        }

        let output = self
            .node
            .transform(inputs.view())
            .map_err(|violation| violation.at_node(self.index))?;
        self.check_shape(ContractStage::Output, output.shape(), self.node.output_shape())?;

        let decisions = self.head.forward(flatten_batch(output.view()).view());

        if self.is_leaf {
            return Ok(DecisionPath::leaf(decisions.view(), self.path_width, self.index));
        }

        let choices = argmax_rows(decisions.view());
        let groups = partition_by_decision(&choices, self.output_dim);
        tracing::trace!(
            sizes = ?groups.iter().map(Vec::len).collect::<Vec<_>>(),
            "partitioned batch"
        );

        let source = if self.send_output_to_children {
            output.view()
        } else {
            inputs.view()
        };

        let mut parts = Vec::with_capacity(self.children.len());
        let mut order = Vec::with_capacity(n_samples);
        for (child, group) in self.children.iter().zip(&groups) {
            if group.is_empty() {
                continue;
            }
            let rows = gather_rows(source.view(), group);
            parts.push(child.call(rows.view())?);
            order.extend_from_slice(group);
        }

        let grouped = DecisionPath::concat(&parts, self.max_depth - 1, self.path_width);
        Ok(grouped.scatter(&order).prepend(decisions.view()))
    }

    fn check_shape(&self, stage: ContractStage, actual: &[usize], declared: &[usize]) -> Result<()> {
        ContractViolation::check(stage, actual, declared)
            .map_err(|violation| violation.at_node(self.index).into())
    }
}

impl fmt::Display for RoutingWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let children: Vec<String> = self.children.iter().map(|c| c.index.to_string()).collect();
        write!(
            f,
            "{}: {}\t Children: {}",
            self.index,
            self.node.describe(),
            children.join(", ")
        )
    }
}

impl fmt::Debug for RoutingWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutingWrapper")
            .field("index", &self.index)
            .field("node", &self.node.describe())
            .field("is_leaf", &self.is_leaf)
            .field("output_dim", &self.output_dim)
            .field("send_output_to_children", &self.send_output_to_children)
            .field("max_depth", &self.max_depth)
            .field("children", &self.children)
            .finish()
    }
}

//! Tree assembly and the root-level model.
//!
//! # Overview
//!
//! - [`TreeConfig`]: assembly options (branching factor, output widths, seed)
//! - [`TreeBuilder`] / [`balanced_tree`]: validate the node count and wire a
//!   balanced tree of [`RoutingWrapper`](crate::routing::RoutingWrapper)s
//! - [`TreeModel`]: runs the tree and applies the prediction head
//!
//! # Example
//!
//! ```
//! use arbor_route::model::balanced_tree;
//! use arbor_route::repr::{IdentityNode, NodeUnit};
//! use ndarray::ArrayD;
//!
//! let nodes: Vec<Box<dyn NodeUnit>> = (0..3)
//!     .map(|_| Box::new(IdentityNode::new([5, 51])) as Box<dyn NodeUnit>)
//!     .collect();
//! let tree = balanced_tree(nodes, 2, 1).unwrap();
//!
//! let predictions = tree.call(ArrayD::zeros(vec![16, 5, 51]).view()).unwrap();
//! assert_eq!(predictions.dim(), (16, 1));
//! ```

mod builder;
mod config;
mod tree;

pub use builder::{
    balanced_tree, checked_nodes_in_balanced_tree, nodes_in_balanced_tree, TreeBuilder, TreeShape,
};
pub use config::TreeConfig;
pub use tree::{NodeSummary, TreeModel};

//! arbor-route: Balanced trees of neural sub-networks with per-sample routing.
//!
//! Every tree node wraps a [`NodeUnit`] (an opaque batch transform) and adds a
//! decision head. Internal nodes send each sample to the child picked by the
//! argmax of that head; leaves stop. The per-level decision vectors a sample
//! collects on its way down form its decision trail, and a dense head over the
//! flattened trails produces the final prediction.
//!
//! # Key Types
//!
//! - [`NodeUnit`] - Per-node transform contract
//! - [`RoutingWrapper`] - Tree node: unit, decision head, owned children
//! - [`TreeBuilder`] / [`TreeConfig`] / [`balanced_tree`] - Balanced assembly
//! - [`TreeModel`] - Root model with prediction head
//! - [`TreeError`] - Configuration and shape-contract errors
//!
//! # Example
//!
//! ```
//! use arbor_route::{balanced_tree, repr::IdentityNode, NodeUnit};
//! use ndarray::ArrayD;
//!
//! // 2^(2+1) - 1 = 7 nodes for a binary tree of height 2
//! let nodes: Vec<Box<dyn NodeUnit>> = (0..7)
//!     .map(|_| Box::new(IdentityNode::new([8])) as Box<dyn NodeUnit>)
//!     .collect();
//! let tree = balanced_tree(nodes, 2, 4).unwrap();
//!
//! let batch = ArrayD::zeros(vec![32, 8]);
//! let predictions = tree.call(batch.view()).unwrap();
//! assert_eq!(predictions.dim(), (32, 4));
//! ```

// Re-export approx traits for users who want to compare predictions
pub use approx;

pub mod batch;
pub mod error;
pub mod model;
pub mod repr;
pub mod routing;
pub mod testing;

// =============================================================================
// Convenience Re-exports
// =============================================================================

pub use error::{ConfigError, ContractStage, ContractViolation, Result, TreeError};
pub use model::{balanced_tree, nodes_in_balanced_tree, TreeBuilder, TreeConfig, TreeModel};
pub use repr::NodeUnit;
pub use routing::{DecisionPath, RoutingWrapper};

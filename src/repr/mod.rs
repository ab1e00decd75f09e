//! Building blocks shared by every tree node.
//!
//! - [`NodeUnit`]: the per-node transform contract, plus simple implementors
//! - [`Dense`]: affine layer used for decision and prediction heads
//! - [`Activation`]: row-wise activation applied after a dense layer

mod activation;
mod dense;
mod node;

pub use activation::Activation;
pub use dense::Dense;
pub use node::{Chain, DenseNode, FnNode, IdentityNode, NodeUnit};

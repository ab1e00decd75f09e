//! Per-sample routing through a tree of wrapped node units.
//!
//! - [`RoutingWrapper`]: one node, its decision head and owned children
//! - [`DecisionPath`]: per-sample decision trails returned by a call

mod path;
mod wrapper;

pub use path::DecisionPath;
pub use wrapper::RoutingWrapper;

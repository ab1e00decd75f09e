//! Test and benchmark helpers.
//!
//! - [`data`]: seeded synthetic batches
//! - [`nodes`]: heads and node units with predictable routing

pub mod data;
pub mod nodes;

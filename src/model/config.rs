//! Tree assembly configuration with builder pattern.
//!
//! # Example
//!
//! ```
//! use arbor_route::model::TreeConfig;
//!
//! // Binary tree, three-way final prediction
//! let config = TreeConfig::builder()
//!     .branching_factor(2)
//!     .output_dim(3)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.leaf_output_dim(), 2);
//!
//! // Leaves choose among four outcomes and children see transformed samples
//! let config = TreeConfig::builder()
//!     .branching_factor(2)
//!     .output_dim(1)
//!     .leaf_output_dim(4)
//!     .send_output_to_children(true)
//!     .seed(7)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.path_width(), 4);
//! ```

use bon::Builder;

use crate::error::ConfigError;

/// Configuration for [`TreeBuilder`](super::TreeBuilder).
#[derive(Debug, Clone, Builder)]
#[builder(
    derive(Clone, Debug),
    finish_fn(vis = "", name = __build_internal)
)]
pub struct TreeConfig {
    /// Children per internal node. Trees need at least 2.
    pub branching_factor: usize,

    /// Width of the final prediction.
    pub output_dim: usize,

    /// Decision arity of leaf nodes. `None` reuses `branching_factor`.
    pub leaf_output_dim: Option<usize>,

    /// Route each node's transformed output to its children instead of the
    /// samples it received. Default: `false`.
    #[builder(default)]
    pub send_output_to_children: bool,

    /// Seed for head initialisation. Node `i` uses `seed + i`, the final
    /// head `seed + n_nodes`. Default: 42.
    #[builder(default = 42)]
    pub seed: u64,
}

impl<S: tree_config_builder::IsComplete> TreeConfigBuilder<S> {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidBranchingFactor`] if `branching_factor == 0`
    /// - [`ConfigError::InvalidOutputDim`] if `output_dim` or
    ///   `leaf_output_dim` is zero
    pub fn build(self) -> Result<TreeConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl TreeConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.branching_factor < 1 {
            return Err(ConfigError::InvalidBranchingFactor(self.branching_factor));
        }
        if self.output_dim < 1 {
            return Err(ConfigError::InvalidOutputDim {
                field: "output_dim",
                value: self.output_dim,
            });
        }
        if self.leaf_output_dim == Some(0) {
            return Err(ConfigError::InvalidOutputDim {
                field: "leaf_output_dim",
                value: 0,
            });
        }
        Ok(())
    }

    /// Effective leaf decision arity.
    #[inline]
    pub fn leaf_output_dim(&self) -> usize {
        self.leaf_output_dim.unwrap_or(self.branching_factor)
    }

    /// Width shared by every path tensor in the tree.
    #[inline]
    pub fn path_width(&self) -> usize {
        self.branching_factor.max(self.leaf_output_dim())
    }
}

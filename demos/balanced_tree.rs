//! Balanced routing tree over encoder/decoder nodes.
//!
//! Seven nodes, each a dense encoder followed by a dense decoder on samples
//! of shape `[5, 51]`, wired into a binary tree of height 2.
//!
//! Run with:
//! ```bash
//! RUST_LOG=arbor_route=trace cargo run --example balanced_tree
//! ```

use arbor_route::model::nodes_in_balanced_tree;
use arbor_route::repr::{Activation, Chain, DenseNode, NodeUnit};
use arbor_route::testing::data::normal_batch;
use arbor_route::{balanced_tree, Result};
use tracing_subscriber::EnvFilter;

const SAMPLE_SHAPE: [usize; 2] = [5, 51];
const HIDDEN: usize = 32;

fn encoder_decoder(seed: u64) -> Result<Box<dyn NodeUnit>> {
    let encoder = DenseNode::new(SAMPLE_SHAPE, [HIDDEN], Activation::Relu, seed);
    let decoder = DenseNode::new([HIDDEN], SAMPLE_SHAPE, Activation::Identity, seed + 100);
    let chain = Chain::new(Box::new(encoder), Box::new(decoder))?;
    Ok(Box::new(chain))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // =========================================================================
    // Build
    // =========================================================================
    let branching_factor = 2;
    let height = 2;
    let n_nodes = nodes_in_balanced_tree(branching_factor, height);

    let nodes = (0..n_nodes as u64)
        .map(encoder_decoder)
        .collect::<Result<Vec<_>>>()?;
    let tree = balanced_tree(nodes, branching_factor, 1)?;

    println!("Tree with {} nodes (height {}):", tree.n_nodes(), height);
    print!("{tree}");

    // =========================================================================
    // Predict
    // =========================================================================
    let batch = normal_batch(500, &SAMPLE_SHAPE, 0);
    let predictions = tree.call(batch.view())?;
    println!("\nPredictions: {:?}", predictions.shape());

    let leaves = tree.route(batch.view())?;
    let mut counts = vec![0usize; tree.n_nodes()];
    for leaf in leaves {
        counts[leaf] += 1;
    }
    for (index, count) in counts.iter().enumerate().filter(|(_, count)| **count > 0) {
        println!("  leaf {index}: {count} samples");
    }

    Ok(())
}

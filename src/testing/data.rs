use ndarray::{ArrayD, Axis, IxDyn};
use rand::prelude::*;

/// Generate a random batch of shape `[rows] ++ sample_shape`.
///
/// Values are uniform in `[min, max]`.
pub fn random_batch(rows: usize, sample_shape: &[usize], seed: u64, min: f32, max: f32) -> ArrayD<f32> {
	assert!(max >= min);
	let mut rng = StdRng::seed_from_u64(seed);
	let width = max - min;

	let mut shape = Vec::with_capacity(sample_shape.len() + 1);
	shape.push(rows);
	shape.extend_from_slice(sample_shape);

	ArrayD::from_shape_simple_fn(IxDyn(&shape), || min + rng.gen::<f32>() * width)
}

/// Generate a standard-normal batch of shape `[rows] ++ sample_shape`
/// (Box-Muller).
pub fn normal_batch(rows: usize, sample_shape: &[usize], seed: u64) -> ArrayD<f32> {
	let mut rng = StdRng::seed_from_u64(seed);

	let mut shape = Vec::with_capacity(sample_shape.len() + 1);
	shape.push(rows);
	shape.extend_from_slice(sample_shape);

	ArrayD::from_shape_simple_fn(IxDyn(&shape), || {
		let u1: f32 = rng.gen::<f32>().max(f32::MIN_POSITIVE);
		let u2: f32 = rng.gen();
		(-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos()
	})
}

/// Deterministic permutation of `0..n`.
pub fn shuffled_indices(n: usize, seed: u64) -> Vec<usize> {
	let mut idx: Vec<usize> = (0..n).collect();
	let mut rng = StdRng::seed_from_u64(seed);
	idx.shuffle(&mut rng);
	idx
}

/// Reorder the rows of a batch: row `j` of the result is row `order[j]`.
pub fn permute_rows(batch: &ArrayD<f32>, order: &[usize]) -> ArrayD<f32> {
	batch.select(Axis(0), order)
}

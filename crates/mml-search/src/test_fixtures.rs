//! Synthetic datasets for testing and benchmarking.
//!
//! Each generator samples from a small known network so tests can check that
//! search recovers (or at least prefers) the true arcs.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use mml_core::{DataResult, Dataset};

/// Copy `value`, flipping it with probability `noise`.
fn noisy<R: Rng>(rng: &mut R, value: u32, noise: f64) -> u32 {
    if rng.random::<f64>() < noise {
        1 - value
    } else {
        value
    }
}

fn names(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("x{i}")).collect()
}

fn finish(columns: Vec<Vec<u32>>) -> DataResult<Dataset> {
    let n = columns.len();
    Dataset::new(names(n), vec![2; n], columns)
}

/// Binary chain `x0 -> x1 -> x2` with 5% copy noise.
pub fn chain_dataset(rows: usize, seed: u64) -> DataResult<Dataset> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut columns = vec![Vec::with_capacity(rows); 3];
    for _ in 0..rows {
        let x0 = rng.random_range(0..2);
        let x1 = noisy(&mut rng, x0, 0.05);
        let x2 = noisy(&mut rng, x1, 0.05);
        columns[0].push(x0);
        columns[1].push(x1);
        columns[2].push(x2);
    }
    finish(columns)
}

/// Binary series: `x0` follows its own lag, `x1` copies `x0`, `x2` is noise.
pub fn lagged_dataset(rows: usize, seed: u64) -> DataResult<Dataset> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut columns = vec![Vec::with_capacity(rows); 3];
    let mut previous = 0;
    for _ in 0..rows {
        let x0 = noisy(&mut rng, previous, 0.1);
        let x1 = noisy(&mut rng, x0, 0.05);
        let x2 = rng.random_range(0..2);
        columns[0].push(x0);
        columns[1].push(x1);
        columns[2].push(x2);
        previous = x0;
    }
    finish(columns)
}

/// `vars` independent fair binary variables.
pub fn independent_dataset(vars: usize, rows: usize, seed: u64) -> DataResult<Dataset> {
    let mut rng = StdRng::seed_from_u64(seed);
    let columns = (0..vars)
        .map(|_| (0..rows).map(|_| rng.random_range(0..2)).collect::<Vec<u32>>())
        .collect();
    finish(columns)
}

//! Metropolis acceptance rule.

use rand::Rng;
use tracing::warn;

/// Decide whether to keep a proposal whose cost change is `delta` nits.
///
/// Improvements and ties are always accepted. Otherwise the proposal is kept
/// with probability `exp(-delta / temperature)`; a non-positive temperature
/// rejects every worsening move. A NaN delta is always rejected.
pub fn metropolis_accept<R: Rng + ?Sized>(delta: f64, temperature: f64, rng: &mut R) -> bool {
    if delta.is_nan() {
        warn!(temperature, "metropolis_nan_delta");
        return false;
    }
    if delta <= 0.0 {
        return true;
    }
    if temperature <= 0.0 {
        return false;
    }
    rng.random::<f64>() < (-delta / temperature).exp()
}

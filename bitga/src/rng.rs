use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Returns a seeded generator, for reproducible evolution runs.
///
/// # Examples
/// ```
/// use rand::Rng;
///
/// let mut a = bitga::rng::seeded(7);
/// let mut b = bitga::rng::seeded(7);
/// assert_eq!(a.gen::<u64>(), b.gen::<u64>());
/// ```
pub fn seeded(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Number of successes in `trials` Bernoulli draws with
/// success chance `p`.
pub(crate) fn binomial<R: Rng + ?Sized>(rng: &mut R, trials: usize, p: f64) -> usize {
    (0..trials).filter(|_| bernoulli(rng, p)).count()
}

/// Indices (in increasing order) of the successful draws among
/// `trials` Bernoulli draws with success chance `p`.
pub(crate) fn bernoulli_hits<R: Rng + ?Sized>(rng: &mut R, trials: usize, p: f64) -> Vec<usize> {
    (0..trials).filter(|_| bernoulli(rng, p)).collect()
}

fn bernoulli<R: Rng + ?Sized>(rng: &mut R, p: f64) -> bool {
    rng.gen::<f64>() < p
}

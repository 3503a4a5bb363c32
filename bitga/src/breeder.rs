//! Real-valued mutation in the manner of the Breeder Genetic
//! Algorithm (Mühlenbein and Schlierkamp-Voosen, 1993).
use rand::Rng;

/// Perturbs randomly chosen entries of `values` in place:
///
/// `values[i] += s * range * values[i] * 2^(-u * precision)`
///
/// with `s` uniform in `[-1, 1)` and `u` uniform in `[0, 1)`. Between
/// 1 and `values.len()` entries are drawn, uniformly with replacement.
/// Larger `range` values give larger steps, larger `precision` values
/// smaller ones. Zeros are never changed.
///
/// Returns the number of draws made.
///
/// # Examples
/// ```
/// let mut rng = bitga::rng::seeded(2);
/// let mut values = [1.0, 1.0, 1.0, 0.0];
/// bitga::breeder::bga_mutate(&mut values, 0.1, 0.001, &mut rng);
///
/// // At most four steps of at most 10% each.
/// assert!(values[..3].iter().all(|v| (v - 1.0).abs() < 0.5));
/// assert_eq!(values[3], 0.0);
/// ```
pub fn bga_mutate<R: Rng + ?Sized>(values: &mut [f64], range: f64, precision: f64, rng: &mut R) -> usize {
    if values.is_empty() {
        return 0;
    }
    let draws = rng.gen_range(1..=values.len());
    for _ in 0..draws {
        let i = rng.gen_range(0..values.len());
        let s = 2.0 * (rng.gen::<f64>() - 0.5);
        let a = 2f64.powf(-rng.gen::<f64>() * precision);
        values[i] += s * range * values[i] * a;
    }
    draws
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::seeded;

    fn spread(values: &[f64]) -> f64 {
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
    }

    #[test]
    fn changes_some_values() {
        let mut rng = seeded(0);
        let mut changed = 0;
        for _ in 0..10 {
            let mut values = [1.0; 10];
            bga_mutate(&mut values, 0.1, 0.001, &mut rng);
            changed += values.iter().filter(|&&v| v != 1.0).count();
        }
        assert!(changed > 0);
    }

    #[test]
    fn zero_range_changes_nothing() {
        let mut rng = seeded(1);
        let mut values = [1.0, -2.0, 3.5];
        assert!(bga_mutate(&mut values, 0.0, 0.001, &mut rng) >= 1);
        assert_eq!(values, [1.0, -2.0, 3.5]);
        assert_eq!(bga_mutate(&mut [], 0.1, 0.001, &mut rng), 0);
    }

    #[test]
    fn larger_range_spreads_more() {
        let mut rng = seeded(2);
        let (mut narrow, mut wide) = (0.0, 0.0);
        for _ in 0..1000 {
            let mut a = [1.0; 10];
            let mut b = [1.0; 10];
            bga_mutate(&mut a, 0.1, 0.001, &mut rng);
            bga_mutate(&mut b, 0.5, 0.001, &mut rng);
            narrow += spread(&a);
            wide += spread(&b);
        }
        assert!(wide > narrow);
    }

    #[test]
    fn larger_precision_steps_less() {
        let mut rng = seeded(3);
        let (mut coarse, mut fine) = (0.0, 0.0);
        for _ in 0..1000 {
            let mut a = [1.0; 10];
            let mut b = [1.0; 10];
            bga_mutate(&mut a, 1.0, 0.001, &mut rng);
            bga_mutate(&mut b, 1.0, 10.0, &mut rng);
            coarse += a.iter().map(|v| (v - 1.0).abs()).fold(0.0, f64::max);
            fine += b.iter().map(|v| (v - 1.0).abs()).fold(0.0, f64::max);
        }
        assert!(coarse > fine);
    }
}

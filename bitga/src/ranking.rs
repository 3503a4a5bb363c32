//! Rank transforms and child-count utilities used for selection.
use crate::errors::{GaError, Result};

/// Returns the sorted position of each value: the smallest
/// value gets position 0 and the largest `len - 1`. Ties keep
/// their original order.
///
/// # Examples
/// ```
/// let positions = bitga::ranking::position(&[10.0, -1.0, -3.0, 2.0, 30.0]);
/// assert_eq!(positions, vec![3, 1, 0, 2, 4]);
/// ```
pub fn position(values: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    let mut positions = vec![0; values.len()];
    for (rank, i) in order.into_iter().enumerate() {
        positions[i] = rank;
    }
    positions
}

/// Ranks individuals using a linear scheme.
///
/// With `n` individuals, `pos` the 1-based position of an
/// individual (least fit has `pos = 1`, fittest `pos = n`) and
/// `sp` the selective pressure, the rank of an individual is
/// `2 - sp + 2(sp - 1)(pos - 1)/(n - 1)`.
/// Ranks always sum to `n`.
///
/// # Errors
/// Returns [`GaError::SelectionPressure`] unless `sp` is in `[1, 2]`.
///
/// # Examples
/// ```
/// let rank = bitga::ranking::linear_rank(&[10.0, -1.0, -3.0, 2.0, 30.0], 2.0).unwrap();
/// assert_eq!(rank, vec![1.5, 0.5, 0.0, 1.0, 2.0]);
/// assert_eq!(rank.iter().sum::<f64>(), 5.0);
/// ```
pub fn linear_rank(fitness: &[f64], sp: f64) -> Result<Vec<f64>> {
    if !(1.0..=2.0).contains(&sp) {
        return Err(GaError::SelectionPressure(sp));
    }
    let n = fitness.len();
    if n == 1 {
        return Ok(vec![1.0]);
    }
    let span = (n - 1) as f64;
    Ok(position(fitness)
        .into_iter()
        .map(|pos| 2.0 - sp + 2.0 * (sp - 1.0) * pos as f64 / span)
        .collect())
}

/// Rounds all values to whole numbers while preserving their
/// order and sum, assuming it is also whole. Rounding is done
/// in the manner that minimizes the average error to the
/// original values. Negative values count as zero.
///
/// # Examples
/// ```
/// let counts = bitga::ranking::round_retain_sum(&[0.2, 1.6, 1.2]);
/// assert_eq!(counts.iter().sum::<usize>(), 3);
/// assert_eq!(counts, vec![0, 2, 1]);
/// ```
pub fn round_retain_sum(values: &[f64]) -> Vec<usize> {
    let total_sum = values.iter().sum::<f64>().round().max(0.0) as usize;
    let mut truncated: Vec<(usize, usize, f64)> = values
        .iter()
        .enumerate()
        .map(|(i, f)| {
            let u = f.max(0.0).floor();
            (i, u as usize, f.max(0.0) - u)
        })
        .collect();
    let truncated_sum: usize = truncated.iter().map(|(_, u, _)| *u).sum();
    let remainder = total_sum.saturating_sub(truncated_sum).min(truncated.len());
    // Sort in decreasing order of error
    truncated.sort_by(|a, b| b.2.total_cmp(&a.2));
    for (_, u, _) in &mut truncated[..remainder] {
        *u += 1;
    }
    truncated.sort_by_key(|(i, ..)| *i);
    truncated.into_iter().map(|(_, u, _)| u).collect()
}

/// Repeats each item `counts[i]` times, keeping the original order.
///
/// # Panics
/// Panics if `items` and `counts` differ in length.
///
/// # Examples
/// ```
/// let children = bitga::ranking::replicate(&['a', 'b', 'c'], &[2, 0, 1]);
/// assert_eq!(children, vec!['a', 'a', 'c']);
/// ```
pub fn replicate<T: Clone>(items: &[T], counts: &[usize]) -> Vec<T> {
    assert_eq!(items.len(), counts.len(), "one count is needed per item");
    items
        .iter()
        .zip(counts)
        .flat_map(|(item, &n)| std::iter::repeat(item).take(n).cloned())
        .collect()
}

use crate::errors::EvaluationError;

use ndarray::{ArrayViewD, Axis};
use rayon::prelude::*;

/// An interface for fitness functions usable by a [`Population`]
/// and an [`Evolver`].
///
/// `individuals` has shape `(k, ...)`, one row per individual
/// to evaluate, and the returned vector must hold exactly `k`
/// scores in the same order. Higher scores are better. A NaN
/// score leaves its individual unevaluated, which blocks
/// proportional selection; map invalid individuals to a low
/// score instead.
///
/// Any `FnMut(ArrayViewD<f64>) -> Vec<f64>` closure is a
/// fitness function; implement the trait directly for
/// evaluations that can fail.
///
/// [`Population`]: crate::Population
/// [`Evolver`]: crate::Evolver
pub trait FitnessFunction {
    fn evaluate(&mut self, individuals: ArrayViewD<'_, f64>) -> Result<Vec<f64>, EvaluationError>;
}

impl<F> FitnessFunction for F
where
    F: FnMut(ArrayViewD<'_, f64>) -> Vec<f64>,
{
    fn evaluate(&mut self, individuals: ArrayViewD<'_, f64>) -> Result<Vec<f64>, EvaluationError> {
        Ok(self(individuals))
    }
}

/// Evaluates each individual independently, in parallel.
///
/// Scores are collected in input order, so they always line
/// up with the rows they were computed from.
///
/// # Examples
/// ```
/// use bitga::{FitnessFunction, PerIndividual};
/// use ndarray::array;
///
/// let mut fitness = PerIndividual(|row: ndarray::ArrayViewD<f64>| row.sum());
/// let scores = fitness.evaluate(array![[1.0, 2.0], [3.0, 4.0]].into_dyn().view()).unwrap();
/// assert_eq!(scores, vec![3.0, 7.0]);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct PerIndividual<G>(pub G);

impl<G> FitnessFunction for PerIndividual<G>
where
    G: Fn(ArrayViewD<'_, f64>) -> f64 + Sync,
{
    fn evaluate(&mut self, individuals: ArrayViewD<'_, f64>) -> Result<Vec<f64>, EvaluationError> {
        let rows: Vec<ArrayViewD<'_, f64>> = individuals.axis_iter(Axis(0)).collect();
        let score = &self.0;
        Ok(rows.par_iter().map(|row| score(row.view())).collect())
    }
}

use crate::errors::{GaError, Result};
use crate::fitness::FitnessFunction;
use crate::populations::{Mutation, Population, PopulationConfig};

use ndarray::{ArrayBase, ArrayD, Data, Dimension};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Configuration data for an [`Evolver`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolverConfig {
    /// Configuration of every generation.
    pub population: PopulationConfig,
    /// Whether a generation whose best fitness is worse than
    /// its predecessor's may replace it.
    pub degeneration: bool,
    /// Whether the best individual ever seen replaces the least
    /// fit member of a generation that has lost it.
    pub elitism: bool,
    /// Evaluated generations larger than this keep only their
    /// fittest members.
    pub population_cap: Option<usize>,
    /// Factor in `(0, 1]` applied to the range of
    /// [`Mutation::Breeder`] whenever the best fitness of the last
    /// generation improved by a relative margin below `1e-6`.
    pub range_reduction: Option<f64>,
}

impl EvolverConfig {
    /// Checks the population configuration and the evolver's own
    /// parameters.
    ///
    /// # Examples
    /// ```
    /// use bitga::EvolverConfig;
    ///
    /// assert!(EvolverConfig::default().validate().is_ok());
    /// let config = EvolverConfig {
    ///     range_reduction: Some(1.5),
    ///     ..EvolverConfig::default()
    /// };
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<()> {
        self.population.validate()?;
        if self.population_cap == Some(0) {
            return Err(GaError::InvalidParameter {
                name: "population cap",
                value: 0.0,
            });
        }
        match self.range_reduction {
            Some(factor) if !(factor > 0.0 && factor <= 1.0) => Err(GaError::InvalidParameter {
                name: "range reduction",
                value: factor,
            }),
            _ => Ok(()),
        }
    }
}

impl Default for EvolverConfig {
    fn default() -> Self {
        EvolverConfig {
            population: PopulationConfig::default(),
            degeneration: true,
            elitism: false,
            population_cap: None,
            range_reduction: None,
        }
    }
}

/// Relative improvement of the best fitness below which the
/// breeder mutation range is reduced.
const STAGNATION_THRESHOLD: f64 = 1e-6;

/// Lifecycle of an [`Evolver`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvolverState {
    /// The initial generation has been evaluated.
    Initialized,
    /// At least one step has run.
    Evolving,
    /// [`Evolver::evolve`] has returned.
    Stopped(StopReason),
}

/// Why [`Evolver::evolve`] stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    TargetReached,
    MaxGenerations,
}

/// Result of a single [`Evolver::step`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// The new generation was appended.
    Advanced,
    /// The new generation was worse and was replaced by a copy
    /// of the current one.
    Rejected,
}

/// Drives a population through successive generations,
/// keeping every generation in its history.
pub struct Evolver<F, R> {
    generations: Vec<Population>,
    fitness_function: F,
    rng: R,
    config: EvolverConfig,
    state: EvolverState,
}

impl<F: FitnessFunction, R: Rng> Evolver<F, R> {
    /// Builds the initial generation from an array of shape
    /// `(N, ...)` and evaluates it.
    ///
    /// # Errors
    /// Returns an error if the population cannot be built or the
    /// fitness function fails.
    pub fn new<S, D>(individuals: &ArrayBase<S, D>, config: EvolverConfig, fitness_function: F, rng: R) -> Result<Self>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        let population = Population::new(individuals, config.population.clone())?;
        Evolver::from_population(population, config, fitness_function, rng)
    }

    /// Starts from an existing population, evaluating any of its
    /// individuals that have no fitness yet. The population takes
    /// on `config.population`.
    pub fn from_population(
        mut population: Population,
        config: EvolverConfig,
        mut fitness_function: F,
        rng: R,
    ) -> Result<Self> {
        config.validate()?;
        population.set_config(config.population.clone())?;
        let evaluated = population.evaluate(&mut fitness_function)?;
        info!(
            size = population.size(),
            evaluated,
            best = ?population.max_fitness(),
            "initialized evolver"
        );
        Ok(Evolver {
            generations: vec![population],
            fitness_function,
            rng,
            config,
            state: EvolverState::Initialized,
        })
    }

    /// Evaluates the individuals of the current generation that
    /// have no fitness yet, returning how many there were.
    pub fn evaluate(&mut self) -> Result<usize> {
        let current = self.generations.len() - 1;
        self.generations[current].evaluate(&mut self.fitness_function)
    }

    /// Produces the next generation: reproduces a copy of the
    /// current one, evaluates its new individuals, truncates it to
    /// the population cap and, with elitism, restores the best
    /// individual ever seen.
    ///
    /// When degeneration is disabled and the new best fitness is
    /// lower than the current one, a copy of the current generation
    /// is appended instead. Either way the history grows by one.
    pub fn step(&mut self) -> Result<StepOutcome> {
        self.reduce_range();
        let current = self.generations.len() - 1;
        let previous_best = self.generations[current].max_fitness();
        let mut next = self.generations[current].clone();
        next.set_config(self.config.population.clone())?;
        next.reproduce(&mut self.rng)?;
        let evaluated = next.evaluate(&mut self.fitness_function)?;
        debug!(evaluated, size = next.size(), "evaluated offspring");
        if let Some(cap) = self.config.population_cap {
            next.truncate(cap)?;
        }
        if self.config.elitism {
            self.restore_elite(&mut next)?;
        }
        let next_best = next.max_fitness();

        let outcome = match (previous_best, next_best) {
            (Some(old), Some(new)) if !self.config.degeneration && new < old => StepOutcome::Rejected,
            _ => StepOutcome::Advanced,
        };
        match outcome {
            StepOutcome::Advanced => self.generations.push(next),
            StepOutcome::Rejected => {
                warn!(
                    generation = current + 1,
                    ?previous_best,
                    ?next_best,
                    "degenerate generation rejected"
                );
                let mut retained = self.generations[current].clone();
                retained.set_config(self.config.population.clone())?;
                self.generations.push(retained);
            }
        }
        self.state = EvolverState::Evolving;

        let population = self.current();
        info!(
            generation = self.generation(),
            best = ?population.max_fitness(),
            mean = ?population.fitness_stats().map(|s| s.mean),
            "generation complete"
        );
        Ok(outcome)
    }

    /// Steps until the best fitness seen reaches `target_fitness`,
    /// or `max_generations` steps have run.
    ///
    /// # Examples
    /// ```
    /// use bitga::{Evolver, EvolverConfig, PerIndividual, StopReason};
    /// use ndarray::{array, ArrayViewD};
    ///
    /// let fitness = PerIndividual(|x: ArrayViewD<f64>| x.sum());
    /// let mut evolver = Evolver::new(
    ///     &array![1.0, 2.0, 3.0],
    ///     EvolverConfig::default(),
    ///     fitness,
    ///     bitga::rng::seeded(0),
    /// )
    /// .unwrap();
    ///
    /// // Already met by the initial generation.
    /// assert_eq!(evolver.evolve(10, 3.0).unwrap(), StopReason::TargetReached);
    /// assert_eq!(evolver.generation(), 0);
    /// ```
    pub fn evolve(&mut self, max_generations: usize, target_fitness: f64) -> Result<StopReason> {
        let mut reason = StopReason::MaxGenerations;
        if self.target_reached(target_fitness) {
            reason = StopReason::TargetReached;
        } else {
            for _ in 0..max_generations {
                self.step()?;
                if self.target_reached(target_fitness) {
                    reason = StopReason::TargetReached;
                    break;
                }
            }
        }
        info!(?reason, generation = self.generation(), best = ?self.best_fit(), "evolution stopped");
        self.state = EvolverState::Stopped(reason);
        Ok(reason)
    }

    fn target_reached(&self, target_fitness: f64) -> bool {
        self.best_fit().map_or(false, |best| best >= target_fitness)
    }

    /// Shrinks the breeder mutation range when the last step
    /// stagnated.
    fn reduce_range(&mut self) {
        let factor = match self.config.range_reduction {
            Some(factor) => factor,
            None => return,
        };
        let n = self.generations.len();
        if n < 2 {
            return;
        }
        let (old, new) = match (self.generations[n - 2].max_fitness(), self.generations[n - 1].max_fitness()) {
            (Some(old), Some(new)) => (old, new),
            _ => return,
        };
        if (new - old) / old.abs() < STAGNATION_THRESHOLD {
            if let Mutation::Breeder { range, .. } = &mut self.config.population.mutation {
                *range *= factor;
                debug!(range = *range, "reduced mutation range");
            }
        }
    }

    fn restore_elite(&self, next: &mut Population) -> Result<()> {
        let (generation, best) = match self.best_generation() {
            Some(best) => best,
            None => return Ok(()),
        };
        if next.max_fitness().map_or(true, |f| f < best) {
            debug!(best, from = generation, "restoring elite");
            next.insert_elite(&self.generations[generation].individual(0)?, best)?;
        }
        Ok(())
    }
}

impl<F, R> Evolver<F, R> {
    /// Generation holding the best individual ever seen, and its
    /// index. The earliest generation wins ties.
    fn best_generation(&self) -> Option<(usize, f64)> {
        self.generations
            .iter()
            .enumerate()
            .filter_map(|(i, g)| g.max_fitness().map(|f| (i, f)))
            .fold(None, |best, (i, f)| match best {
                Some((_, b)) if b >= f => best,
                _ => Some((i, f)),
            })
    }

    /// Best fitness value over every generation.
    pub fn best_fit(&self) -> Option<f64> {
        self.best_generation().map(|(_, f)| f)
    }

    /// Best individual over every generation.
    pub fn best_individual(&self) -> Result<Option<ArrayD<f64>>> {
        match self.best_generation() {
            Some((generation, _)) => Ok(Some(self.generations[generation].individual(0)?)),
            None => Ok(None),
        }
    }

    /// Every generation so far, oldest first.
    pub fn generations(&self) -> &[Population] {
        &self.generations
    }

    /// The most recent generation.
    pub fn current(&self) -> &Population {
        &self.generations[self.generations.len() - 1]
    }

    /// Index of the most recent generation.
    pub fn generation(&self) -> usize {
        self.generations.len() - 1
    }

    pub fn state(&self) -> EvolverState {
        self.state
    }

    /// The configuration in effect, including any reduction of the
    /// mutation range.
    pub fn config(&self) -> &EvolverConfig {
        &self.config
    }

    pub fn rng_mut(&mut self) -> &mut R {
        &mut self.rng
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::BitSelection;
    use crate::errors::{ErrorKind, EvaluationError, GaError};
    use crate::fitness::PerIndividual;
    use crate::rng::seeded;
    use crate::populations::{Sampling, SelectionScheme};
    use ndarray::{array, Array1, Array2, ArrayViewD};

    // Mutation and crossover can produce NaN individuals; they score zero.
    fn finite_or_zero(score: f64) -> f64 {
        if score.is_nan() {
            0.0
        } else {
            score
        }
    }

    fn closeness(x: ArrayViewD<f64>) -> Vec<f64> {
        x.iter().map(|v| finite_or_zero(1.0 / ((v - 1.0).abs() + 1e-6))).collect()
    }

    fn frozen() -> EvolverConfig {
        EvolverConfig {
            population: PopulationConfig::zero(),
            ..EvolverConfig::default()
        }
    }

    #[test]
    fn construction_evaluates() {
        let evolver = Evolver::new(&array![-3.0, -2.0, -1.0, 0.0, 1.0], frozen(), closeness, seeded(0)).unwrap();
        assert_eq!(evolver.state(), EvolverState::Initialized);
        assert_eq!(evolver.generation(), 0);
        assert!(evolver.current().inew().is_empty());
        assert_eq!(evolver.best_individual().unwrap().unwrap(), ndarray::arr0(1.0).into_dyn());
    }

    #[test]
    fn cloning_collapses_onto_optimum() {
        let mut evolver = Evolver::new(&array![-3.0, -2.0, -1.0, 0.0, 1.0], frozen(), closeness, seeded(1)).unwrap();
        assert_eq!(evolver.evolve(50, f64::INFINITY).unwrap(), StopReason::MaxGenerations);
        assert_eq!(evolver.generations().len(), 51);
        assert_eq!(
            evolver.current().individuals().unwrap(),
            Array1::from_elem(5, 1.0).into_dyn()
        );
        assert_eq!(evolver.state(), EvolverState::Stopped(StopReason::MaxGenerations));
    }

    #[test]
    fn history_grows_one_per_step() {
        let config = EvolverConfig {
            population: PopulationConfig::default(),
            ..EvolverConfig::default()
        };
        let individuals = Array2::from_shape_fn((10, 3), |(i, j)| (i + j) as f64 / 4.0);
        let fitness = PerIndividual(|x: ArrayViewD<f64>| finite_or_zero(1.0 / (1.0 + x.mapv(|v| v * v).sum())));
        let mut evolver = Evolver::new(&individuals, config, fitness, seeded(2)).unwrap();
        for k in 1..=5 {
            evolver.step().unwrap();
            assert_eq!(evolver.generation(), k);
            assert_eq!(evolver.state(), EvolverState::Evolving);
            let current = evolver.current();
            assert_eq!(current.size(), 10);
            assert_eq!(current.individual_shape(), &[3]);
            assert!(current.inew().is_empty());
        }
    }

    #[test]
    fn best_fit_scans_history() {
        let mut evolver = Evolver::new(
            &array![-3.0, -2.0, -1.0, 0.0, 1.0],
            EvolverConfig {
                population: PopulationConfig {
                    mutation_probability: 1.0,
                    crossover_probability: 1.0,
                    ..PopulationConfig::default()
                },
                ..EvolverConfig::default()
            },
            closeness,
            seeded(3),
        )
        .unwrap();
        let initial = evolver.best_fit().unwrap();
        evolver.evolve(5, f64::INFINITY).unwrap();
        let best = evolver.best_fit().unwrap();
        assert!(best >= initial);
        let scanned = evolver
            .generations()
            .iter()
            .filter_map(|g| g.max_fitness())
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(best, scanned);
    }

    #[test]
    fn degeneration_guard_keeps_best() {
        let config = EvolverConfig {
            population: PopulationConfig {
                mutation_probability: 1.0,
                mutate_bit_selection: BitSelection::RandBit,
                sampling: Sampling::PerIndividual,
                ..PopulationConfig::zero()
            },
            degeneration: false,
            ..EvolverConfig::default()
        };
        let fitness = PerIndividual(|x: ArrayViewD<f64>| finite_or_zero(1.0 / (1.0 + (x.sum() - 1.0).abs())));
        let mut evolver = Evolver::new(&array![0.5, 1.0, 1.5, 2.0], config, fitness, seeded(4)).unwrap();
        let mut rejected = 0;
        for _ in 0..20 {
            let before = evolver.current().max_fitness().unwrap();
            let outcome = evolver.step().unwrap();
            let after = evolver.current().max_fitness().unwrap();
            assert!(after >= before);
            if outcome == StepOutcome::Rejected {
                rejected += 1;
                let n = evolver.generations().len();
                assert_eq!(evolver.generations()[n - 1].bits(), evolver.generations()[n - 2].bits());
            }
        }
        // The optimum is in the initial generation and every individual is
        // mutated each step, so offspring are almost always worse.
        assert!(rejected > 0);
        assert_eq!(evolver.generations().len(), 21);
    }

    #[test]
    fn stops_at_target() {
        let config = EvolverConfig {
            population: PopulationConfig {
                selection: SelectionScheme::LinearRank { pressure: 2.0 },
                ..PopulationConfig::default()
            },
            ..EvolverConfig::default()
        };
        let fitness = PerIndividual(|x: ArrayViewD<f64>| -(x.sum() - 2.0).abs());
        let mut evolver = Evolver::new(&array![0.0, 0.5, 2.0, 4.0], config, fitness, seeded(5)).unwrap();
        assert_eq!(evolver.evolve(100, -1.0).unwrap(), StopReason::TargetReached);
        assert_eq!(evolver.generation(), 0);
        assert_eq!(evolver.state(), EvolverState::Stopped(StopReason::TargetReached));
    }

    #[test]
    fn linear_rank_evolution_improves() {
        let config = EvolverConfig {
            population: PopulationConfig {
                selection: SelectionScheme::LinearRank { pressure: 2.0 },
                ..PopulationConfig::default()
            },
            degeneration: false,
            ..EvolverConfig::default()
        };
        let individuals = Array2::from_shape_fn((12, 2), |(i, j)| (i as f64 - 6.0) * (j as f64 + 1.0));
        let fitness = PerIndividual(|x: ArrayViewD<f64>| {
            let score = -x.mapv(|v| (v - 1.0).powi(2)).sum();
            if score.is_nan() {
                f64::NEG_INFINITY
            } else {
                score
            }
        });
        let mut evolver = Evolver::new(&individuals, config, fitness, seeded(6)).unwrap();
        let initial = evolver.best_fit().unwrap();
        evolver.evolve(30, 0.0).unwrap();
        assert!(evolver.best_fit().unwrap() >= initial);
        // Without degeneration every generation is at least as good as the last.
        let bests: Vec<f64> = evolver.generations().iter().filter_map(|g| g.max_fitness()).collect();
        assert!(bests.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let run = || {
            let individuals = Array2::from_shape_fn((6, 2), |(i, j)| i as f64 - j as f64 + 0.5);
            let fitness = PerIndividual(|x: ArrayViewD<f64>| finite_or_zero(1.0 / (1.0 + x.mapv(f64::abs).sum())));
            let mut evolver = Evolver::new(&individuals, EvolverConfig::default(), fitness, seeded(7)).unwrap();
            evolver.evolve(10, f64::INFINITY).unwrap();
            evolver.current().bits().clone()
        };
        assert_eq!(run(), run());
    }

    struct FailAfter(usize);

    impl FitnessFunction for FailAfter {
        fn evaluate(&mut self, individuals: ArrayViewD<'_, f64>) -> std::result::Result<Vec<f64>, EvaluationError> {
            if self.0 == 0 {
                return Err("simulation crashed".into());
            }
            self.0 -= 1;
            Ok(vec![1.0; individuals.shape()[0]])
        }
    }

    #[test]
    fn evaluation_errors_propagate() {
        assert!(matches!(
            Evolver::new(&array![1.0], frozen(), FailAfter(0), seeded(8)),
            Err(GaError::Evaluation(_))
        ));

        let config = EvolverConfig {
            population: PopulationConfig {
                mutation_probability: 1.0,
                sampling: Sampling::PerIndividual,
                ..PopulationConfig::zero()
            },
            ..EvolverConfig::default()
        };
        let mut evolver = Evolver::new(&array![1.0, 2.0], config, FailAfter(1), seeded(9)).unwrap();
        let error = evolver.step().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Evaluation);
        assert_eq!(evolver.generation(), 0);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let result = Evolver::new(
            &array![1.0, 2.0, 3.0],
            frozen(),
            |_: ArrayViewD<f64>| -> Vec<f64> { vec![1.0, 2.0] },
            seeded(10),
        );
        assert!(matches!(result, Err(GaError::FitnessDimension { expected: 3, actual: 2 })));
    }

    #[test]
    fn from_existing_population() {
        let population = Population::with_fitness(&array![1.0, 2.0], vec![5.0, f64::NAN], PopulationConfig::zero()).unwrap();
        let mut calls = 0;
        let evolver = Evolver::from_population(
            population,
            EvolverConfig {
                population: PopulationConfig::zero(),
                ..EvolverConfig::default()
            },
            |x: ArrayViewD<f64>| -> Vec<f64> {
                calls += x.len();
                vec![0.0; x.len()]
            },
            seeded(11),
        )
        .unwrap();
        assert_eq!(evolver.current().fitness().unwrap(), &[5.0, 0.0]);
        drop(evolver);
        assert_eq!(calls, 1);
    }

    fn mutate_everyone(elitism: bool) -> EvolverConfig {
        EvolverConfig {
            population: PopulationConfig {
                mutation_probability: 1.0,
                mutate_bit_selection: BitSelection::RandBit,
                sampling: Sampling::PerIndividual,
                ..PopulationConfig::zero()
            },
            elitism,
            ..EvolverConfig::default()
        }
    }

    #[test]
    fn elitism_keeps_best_individual() {
        let fitness = |x: ArrayViewD<f64>| -> Vec<f64> {
            x.iter().map(|v| finite_or_zero(1.0 / (1.0 + (v - 1.0).abs()))).collect()
        };
        let individuals = array![0.5, 1.0, 1.5, 2.0];

        let mut elitist = Evolver::new(&individuals, mutate_everyone(true), fitness, seeded(12)).unwrap();
        for _ in 0..20 {
            assert_eq!(elitist.step().unwrap(), StepOutcome::Advanced);
            assert_eq!(elitist.current().max_fitness(), Some(1.0));
            assert_eq!(elitist.current().individual(0).unwrap(), ndarray::arr0(1.0).into_dyn());
            assert_eq!(elitist.current().size(), 4);
        }

        let mut plain = Evolver::new(&individuals, mutate_everyone(false), fitness, seeded(12)).unwrap();
        plain.evolve(20, f64::INFINITY).unwrap();
        assert!(plain.generations().iter().any(|g| g.max_fitness() < Some(1.0)));
    }

    #[test]
    fn population_cap_bounds_growth() {
        let population = PopulationConfig {
            selection: SelectionScheme::LinearRank { pressure: 2.0 },
            growth_factor: 2.0,
            ..PopulationConfig::zero()
        };
        let individuals = array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let fitness = PerIndividual(|x: ArrayViewD<f64>| x.sum());

        let capped = EvolverConfig {
            population: population.clone(),
            population_cap: Some(6),
            ..EvolverConfig::default()
        };
        let mut evolver = Evolver::new(&individuals, capped, fitness, seeded(13)).unwrap();
        for _ in 0..5 {
            evolver.step().unwrap();
            assert_eq!(evolver.current().size(), 6);
            assert_eq!(evolver.current().max_fitness(), Some(6.0));
        }

        let uncapped = EvolverConfig {
            population,
            ..EvolverConfig::default()
        };
        let mut evolver = Evolver::new(&individuals, uncapped, fitness, seeded(13)).unwrap();
        evolver.step().unwrap();
        assert_eq!(evolver.current().size(), 12);
    }

    #[test]
    fn stagnation_reduces_breeder_range() {
        let config = EvolverConfig {
            population: PopulationConfig {
                mutation: Mutation::Breeder {
                    range: 0.1,
                    precision: 0.001,
                },
                ..PopulationConfig::zero()
            },
            range_reduction: Some(0.5),
            ..EvolverConfig::default()
        };
        let mut evolver = Evolver::new(&array![-3.0, -2.0, -1.0, 0.0, 1.0], config, closeness, seeded(14)).unwrap();
        // The optimum is present from the start, so the best fitness never improves.
        for _ in 0..3 {
            evolver.step().unwrap();
        }
        let reduced = Mutation::Breeder {
            range: 0.025,
            precision: 0.001,
        };
        assert_eq!(evolver.config().population.mutation, reduced);
        assert_eq!(evolver.current().config().mutation, reduced);
    }

    #[test]
    fn invalid_evolver_parameters() {
        for config in [
            EvolverConfig {
                population_cap: Some(0),
                ..EvolverConfig::default()
            },
            EvolverConfig {
                range_reduction: Some(0.0),
                ..EvolverConfig::default()
            },
            EvolverConfig {
                range_reduction: Some(f64::NAN),
                ..EvolverConfig::default()
            },
        ] {
            let result = Evolver::new(&array![1.0], config, closeness, seeded(15));
            assert!(matches!(result, Err(GaError::InvalidParameter { .. })));
        }
    }
}

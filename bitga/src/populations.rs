//! A Population is a set of real-valued individuals stored as
//! bit strings, together with their fitness. Individuals are
//! kept sorted by decreasing fitness, with those awaiting
//! evaluation at the back.
mod config;
pub mod logging;

pub use config::{Mutation, PopulationConfig, Sampling, SelectionScheme};

use crate::bits::{BitSelection, BitSet};
use crate::errors::{GaError, Result};
use crate::fitness::FitnessFunction;
use crate::{breeder, ranking, rng};
use config::{check_positive, check_probability};
use logging::Stats;

use ndarray::{ArrayBase, ArrayD, Axis, Data, Dimension, IxDyn, ShapeError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fitness value of individuals that must be (re)evaluated.
pub const UNEVALUATED: f64 = f64::NAN;

/// A population of bit-encoded individuals.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Population {
    individuals: BitSet,
    #[serde(with = "unevaluated_as_none")]
    fitness: Vec<f64>,
    /// Whether fitness has been set since the individuals were.
    #[serde(default)]
    fitness_assigned: bool,
    config: PopulationConfig,
}

impl Population {
    /// Creates a population from an array of shape `(N, ...)`,
    /// one row per individual. All fitness values start out
    /// [unevaluated](UNEVALUATED).
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid, the array
    /// is zero-dimensional, or it holds no individuals.
    ///
    /// # Examples
    /// ```
    /// use bitga::{Population, PopulationConfig};
    /// use ndarray::array;
    ///
    /// let population = Population::new(&array![[0.0, 1.0], [2.0, 3.0]], PopulationConfig::zero()).unwrap();
    /// assert_eq!(population.size(), 2);
    /// assert_eq!(population.individual_shape(), &[2]);
    /// assert_eq!(population.inew(), vec![0, 1]);
    /// assert!(population.fitness().is_err());
    /// ```
    pub fn new<S, D>(individuals: &ArrayBase<S, D>, config: PopulationConfig) -> Result<Population>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        config.validate()?;
        let individuals = encode_individuals(individuals, &config)?;
        let fitness = vec![UNEVALUATED; individuals.rows()];
        Ok(Population {
            individuals,
            fitness,
            fitness_assigned: false,
            config,
        })
    }

    /// Creates a population with known fitness values, sorted
    /// by decreasing fitness.
    ///
    /// # Errors
    /// As [`new`](Population::new), and returns
    /// [`GaError::FitnessDimension`] if there is not exactly
    /// one fitness value per individual.
    pub fn with_fitness<S, D>(
        individuals: &ArrayBase<S, D>,
        fitness: Vec<f64>,
        config: PopulationConfig,
    ) -> Result<Population>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        let mut population = Population::new(individuals, config)?;
        population.set_fitness(fitness)?;
        Ok(population)
    }

    /// Replaces every individual, rebuilding the bit strings
    /// from scratch. All fitness values become unevaluated.
    pub fn set_individuals<S, D>(&mut self, individuals: &ArrayBase<S, D>) -> Result<()>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        self.individuals = encode_individuals(individuals, &self.config)?;
        self.fitness = vec![UNEVALUATED; self.individuals.rows()];
        self.fitness_assigned = false;
        Ok(())
    }

    /// Returns the decoded individuals, in order of decreasing
    /// fitness.
    pub fn individuals(&self) -> Result<ArrayD<f64>> {
        self.individuals.to_float_array()
    }

    /// Returns a single decoded individual.
    pub fn individual(&self, index: usize) -> Result<ArrayD<f64>> {
        if index >= self.size() {
            return Err(GaError::IndexOutOfBounds {
                index,
                size: self.size(),
            });
        }
        let values = self.individuals.row(index).iter().map(|b| b.decode()).collect();
        Ok(ArrayD::from_shape_vec(IxDyn(self.individual_shape()), values)?)
    }

    /// The underlying bit strings.
    pub fn bits(&self) -> &BitSet {
        &self.individuals
    }

    /// Returns the fitness values, sorted in decreasing order with
    /// unevaluated entries last.
    ///
    /// # Errors
    /// Returns [`GaError::FitnessNotSet`] if fitness was never set
    /// for the current individuals. A population whose individuals
    /// were all invalidated by mutation or crossover still returns
    /// its (unevaluated) fitness.
    pub fn fitness(&self) -> Result<&[f64]> {
        if !self.fitness_assigned {
            return Err(GaError::FitnessNotSet);
        }
        Ok(&self.fitness)
    }

    /// Returns the fitness values, including unevaluated ones.
    pub fn raw_fitness(&self) -> &[f64] {
        &self.fitness
    }

    /// Sets every fitness value and re-sorts the population.
    ///
    /// # Errors
    /// Returns [`GaError::FitnessDimension`] if there is not
    /// exactly one value per individual.
    ///
    /// # Examples
    /// ```
    /// use bitga::{Population, PopulationConfig};
    /// use ndarray::array;
    ///
    /// let mut population = Population::new(&array![1.0, 2.0, 3.0], PopulationConfig::zero()).unwrap();
    /// assert!(population.set_fitness(vec![1.0, 2.0]).is_err());
    ///
    /// population.set_fitness(vec![1.0, 3.0, 2.0]).unwrap();
    /// assert_eq!(population.fitness().unwrap(), &[3.0, 2.0, 1.0]);
    /// assert_eq!(population.individuals().unwrap(), array![2.0, 3.0, 1.0].into_dyn());
    /// ```
    pub fn set_fitness(&mut self, fitness: Vec<f64>) -> Result<()> {
        if fitness.len() != self.size() {
            return Err(GaError::FitnessDimension {
                expected: self.size(),
                actual: fitness.len(),
            });
        }
        self.fitness = fitness;
        self.fitness_assigned = true;
        self.sort();
        Ok(())
    }

    /// Writes fitness values back to the individuals at `indices`
    /// (as they were before this call), then re-sorts.
    pub fn assign_fitness(&mut self, indices: &[usize], fitness: &[f64]) -> Result<()> {
        if indices.len() != fitness.len() {
            return Err(GaError::FitnessDimension {
                expected: indices.len(),
                actual: fitness.len(),
            });
        }
        if let Some(&index) = indices.iter().find(|&&i| i >= self.size()) {
            return Err(GaError::IndexOutOfBounds {
                index,
                size: self.size(),
            });
        }
        for (&i, &f) in indices.iter().zip(fitness) {
            self.fitness[i] = f;
        }
        self.fitness_assigned = true;
        self.sort();
        Ok(())
    }

    /// Evaluates every individual awaiting evaluation, and
    /// returns how many there were.
    ///
    /// # Errors
    /// Propagates failures of the fitness function as
    /// [`GaError::Evaluation`], and returns
    /// [`GaError::FitnessDimension`] if it returns the wrong
    /// number of values.
    ///
    /// # Examples
    /// ```
    /// use bitga::{Population, PopulationConfig};
    /// use ndarray::{array, ArrayViewD};
    ///
    /// let mut population = Population::new(&array![1.0, -4.0, 2.0], PopulationConfig::zero()).unwrap();
    /// let evaluated = population
    ///     .evaluate(&mut |x: ArrayViewD<f64>| x.iter().map(|v| -v.abs()).collect::<Vec<f64>>())
    ///     .unwrap();
    ///
    /// assert_eq!(evaluated, 3);
    /// assert_eq!(population.fitness().unwrap(), &[-1.0, -2.0, -4.0]);
    /// ```
    pub fn evaluate<F: FitnessFunction + ?Sized>(&mut self, fitness_function: &mut F) -> Result<usize> {
        let inew = self.inew();
        if inew.is_empty() {
            return Ok(0);
        }
        let selected = self.individuals()?.select(Axis(0), &inew);
        let scores = fitness_function
            .evaluate(selected.view())
            .map_err(GaError::Evaluation)?;
        self.assign_fitness(&inew, &scores)?;
        debug!(evaluated = inew.len(), "evaluated new individuals");
        Ok(inew.len())
    }

    /// Indices of the individuals awaiting evaluation.
    pub fn inew(&self) -> Vec<usize> {
        (0..self.size()).filter(|&i| self.fitness[i].is_nan()).collect()
    }

    /// Number of individuals.
    pub fn size(&self) -> usize {
        self.individuals.rows()
    }

    /// Shape of a single individual.
    pub fn individual_shape(&self) -> &[usize] {
        &self.individuals.shape()[1..]
    }

    pub fn config(&self) -> &PopulationConfig {
        &self.config
    }

    /// Replaces the configuration used by later operations.
    ///
    /// # Errors
    /// Returns an error if `config` is invalid or changes the
    /// encoding width.
    pub fn set_config(&mut self, config: PopulationConfig) -> Result<()> {
        config.validate()?;
        if config.width != self.individuals.width() {
            return Err(GaError::InvalidWidth(config.width.bits()));
        }
        self.config = config;
        Ok(())
    }

    /// Keeps only the `size` fittest individuals.
    ///
    /// # Errors
    /// Returns [`GaError::EmptyPopulation`] if `size` is zero.
    pub fn truncate(&mut self, size: usize) -> Result<()> {
        if size == 0 {
            return Err(GaError::EmptyPopulation);
        }
        if size < self.size() {
            let kept: Vec<usize> = (0..size).collect();
            self.individuals = self.individuals.select_rows(&kept);
            self.fitness.truncate(size);
        }
        Ok(())
    }

    /// Replaces the least fit individual with `individual`, whose
    /// fitness is already known.
    ///
    /// # Errors
    /// Returns [`GaError::Shape`] if `individual` does not have the
    /// shape of the population's individuals.
    ///
    /// # Examples
    /// ```
    /// use bitga::{Population, PopulationConfig};
    /// use ndarray::array;
    ///
    /// let mut population =
    ///     Population::with_fitness(&array![[1.0], [2.0]], vec![1.0, 2.0], PopulationConfig::zero()).unwrap();
    /// population.insert_elite(&array![7.0].into_dyn(), 5.0).unwrap();
    /// assert_eq!(population.individuals().unwrap(), array![[7.0], [2.0]].into_dyn());
    /// assert_eq!(population.fitness().unwrap(), &[5.0, 2.0]);
    /// ```
    pub fn insert_elite(&mut self, individual: &ArrayD<f64>, fitness: f64) -> Result<()> {
        if individual.shape() != self.individual_shape() {
            return Err(ShapeError::from_kind(ndarray::ErrorKind::IncompatibleShape).into());
        }
        let values: Vec<f64> = individual.iter().copied().collect();
        let last = self.size() - 1;
        self.individuals.set_row(last, &values);
        self.fitness[last] = fitness;
        self.fitness_assigned = true;
        self.sort();
        Ok(())
    }

    /// The best fitness value, unless nothing is evaluated.
    pub fn max_fitness(&self) -> Option<f64> {
        self.fitness.first().copied().filter(|f| !f.is_nan())
    }

    /// The best individual and its fitness, unless nothing is
    /// evaluated.
    pub fn champion(&self) -> Result<Option<(ArrayD<f64>, f64)>> {
        match self.max_fitness() {
            Some(fitness) => Ok(Some((self.individual(0)?, fitness))),
            None => Ok(None),
        }
    }

    /// Statistics over the evaluated fitness values.
    pub fn fitness_stats(&self) -> Option<Stats> {
        Stats::from(self.fitness.iter().copied().filter(|f| !f.is_nan()))
    }

    /// Replaces the population with a new generation drawn from it
    /// with a bias towards fitter individuals, as configured by
    /// [`PopulationConfig::selection`].
    pub fn resample<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        match self.config.selection {
            SelectionScheme::Proportional => self.clone_by_fitness(rng),
            SelectionScheme::LinearRank { pressure } => {
                self.clone_by_rank(pressure, self.config.growth_factor)
            }
        }
    }

    /// Fitness-proportional resampling with replacement.
    ///
    /// `N` uniform draws, scaled to the total fitness, are bucketed
    /// by cumulative fitness; each individual is then repeated once
    /// per draw in its bucket, keeping the population order.
    ///
    /// # Errors
    /// Returns [`GaError::FitnessNotSet`] or
    /// [`GaError::DegeneratePopulation`] unless every fitness value
    /// is evaluated, finite and non-negative, with a positive total.
    pub fn clone_by_fitness<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        let fitness = self.evaluated_fitness()?;
        if fitness.iter().any(|f| *f < 0.0 || f.is_infinite()) {
            return Err(GaError::DegeneratePopulation(
                "fitness must be finite and non-negative",
            ));
        }
        let cumulative: Vec<f64> = fitness
            .iter()
            .scan(0.0, |sum, f| {
                *sum += f;
                Some(*sum)
            })
            .collect();
        let n = self.size();
        let total = cumulative[n - 1];
        if total <= 0.0 {
            return Err(GaError::DegeneratePopulation("total fitness is zero"));
        }

        // Draws past the last bucket can only come from rounding.
        let last_positive = fitness.iter().rposition(|&f| f > 0.0).unwrap_or(n - 1);
        let mut draws: Vec<f64> = (0..n).map(|_| rng.gen::<f64>() * total).collect();
        draws.sort_by(f64::total_cmp);
        let mut children = vec![0; n];
        for draw in draws {
            match cumulative.partition_point(|&c| c <= draw) {
                bucket if bucket < n => children[bucket] += 1,
                _ => children[last_positive] += 1,
            }
        }
        debug!(?children, "cloning by fitness");
        self.repeat_rows(&children);
        Ok(())
    }

    /// Resampling by linear rank: child counts are the ranks of
    /// [`ranking::linear_rank`], scaled by `growth`, rounded to whole
    /// numbers. With `growth != 1` the population size changes to
    /// about `growth * N`.
    ///
    /// # Errors
    /// Returns an error if any individual is unevaluated, the
    /// selective pressure is not in `[1, 2]`, `growth` is not
    /// positive, or no child would be left.
    pub fn clone_by_rank(&mut self, pressure: f64, growth: f64) -> Result<()> {
        check_positive("growth factor", growth)?;
        let rank: Vec<f64> = ranking::linear_rank(self.evaluated_fitness()?, pressure)?
            .into_iter()
            .map(|r| r * growth)
            .collect();
        let children = ranking::round_retain_sum(&rank);
        if children.iter().all(|&c| c == 0) {
            return Err(GaError::EmptyPopulation);
        }
        debug!(?children, pressure, growth, "cloning by rank");
        self.repeat_rows(&children);
        Ok(())
    }

    fn evaluated_fitness(&self) -> Result<&[f64]> {
        let fitness = self.fitness()?;
        if fitness.iter().any(|f| f.is_nan()) {
            return Err(GaError::DegeneratePopulation(
                "population has unevaluated individuals",
            ));
        }
        Ok(fitness)
    }

    /// Rebuilds the population repeating individual `i`
    /// `children[i]` times. Parents are sorted, so the
    /// children are too.
    fn repeat_rows(&mut self, children: &[usize]) {
        let parents: Vec<usize> = (0..self.size()).collect();
        let order = ranking::replicate(&parents, children);
        self.individuals = self.individuals.select_rows(&order);
        self.fitness = order.iter().map(|&i| self.fitness[i]).collect();
    }

    /// Mutates the population as configured, returning the
    /// number of distinct individuals invalidated.
    pub fn mutate<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<usize> {
        let pm = self.config.mutation_probability;
        match self.config.mutation {
            Mutation::BitInversion => {
                let selection = self.config.mutate_bit_selection.clone();
                self.mutate_with(pm, &selection, rng)
            }
            Mutation::Breeder { range, precision } => self.mutate_breeder(pm, range, precision, rng),
        }
    }

    /// Applies [`breeder::bga_mutate`] to the decoded values of
    /// `Binomial(N, pm)` individual slots, chosen as for
    /// [`mutate_with`](Population::mutate_with). Only individuals
    /// whose values actually changed are invalidated.
    ///
    /// Returns the number of distinct individuals invalidated.
    pub fn mutate_breeder<R: Rng + ?Sized>(
        &mut self,
        pm: f64,
        range: f64,
        precision: f64,
        rng: &mut R,
    ) -> Result<usize> {
        check_probability(pm)?;
        let size = self.size();
        let mut touched = vec![false; size];
        for slot in self.slots(pm, rng) {
            let row = slot.unwrap_or_else(|| rng.gen_range(0..size));
            let before = self.individuals.row(row).to_vec();
            let mut values: Vec<f64> = before.iter().map(|b| b.decode()).collect();
            breeder::bga_mutate(&mut values, range, precision, rng);
            self.individuals.set_row(row, &values);
            if self.individuals.row(row) != before.as_slice() {
                self.fitness[row] = UNEVALUATED;
                touched[row] = true;
            }
        }
        Ok(self.finish_operator("breeder mutation", pm, &touched))
    }

    /// Individual slots for an operator applied with probability
    /// `p`: row indices under [`Sampling::PerIndividual`], or `None`
    /// for rows still to be drawn uniformly under
    /// [`Sampling::Replacement`].
    fn slots<R: Rng + ?Sized>(&self, p: f64, rng: &mut R) -> Vec<Option<usize>> {
        match self.config.sampling {
            Sampling::Replacement => vec![None; rng::binomial(rng, self.size(), p)],
            Sampling::PerIndividual => rng::bernoulli_hits(rng, self.size(), p)
                .into_iter()
                .map(Some)
                .collect(),
        }
    }

    /// Inverts bits of `Binomial(N, pm)` individual slots, chosen as
    /// configured by [`PopulationConfig::sampling`], according to
    /// `selection`. Mutated individuals become unevaluated and move
    /// to the back of the population.
    ///
    /// Returns the number of distinct individuals invalidated.
    ///
    /// # Examples
    /// ```
    /// use bitga::bits::BitSelection;
    /// use bitga::{Population, PopulationConfig, Sampling};
    /// use ndarray::Array1;
    ///
    /// let mut rng = bitga::rng::seeded(1);
    /// let config = PopulationConfig {
    ///     sampling: Sampling::PerIndividual,
    ///     ..PopulationConfig::zero()
    /// };
    /// let mut population = Population::with_fitness(&Array1::from_elem(6, 1.5), vec![1.0; 6], config).unwrap();
    ///
    /// let touched = population.mutate_with(1.0, &BitSelection::All, &mut rng).unwrap();
    /// assert_eq!(touched, 6);
    /// assert!(population.individuals().unwrap().iter().all(|&v| v != 1.5 && v.is_finite()));
    /// ```
    pub fn mutate_with<R: Rng + ?Sized>(
        &mut self,
        pm: f64,
        selection: &BitSelection,
        rng: &mut R,
    ) -> Result<usize> {
        check_probability(pm)?;
        selection.validate(self.individuals.width())?;
        let size = self.size();
        let mut touched = vec![false; size];
        for slot in self.slots(pm, rng) {
            let row = slot.unwrap_or_else(|| rng.gen_range(0..size));
            let targets: Vec<usize> = self.individuals.row_range(row).collect();
            self.individuals.invert(selection, Some(&targets), rng)?;
            self.fitness[row] = UNEVALUATED;
            touched[row] = true;
        }
        Ok(self.finish_operator("mutation", pm, &touched))
    }

    /// Crosses the population as configured, returning the
    /// number of distinct individuals invalidated.
    pub fn cross<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<usize> {
        self.cross_with(self.config.crossover_probability, rng)
    }

    /// Performs `Binomial(N, px)` single-point crossovers between
    /// pairs of individuals. Every element of the paired rows is
    /// crossed at its own random cut. Pairs are drawn uniformly with
    /// replacement, so an individual may be paired with itself.
    /// Crossed individuals become unevaluated and move to the back
    /// of the population.
    ///
    /// Returns the number of distinct individuals invalidated.
    pub fn cross_with<R: Rng + ?Sized>(&mut self, px: f64, rng: &mut R) -> Result<usize> {
        check_probability(px)?;
        let size = self.size();
        let mut touched = vec![false; size];
        for first in self.slots(px, rng) {
            let i0 = first.unwrap_or_else(|| rng.gen_range(0..size));
            let i1 = rng.gen_range(0..size);
            let idx0: Vec<usize> = self.individuals.row_range(i0).collect();
            let idx1: Vec<usize> = self.individuals.row_range(i1).collect();
            self.individuals.cross(&idx0, &idx1, rng)?;
            for i in [i0, i1] {
                self.fitness[i] = UNEVALUATED;
                touched[i] = true;
            }
        }
        Ok(self.finish_operator("crossover", px, &touched))
    }

    fn finish_operator(&mut self, operator: &str, probability: f64, touched: &[bool]) -> usize {
        let touched = touched.iter().filter(|&&t| t).count();
        debug!(operator, probability, touched, size = self.size(), "applied operator");
        self.sort();
        touched
    }

    /// Clones, crosses and mutates the population, in that order.
    ///
    /// # Examples
    /// ```
    /// use bitga::{Population, PopulationConfig};
    /// use ndarray::array;
    ///
    /// let mut rng = bitga::rng::seeded(5);
    /// let mut population = Population::with_fitness(
    ///     &array![[0.5, 1.0], [2.0, 4.0], [8.0, 16.0]],
    ///     vec![1.0, 2.0, 3.0],
    ///     PopulationConfig::default(),
    /// )
    /// .unwrap();
    ///
    /// population.reproduce(&mut rng).unwrap();
    /// assert_eq!(population.size(), 3);
    /// assert_eq!(population.individual_shape(), &[2]);
    /// ```
    pub fn reproduce<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        self.resample(rng)?;
        self.cross(rng)?;
        self.mutate(rng)?;
        Ok(())
    }

    /// Like [`reproduce`](Population::reproduce), but operates on
    /// and returns a copy, leaving `self` untouched.
    pub fn reproduced<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Population> {
        let mut next = self.clone();
        next.reproduce(rng)?;
        Ok(next)
    }

    /// Stable sort by decreasing fitness; unevaluated individuals
    /// keep their relative order at the back.
    fn sort(&mut self) {
        let fitness = &self.fitness;
        let mut order: Vec<usize> = (0..fitness.len()).collect();
        order.sort_by(|&a, &b| match (fitness[a].is_nan(), fitness[b].is_nan()) {
            (false, false) => fitness[b].total_cmp(&fitness[a]),
            (a_new, b_new) => a_new.cmp(&b_new),
        });
        if order.iter().enumerate().all(|(k, &i)| k == i) {
            return;
        }
        self.individuals = self.individuals.select_rows(&order);
        self.fitness = order.iter().map(|&i| self.fitness[i]).collect();
    }
}

/// Fitness serializes with `null` for unevaluated entries, since
/// formats such as JSON cannot carry NaN.
mod unevaluated_as_none {
    use super::UNEVALUATED;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(fitness: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        let fitness: Vec<Option<f64>> = fitness.iter().map(|f| Some(*f).filter(|f| !f.is_nan())).collect();
        fitness.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        let fitness = Vec::<Option<f64>>::deserialize(deserializer)?;
        Ok(fitness.into_iter().map(|f| f.unwrap_or(UNEVALUATED)).collect())
    }
}

fn encode_individuals<S, D>(individuals: &ArrayBase<S, D>, config: &PopulationConfig) -> Result<BitSet>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    match individuals.shape().first() {
        None => Err(ShapeError::from_kind(ndarray::ErrorKind::IncompatibleShape).into()),
        Some(0) => Err(GaError::EmptyPopulation),
        Some(_) => Ok(BitSet::new(individuals.view(), config.width)),
    }
}

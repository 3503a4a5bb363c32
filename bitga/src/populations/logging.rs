use super::Population;
use crate::errors::Result;

use ndarray::ArrayD;
use std::fmt;

/// Defines different possible reporting levels for logging.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportingLevel {
    /// Copies every individual and its fitness.
    AllIndividuals,
    /// Copies only the population champion.
    Champion,
    /// Copies no individuals.
    NoIndividuals,
}

/// A snapshot of a population.
#[derive(Clone, Debug)]
pub struct Log {
    pub generation_number: usize,
    pub generation_sample: GenerationMemberRecord,
    /// Statistics over evaluated fitness values, if there are any.
    pub fitness: Option<Stats>,
    /// Number of individuals awaiting evaluation.
    pub unevaluated: usize,
}

impl fmt::Display for Log {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Log {{\n\
            \tgeneration_number: {:?}\n\
            \tunevaluated: {:?}\n\
            \tfitness: {:?}\n\
            }}",
            &self.generation_number, &self.unevaluated, &self.fitness,
        )
    }
}

/// A struct for reporting basic statistical data.
#[derive(Clone, Debug, PartialEq)]
pub struct Stats {
    pub maximum: f64,
    pub minimum: f64,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
}

impl Stats {
    /// Returns statistics about numbers in a sequence,
    /// or `None` if the sequence is empty or holds NaNs.
    ///
    /// # Examples
    /// ```
    /// use bitga::logging::Stats;
    ///
    /// let stats = Stats::from([-2.0, -1.0, 0.5, 1.0, 1.5].iter().copied()).unwrap();
    /// assert_eq!(stats.maximum, 1.5);
    /// assert_eq!(stats.minimum, -2.0);
    /// assert_eq!(stats.mean, 0.0);
    /// assert_eq!(stats.median, 0.5);
    /// ```
    pub fn from(data: impl Iterator<Item = f64>) -> Option<Stats> {
        let mut data: Vec<f64> = data.collect();
        if data.is_empty() || data.iter().any(|d| d.is_nan()) {
            return None;
        }
        data.sort_by(f64::total_cmp);
        let n = data.len() as f64;
        let mean = data.iter().sum::<f64>() / n;
        let variance = data.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;
        let mid = data.len() / 2;
        let median = if data.len() % 2 == 0 {
            (data[mid - 1] + data[mid]) / 2.0
        } else {
            data[mid]
        };
        Some(Stats {
            maximum: data[data.len() - 1],
            minimum: data[0],
            mean,
            median,
            std_dev: variance.sqrt(),
        })
    }
}

/// A reporting-level dependant store
/// of individuals from a population.
#[derive(Clone, Debug)]
pub enum GenerationMemberRecord {
    /// Every individual, with its fitness.
    Individuals(ArrayD<f64>, Vec<f64>),
    /// Only the population champion and its fitness.
    Champion(ArrayD<f64>, f64),
    /// Empty.
    None,
}

/// A log of the evolution of a population over time.
#[derive(Clone, Debug)]
pub struct EvolutionLogger {
    reporting_level: ReportingLevel,
    logs: Vec<Log>,
}

impl EvolutionLogger {
    /// Returns a logger with the appropiate reporting level.
    pub fn new(reporting_level: ReportingLevel) -> EvolutionLogger {
        EvolutionLogger {
            reporting_level,
            logs: vec![],
        }
    }

    /// Store a snapshot of a population.
    ///
    /// # Examples
    /// ```
    /// use bitga::logging::{EvolutionLogger, GenerationMemberRecord, ReportingLevel};
    /// use bitga::{Population, PopulationConfig};
    /// use ndarray::array;
    ///
    /// let mut logger = EvolutionLogger::new(ReportingLevel::Champion);
    /// let population = Population::with_fitness(
    ///     &array![1.0, 2.0, 3.0],
    ///     vec![0.5, 3.0, 1.0],
    ///     PopulationConfig::zero(),
    /// )
    /// .unwrap();
    ///
    /// logger.log(0, &population).unwrap();
    /// let log = logger.iter().next().unwrap();
    /// assert_eq!(log.fitness.as_ref().unwrap().maximum, 3.0);
    /// assert!(matches!(&log.generation_sample, GenerationMemberRecord::Champion(_, f) if *f == 3.0));
    /// ```
    pub fn log(&mut self, generation_number: usize, population: &Population) -> Result<()> {
        let generation_sample = match self.reporting_level {
            ReportingLevel::AllIndividuals => GenerationMemberRecord::Individuals(
                population.individuals()?,
                population.raw_fitness().to_vec(),
            ),
            ReportingLevel::Champion => match population.champion()? {
                Some((individual, fitness)) => GenerationMemberRecord::Champion(individual, fitness),
                None => GenerationMemberRecord::None,
            },
            ReportingLevel::NoIndividuals => GenerationMemberRecord::None,
        };
        self.logs.push(Log {
            generation_number,
            generation_sample,
            fitness: population.fitness_stats(),
            unevaluated: population.inew().len(),
        });
        Ok(())
    }

    /// Iterate over all logged snapshots.
    pub fn iter(&self) -> impl Iterator<Item = &Log> {
        self.logs.iter()
    }

    /// The most recent snapshot.
    pub fn last(&self) -> Option<&Log> {
        self.logs.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_even_length_median() {
        let stats = Stats::from([4.0, 1.0, 3.0, 2.0].iter().copied()).unwrap();
        assert_eq!(stats.median, 2.5);
        assert_eq!(stats.mean, 2.5);
        assert!((stats.std_dev - 1.25f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn stats_of_nothing() {
        assert!(Stats::from(std::iter::empty()).is_none());
        assert!(Stats::from([1.0, f64::NAN].iter().copied()).is_none());
    }
}

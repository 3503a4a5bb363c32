use crate::bits::{BitSelection, Width};
use crate::errors::{GaError, Result};

use serde::{Deserialize, Serialize};

/// How individuals are picked for mutation and crossover.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sampling {
    /// Draw `Binomial(N, p)` slots uniformly with replacement;
    /// an individual may be picked more than once.
    Replacement,
    /// One Bernoulli trial per individual; each individual is
    /// picked at most once.
    PerIndividual,
}

/// How mutation changes an individual.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mutation {
    /// Invert bits chosen by [`PopulationConfig::mutate_bit_selection`].
    BitInversion,
    /// Breeder GA steps on the decoded values, see
    /// [`bga_mutate`](crate::breeder::bga_mutate).
    Breeder { range: f64, precision: f64 },
}

/// How the next generation is cloned from the current one.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionScheme {
    /// Fitness-proportional resampling. Requires all fitness
    /// values to be evaluated and non-negative.
    Proportional,
    /// Child counts from a linear rank transform with the given
    /// selective pressure in `[1, 2]`, scaled by
    /// [`PopulationConfig::growth_factor`]. Works with any fitness sign.
    LinearRank { pressure: f64 },
}

/// Configuration data for population reproduction.
///
/// # Note
/// All quantities expressing probabilities should be in
/// the range [0.0, 1.0]; [`validate`] rejects anything else.
///
/// [`validate`]: PopulationConfig::validate
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    /// Bit width individuals are encoded with.
    pub width: Width,
    /// Chance, per individual slot, of a mutation.
    pub mutation_probability: f64,
    /// Chance, per individual slot, of a crossover pairing.
    pub crossover_probability: f64,
    /// Mutation operator.
    pub mutation: Mutation,
    /// Bits eligible for inversion during bit-inversion mutation.
    pub mutate_bit_selection: BitSelection,
    /// How mutation and crossover pick their individuals.
    pub sampling: Sampling,
    /// How generations are cloned.
    pub selection: SelectionScheme,
    /// Multiplies rank-based child counts, so a generation has about
    /// `growth_factor * N` individuals. Ignored by proportional selection.
    pub growth_factor: f64,
}

impl PopulationConfig {
    /// Returns a "zero-valued" configuration: no mutation,
    /// no crossover, 64-bit encoding, all-bit mutation and
    /// proportional selection.
    ///
    /// # Examples
    /// ```
    /// use bitga::PopulationConfig;
    ///
    /// let cfg = PopulationConfig {
    ///     // Specify some values here...
    ///     mutation_probability: 0.1,
    ///     // Default the rest...
    ///     ..PopulationConfig::zero()
    /// };
    /// assert!(cfg.validate().is_ok());
    /// ```
    pub const fn zero() -> PopulationConfig {
        PopulationConfig {
            width: Width::W64,
            mutation_probability: 0.0,
            crossover_probability: 0.0,
            mutation: Mutation::BitInversion,
            mutate_bit_selection: BitSelection::All,
            sampling: Sampling::Replacement,
            selection: SelectionScheme::Proportional,
            growth_factor: 1.0,
        }
    }

    /// Checks probabilities, selective pressure, growth factor,
    /// breeder parameters and fixed bit positions.
    pub fn validate(&self) -> Result<()> {
        for p in [self.mutation_probability, self.crossover_probability] {
            check_probability(p)?;
        }
        if let SelectionScheme::LinearRank { pressure } = self.selection {
            if !(1.0..=2.0).contains(&pressure) {
                return Err(GaError::SelectionPressure(pressure));
            }
        }
        check_positive("growth factor", self.growth_factor)?;
        if let Mutation::Breeder { range, precision } = self.mutation {
            check_non_negative("mutation range", range)?;
            check_non_negative("mutation precision", precision)?;
        }
        self.mutate_bit_selection.validate(self.width)
    }
}

/// 64-bit encoding, `pm = px = 0.5`, sign-and-section mutation,
/// sampling with replacement and proportional selection.
impl Default for PopulationConfig {
    fn default() -> Self {
        PopulationConfig {
            mutation_probability: 0.5,
            crossover_probability: 0.5,
            mutate_bit_selection: BitSelection::RandBitsSignAndSection,
            ..PopulationConfig::zero()
        }
    }
}

pub(crate) fn check_probability(p: f64) -> Result<()> {
    if (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(GaError::Probability(p))
    }
}

pub(crate) fn check_positive(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(GaError::InvalidParameter { name, value })
    }
}

fn check_non_negative(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(GaError::InvalidParameter { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_bad_values() {
        let bad_pm = PopulationConfig {
            mutation_probability: 1.5,
            ..PopulationConfig::zero()
        };
        assert!(matches!(bad_pm.validate(), Err(GaError::Probability(_))));

        let bad_px = PopulationConfig {
            crossover_probability: f64::NAN,
            ..PopulationConfig::zero()
        };
        assert!(bad_px.validate().is_err());

        let bad_sp = PopulationConfig {
            selection: SelectionScheme::LinearRank { pressure: 3.0 },
            ..PopulationConfig::zero()
        };
        assert!(matches!(bad_sp.validate(), Err(GaError::SelectionPressure(_))));

        let bad_bits = PopulationConfig {
            width: Width::W32,
            mutate_bit_selection: BitSelection::Positions(vec![33]),
            ..PopulationConfig::zero()
        };
        assert!(matches!(bad_bits.validate(), Err(GaError::BitPosition { .. })));

        let bad_growth = PopulationConfig {
            growth_factor: 0.0,
            ..PopulationConfig::zero()
        };
        assert!(matches!(
            bad_growth.validate(),
            Err(GaError::InvalidParameter { name: "growth factor", .. })
        ));

        let bad_range = PopulationConfig {
            mutation: Mutation::Breeder {
                range: -0.1,
                precision: 0.001,
            },
            ..PopulationConfig::zero()
        };
        assert!(bad_range.validate().is_err());
    }

    #[test]
    fn default_is_valid() {
        assert!(PopulationConfig::default().validate().is_ok());
        assert!(PopulationConfig::zero().validate().is_ok());
    }

    #[test]
    fn deserialize_partial() {
        let cfg: PopulationConfig = serde_json::from_str(
            r#"{"width": 32, "mutate_bit_selection": "rand_bit",
                "selection": {"linear_rank": {"pressure": 1.5}}}"#,
        )
        .unwrap();
        assert_eq!(cfg.width, Width::W32);
        assert_eq!(cfg.mutate_bit_selection, BitSelection::RandBit);
        assert_eq!(cfg.selection, SelectionScheme::LinearRank { pressure: 1.5 });
        assert_eq!(cfg.mutation_probability, 0.5);
        assert_eq!(cfg.sampling, Sampling::Replacement);
        assert_eq!(cfg.mutation, Mutation::BitInversion);
        assert_eq!(cfg.growth_factor, 1.0);
    }

    #[test]
    fn deserialize_breeder_mutation() {
        let cfg: PopulationConfig =
            serde_json::from_str(r#"{"mutation": {"breeder": {"range": 0.1, "precision": 0.001}}}"#).unwrap();
        assert_eq!(
            cfg.mutation,
            Mutation::Breeder {
                range: 0.1,
                precision: 0.001
            }
        );
        assert!(cfg.validate().is_ok());
    }
}

use super::Width;
use crate::errors::{GaError, Result};

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Policies for choosing which bit positions of a string are
/// inverted during mutation.
///
/// Random policies are re-drawn for every string they are
/// applied to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitSelection {
    /// Every position.
    All,
    /// A fixed set of positions.
    Positions(Vec<usize>),
    /// One position, uniformly at random.
    RandBit,
    /// A random number of uniformly drawn positions, deduplicated.
    RandBits,
    /// The `b` lowest-order positions, with `b` drawn uniformly
    /// from `[0, width)`.
    RandBitsSection,
    /// As [`RandBitsSection`](BitSelection::RandBitsSection), plus
    /// the sign bit with probability 0.5.
    RandBitsSignAndSection,
    /// Every position past the sign and exponent bits.
    Significant,
    /// As [`Significant`](BitSelection::Significant), plus the sign bit.
    SignAndSignificant,
    /// A random number of positions drawn from the significant
    /// bits, deduplicated.
    RandSignificant,
    /// As [`RandSignificant`](BitSelection::RandSignificant), plus
    /// the sign bit with probability 0.5.
    RandSignAndSignificant,
}

impl BitSelection {
    /// Names accepted by [`FromStr`], in declaration order.
    pub const NAMES: [&'static str; 9] = [
        "all",
        "rand_bit",
        "rand_bits",
        "rand_bits_section",
        "rand_bits_sign_and_section",
        "significant",
        "sign_and_significant",
        "rand_significant",
        "rand_sign_and_significant",
    ];

    /// Draws the positions to invert in a single string of
    /// the given width.
    ///
    /// # Examples
    /// ```
    /// use bitga::bits::{BitSelection, Width};
    ///
    /// let mut rng = bitga::rng::seeded(3);
    /// let section = BitSelection::RandBitsSection.positions(Width::W32, &mut rng);
    /// // A section always ends at the least significant bit.
    /// assert!(section.iter().enumerate().all(|(k, &p)| p == 31 - k));
    ///
    /// let significant = BitSelection::Significant.positions(Width::W64, &mut rng);
    /// assert_eq!(significant, (12..64).collect::<Vec<_>>());
    /// ```
    pub fn positions<R: Rng + ?Sized>(&self, width: Width, rng: &mut R) -> Vec<usize> {
        let w = width.bits();
        let offset = width.significant_offset();
        match self {
            Self::All => (0..w).collect(),
            Self::Positions(positions) => positions.clone(),
            Self::RandBit => vec![rand_bit(width, rng)],
            Self::RandBits => {
                let n = rand_bit(width, rng);
                let mut positions: Vec<usize> = (0..n).map(|_| rng.gen_range(0..w)).collect();
                positions.sort_unstable();
                positions.dedup();
                positions
            }
            Self::RandBitsSection => section(width, rng),
            Self::RandBitsSignAndSection => {
                let mut positions = section(width, rng);
                if rng.gen_bool(0.5) {
                    positions.push(0);
                }
                positions
            }
            Self::Significant => (offset..w).collect(),
            Self::SignAndSignificant => std::iter::once(0).chain(offset..w).collect(),
            Self::RandSignificant => random_significant(width, rng),
            Self::RandSignAndSignificant => {
                let mut positions = random_significant(width, rng);
                if rng.gen_bool(0.5) {
                    positions.insert(0, 0);
                }
                positions
            }
        }
    }

    /// Checks that fixed positions fit within `width`.
    pub fn validate(&self, width: Width) -> Result<()> {
        if let Self::Positions(positions) = self {
            if let Some(&position) = positions.iter().find(|&&p| p >= width.bits()) {
                return Err(GaError::BitPosition {
                    position,
                    width: width.bits(),
                });
            }
        }
        Ok(())
    }
}

impl Default for BitSelection {
    fn default() -> Self {
        BitSelection::RandBitsSignAndSection
    }
}

impl fmt::Display for BitSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::All => "all",
            Self::Positions(positions) => return write!(f, "positions{:?}", positions),
            Self::RandBit => "rand_bit",
            Self::RandBits => "rand_bits",
            Self::RandBitsSection => "rand_bits_section",
            Self::RandBitsSignAndSection => "rand_bits_sign_and_section",
            Self::Significant => "significant",
            Self::SignAndSignificant => "sign_and_significant",
            Self::RandSignificant => "rand_significant",
            Self::RandSignAndSignificant => "rand_sign_and_significant",
        };
        f.write_str(name)
    }
}

impl FromStr for BitSelection {
    type Err = GaError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "all" => Self::All,
            "rand_bit" => Self::RandBit,
            "rand_bits" => Self::RandBits,
            "rand_bits_section" => Self::RandBitsSection,
            "rand_bits_sign_and_section" => Self::RandBitsSignAndSection,
            "significant" => Self::Significant,
            "sign_and_significant" => Self::SignAndSignificant,
            "rand_significant" => Self::RandSignificant,
            "rand_sign_and_significant" => Self::RandSignAndSignificant,
            _ => return Err(GaError::UnknownSelection(s.to_owned())),
        })
    }
}

/// A single position drawn uniformly from `[0, width)`.
pub fn rand_bit<R: Rng + ?Sized>(width: Width, rng: &mut R) -> usize {
    rng.gen_range(0..width.bits())
}

fn section<R: Rng + ?Sized>(width: Width, rng: &mut R) -> Vec<usize> {
    let w = width.bits();
    let b = rand_bit(width, rng);
    (0..b).map(|k| w - 1 - k).collect()
}

fn random_significant<R: Rng + ?Sized>(width: Width, rng: &mut R) -> Vec<usize> {
    let w = width.bits();
    let offset = width.significant_offset();
    let n = rng.gen_range(0..=w - offset);
    let mut positions: Vec<usize> = (0..n).map(|_| rng.gen_range(offset..w)).collect();
    positions.sort_unstable();
    positions.dedup();
    positions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::seeded;

    #[test]
    fn names_round_trip() {
        for name in BitSelection::NAMES.iter() {
            let selection: BitSelection = name.parse().unwrap();
            assert_eq!(&selection.to_string(), name);
        }
        assert!(matches!(
            "every_other".parse::<BitSelection>(),
            Err(GaError::UnknownSelection(_))
        ));
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&BitSelection::RandBitsSignAndSection).unwrap();
        assert_eq!(json, "\"rand_bits_sign_and_section\"");
        let fixed: BitSelection = serde_json::from_str("{\"positions\":[0,3]}").unwrap();
        assert_eq!(fixed, BitSelection::Positions(vec![0, 3]));
    }

    #[test]
    fn random_positions_in_range() {
        let mut rng = seeded(11);
        for width in [Width::W32, Width::W64] {
            for name in BitSelection::NAMES.iter() {
                let selection: BitSelection = name.parse().unwrap();
                for _ in 0..200 {
                    let positions = selection.positions(width, &mut rng);
                    assert!(positions.iter().all(|&p| p < width.bits()), "{}", selection);
                }
            }
        }
    }

    #[test]
    fn section_is_low_order_run() {
        let mut rng = seeded(5);
        for _ in 0..200 {
            let positions = BitSelection::RandBitsSection.positions(Width::W64, &mut rng);
            assert!(positions.len() < 64);
            for (k, p) in positions.iter().enumerate() {
                assert_eq!(*p, 63 - k);
            }
        }
    }

    #[test]
    fn sign_and_section_sometimes_includes_sign() {
        let mut rng = seeded(9);
        let draws: Vec<Vec<usize>> = (0..200)
            .map(|_| BitSelection::RandBitsSignAndSection.positions(Width::W32, &mut rng))
            .collect();
        let with_sign = draws.iter().filter(|d| d.contains(&0)).count();
        assert!(with_sign > 50 && with_sign < 150, "{}", with_sign);
    }

    #[test]
    fn rand_bits_are_unique() {
        let mut rng = seeded(2);
        for _ in 0..200 {
            let positions = BitSelection::RandBits.positions(Width::W64, &mut rng);
            assert!(positions.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn significant_policies_skip_exponent() {
        let mut rng = seeded(4);
        for width in [Width::W32, Width::W64] {
            let offset = width.significant_offset();
            for _ in 0..200 {
                let positions = BitSelection::RandSignAndSignificant.positions(width, &mut rng);
                assert!(positions.iter().all(|&p| p == 0 || p >= offset));
            }
            let fixed = BitSelection::SignAndSignificant.positions(width, &mut rng);
            assert_eq!(fixed[0], 0);
            assert_eq!(fixed.len(), width.bits() - offset + 1);
        }
    }

    #[test]
    fn validate_fixed_positions() {
        assert!(BitSelection::Positions(vec![0, 31]).validate(Width::W32).is_ok());
        assert!(matches!(
            BitSelection::Positions(vec![1, 40]).validate(Width::W32),
            Err(GaError::BitPosition { position: 40, width: 32 })
        ));
    }
}

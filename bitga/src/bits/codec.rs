use crate::errors::GaError;

use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

/// Total bit width of an encoded value.
///
/// Serializes as its bit count (`32` or `64`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub enum Width {
    /// Single precision.
    W32,
    /// Double precision.
    W64,
}

impl Width {
    /// Number of bits in a string of this width.
    pub const fn bits(self) -> usize {
        match self {
            Width::W32 => 32,
            Width::W64 => 64,
        }
    }

    /// First bit position past the sign and exponent bits.
    /// Positions below this offset are treated as non-significant
    /// by the significant-bit selection policies.
    pub const fn significant_offset(self) -> usize {
        match self {
            Width::W32 => 9,
            Width::W64 => 12,
        }
    }

    const fn mask(self) -> u64 {
        match self {
            Width::W32 => 0xFFFF_FFFF,
            Width::W64 => u64::MAX,
        }
    }
}

impl Default for Width {
    fn default() -> Self {
        Width::W64
    }
}

impl TryFrom<usize> for Width {
    type Error = GaError;

    fn try_from(bits: usize) -> Result<Self, Self::Error> {
        match bits {
            32 => Ok(Width::W32),
            64 => Ok(Width::W64),
            _ => Err(GaError::InvalidWidth(bits)),
        }
    }
}

impl From<Width> for usize {
    fn from(width: Width) -> usize {
        width.bits()
    }
}

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

/// The IEEE-754 bit pattern of a single value.
///
/// Position 0 is the most significant (sign) bit, and position
/// `width - 1` the least significant mantissa bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BitString {
    bits: u64,
    width: Width,
}

impl BitString {
    /// Encodes `value` at the given width. 32-bit encoding
    /// rounds `value` to the nearest single precision float.
    ///
    /// # Examples
    /// ```
    /// use bitga::bits::{BitString, Width};
    ///
    /// let b = BitString::encode(-2.0, Width::W32);
    /// assert_eq!(b.to_string(), "11000000000000000000000000000000");
    /// assert_eq!(b.decode(), -2.0);
    /// ```
    pub fn encode(value: f64, width: Width) -> BitString {
        let bits = match width {
            Width::W32 => u64::from(narrow(value)),
            Width::W64 => value.to_bits(),
        };
        BitString { bits, width }
    }

    /// Reconstructs the encoded value.
    pub fn decode(&self) -> f64 {
        match self.width {
            Width::W32 => widen(self.bits as u32),
            Width::W64 => f64::from_bits(self.bits),
        }
    }

    /// Builds a bit string from its raw pattern. Bits beyond
    /// `width` are discarded.
    pub fn from_bits(bits: u64, width: Width) -> BitString {
        BitString {
            bits: bits & width.mask(),
            width,
        }
    }

    /// The raw pattern, right-aligned.
    pub fn bits(&self) -> u64 {
        self.bits
    }

    pub fn width(&self) -> Width {
        self.width
    }

    /// Returns the bit at `position`.
    ///
    /// # Panics
    /// Panics if `position` is not below the width.
    pub fn bit(&self, position: usize) -> bool {
        self.bits & self.position_mask(position) != 0
    }

    /// Flips the bit at `position`.
    ///
    /// # Panics
    /// Panics if `position` is not below the width.
    pub fn invert(&mut self, position: usize) {
        self.bits ^= self.position_mask(position);
    }

    /// Returns a copy with every bit in `positions` flipped.
    /// Repeated positions are flipped repeatedly.
    ///
    /// # Panics
    /// Panics if any position is not below the width.
    pub fn inverted(&self, positions: &[usize]) -> BitString {
        let mut copy = *self;
        for &p in positions {
            copy.invert(p);
        }
        copy
    }

    /// Returns this string's bits in `[0, cut)` followed by
    /// `other`'s bits in `[cut, width)`.
    ///
    /// # Panics
    /// Panics if the widths differ or `cut` exceeds the width.
    ///
    /// # Examples
    /// ```
    /// use bitga::bits::{BitString, Width};
    ///
    /// let a: BitString = "1".repeat(32).parse().unwrap();
    /// let b: BitString = "0".repeat(32).parse().unwrap();
    /// assert_eq!(a.splice(&b, 4).to_string(), format!("1111{}", "0".repeat(28)));
    /// ```
    pub fn splice(&self, other: &BitString, cut: usize) -> BitString {
        assert_eq!(self.width, other.width, "cannot splice strings of different widths");
        let width = self.width.bits();
        assert!(cut <= width, "cut {} exceeds width {}", cut, width);
        let suffix = if cut == 0 {
            self.width.mask()
        } else {
            (1u64 << (width - cut)) - 1
        };
        BitString {
            bits: (self.bits & !suffix & self.width.mask()) | (other.bits & suffix),
            width: self.width,
        }
    }

    /// Swaps the suffixes `[cut, width)` of two strings.
    pub fn exchange(first: &mut BitString, second: &mut BitString, cut: usize) {
        let spliced = first.splice(second, cut);
        *second = second.splice(first, cut);
        *first = spliced;
    }

    fn position_mask(&self, position: usize) -> u64 {
        let width = self.width.bits();
        assert!(
            position < width,
            "bit position {} out of range for {}-bit string",
            position,
            width
        );
        1u64 << (width - 1 - position)
    }
}

impl fmt::Display for BitString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$b}", self.bits, width = self.width.bits())
    }
}

impl FromStr for BitString {
    type Err = GaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || GaError::InvalidBitString(s.to_owned());
        if !s.bytes().all(|b| b == b'0' || b == b'1') {
            return Err(invalid());
        }
        let width = Width::try_from(s.len()).map_err(|_| invalid())?;
        let bits = u64::from_str_radix(s, 2).map_err(|_| invalid())?;
        Ok(BitString { bits, width })
    }
}

/// Shorthand for [`BitString::encode`].
pub fn encode(value: f64, width: Width) -> BitString {
    BitString::encode(value, width)
}

/// Shorthand for [`BitString::decode`].
pub fn decode(bits: &BitString) -> f64 {
    bits.decode()
}

// NaN payloads are carried over explicitly so that every 32-bit
// pattern survives a decode/encode cycle unchanged.
fn narrow(value: f64) -> u32 {
    if value.is_nan() {
        let bits = value.to_bits();
        let sign = ((bits >> 63) as u32) << 31;
        let payload = match ((bits >> 29) & 0x007F_FFFF) as u32 {
            0 => 0x0040_0000,
            p => p,
        };
        sign | 0x7F80_0000 | payload
    } else {
        (value as f32).to_bits()
    }
}

fn widen(bits: u32) -> f64 {
    let value = f32::from_bits(bits);
    if value.is_nan() {
        let sign = u64::from(bits >> 31) << 63;
        let payload = u64::from(bits & 0x007F_FFFF) << 29;
        f64::from_bits(sign | 0x7FF0_0000_0000_0000 | payload)
    } else {
        f64::from(value)
    }
}

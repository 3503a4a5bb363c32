//! Individuals are stored as fixed-width IEEE-754 bit strings,
//! arranged in the shape of the float array they were built from.
//! Mutation and crossover act on the bits directly; float views
//! are always re-derived from the current bit patterns.
mod codec;
mod selection;

pub use codec::{decode, encode, BitString, Width};
pub use selection::{rand_bit, BitSelection};

use crate::errors::{GaError, Result};

use ndarray::{ArrayD, ArrayView, Dimension, IxDyn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::trace;

/// An N-dimensional array of equal-width bit strings.
///
/// Elements are kept in row-major (logical) order of the array
/// the set was built from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BitSet {
    strings: Vec<BitString>,
    shape: Vec<usize>,
    width: Width,
}

impl BitSet {
    /// Encodes every element of `values` at the given width.
    ///
    /// # Examples
    /// ```
    /// use bitga::bits::{BitSet, Width};
    /// use ndarray::array;
    ///
    /// let values = array![[1.0, -2.5], [0.125, 8.0], [3.0, 0.0]];
    /// let bits = BitSet::new(values.view(), Width::W64);
    ///
    /// assert_eq!(bits.shape(), &[3, 2]);
    /// assert_eq!(bits.size(), 6);
    /// assert_eq!(bits.to_float_array().unwrap(), values.into_dyn());
    /// ```
    pub fn new<D: Dimension>(values: ArrayView<'_, f64, D>, width: Width) -> BitSet {
        BitSet {
            strings: values.iter().map(|&v| BitString::encode(v, width)).collect(),
            shape: values.shape().to_vec(),
            width,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Total number of elements.
    pub fn size(&self) -> usize {
        self.strings.len()
    }

    pub fn width(&self) -> Width {
        self.width
    }

    /// All elements, flattened.
    pub fn strings(&self) -> &[BitString] {
        &self.strings
    }

    /// The element at a flat index.
    pub fn get(&self, flat_index: usize) -> Option<&BitString> {
        self.strings.get(flat_index)
    }

    /// Decodes every element, in the set's shape.
    ///
    /// # Errors
    /// Returns [`GaError::Shape`] if the stored shape does not
    /// match the element count.
    pub fn to_float_array(&self) -> Result<ArrayD<f64>> {
        let values = self.strings.iter().map(BitString::decode).collect();
        Ok(ArrayD::from_shape_vec(IxDyn(&self.shape), values)?)
    }

    /// The raw bit strings, in the set's shape.
    ///
    /// # Errors
    /// Returns [`GaError::Shape`] if the stored shape does not
    /// match the element count.
    pub fn to_bin_array(&self) -> Result<ArrayD<BitString>> {
        Ok(ArrayD::from_shape_vec(
            IxDyn(&self.shape),
            self.strings.clone(),
        )?)
    }

    /// Converts a multi-dimensional index to a flat index.
    /// Returns `None` if the index has the wrong dimensionality
    /// or is out of bounds.
    ///
    /// # Examples
    /// ```
    /// use bitga::bits::{BitSet, Width};
    /// use ndarray::Array3;
    ///
    /// let bits = BitSet::new(Array3::<f64>::zeros((2, 3, 4)).view(), Width::W32);
    /// assert_eq!(bits.flat_index(&[1, 2, 3]), Some(23));
    /// assert_eq!(bits.flat_index(&[0, 3, 0]), None);
    /// assert_eq!(bits.flat_index(&[0, 0]), None);
    /// ```
    pub fn flat_index(&self, index: &[usize]) -> Option<usize> {
        if index.len() != self.shape.len() {
            return None;
        }
        index
            .iter()
            .zip(&self.shape)
            .try_fold(0, |flat, (&i, &dim)| (i < dim).then(|| flat * dim + i))
    }

    /// Flips the bits chosen by `selection` in every element
    /// addressed by `targets` (flat indices, all elements if `None`).
    /// Random selections are drawn anew for each element.
    ///
    /// # Errors
    /// Returns an error, leaving the set unchanged, if a target is
    /// out of bounds or a fixed position does not fit the width.
    pub fn invert<R: Rng + ?Sized>(
        &mut self,
        selection: &BitSelection,
        targets: Option<&[usize]>,
        rng: &mut R,
    ) -> Result<()> {
        selection.validate(self.width)?;
        let targets: Vec<usize> = match targets {
            Some(targets) => {
                self.check_bounds(targets)?;
                targets.to_vec()
            }
            None => (0..self.size()).collect(),
        };
        for i in targets {
            let positions = selection.positions(self.width, rng);
            trace!(element = i, ?positions, %selection, "inverting bits");
            self.strings[i] = self.strings[i].inverted(&positions);
        }
        Ok(())
    }

    /// Like [`invert`](BitSet::invert), but operates on and
    /// returns a copy, leaving `self` untouched.
    ///
    /// # Examples
    /// ```
    /// use bitga::bits::{BitSelection, BitSet, Width};
    /// use ndarray::array;
    ///
    /// let mut rng = bitga::rng::seeded(0);
    /// let bits = BitSet::new(array![1.0, 2.0].view(), Width::W32);
    /// let flipped = bits.inverted(&BitSelection::Positions(vec![0]), None, &mut rng).unwrap();
    ///
    /// assert_eq!(bits.to_float_array().unwrap(), array![1.0, 2.0].into_dyn());
    /// assert_eq!(flipped.to_float_array().unwrap(), array![-1.0, -2.0].into_dyn());
    /// ```
    pub fn inverted<R: Rng + ?Sized>(
        &self,
        selection: &BitSelection,
        targets: Option<&[usize]>,
        rng: &mut R,
    ) -> Result<BitSet> {
        let mut copy = self.clone();
        copy.invert(selection, targets, rng)?;
        Ok(copy)
    }

    /// Single-point crossover between each pair `(idx0[i], idx1[i])`
    /// of flat indices, with a cut drawn uniformly from `[0, width)`
    /// for every pair.
    ///
    /// # Errors
    /// Returns an error, leaving the set unchanged, if the index
    /// lists differ in length or contain out of bounds indices.
    pub fn cross<R: Rng + ?Sized>(&mut self, idx0: &[usize], idx1: &[usize], rng: &mut R) -> Result<()> {
        if idx0.len() != idx1.len() {
            return Err(GaError::MismatchedIndices(idx0.len(), idx1.len()));
        }
        self.check_bounds(idx0)?;
        self.check_bounds(idx1)?;
        for (&i0, &i1) in idx0.iter().zip(idx1) {
            let cut = rand_bit(self.width, rng);
            trace!(i0, i1, cut, "crossing bits");
            self.exchange(i0, i1, cut);
        }
        Ok(())
    }

    /// Swaps the bits `[cut, width)` of two elements. Element `i0`
    /// keeps its own prefix and receives `i1`'s suffix, and vice versa.
    ///
    /// # Errors
    /// Returns an error if either index is out of bounds or `cut`
    /// exceeds the width.
    pub fn cross_at(&mut self, i0: usize, i1: usize, cut: usize) -> Result<()> {
        self.check_bounds(&[i0, i1])?;
        if cut > self.width.bits() {
            return Err(GaError::BitPosition {
                position: cut,
                width: self.width.bits(),
            });
        }
        self.exchange(i0, i1, cut);
        Ok(())
    }

    fn exchange(&mut self, i0: usize, i1: usize, cut: usize) {
        let (a, b) = (self.strings[i0], self.strings[i1]);
        self.strings[i0] = a.splice(&b, cut);
        self.strings[i1] = b.splice(&a, cut);
    }

    fn check_bounds(&self, indices: &[usize]) -> Result<()> {
        match indices.iter().find(|&&i| i >= self.size()) {
            Some(&index) => Err(GaError::IndexOutOfBounds {
                index,
                size: self.size(),
            }),
            None => Ok(()),
        }
    }

    /// Number of rows along the first axis.
    pub fn rows(&self) -> usize {
        self.shape.first().copied().unwrap_or(1)
    }

    /// Number of elements in each row.
    pub fn row_len(&self) -> usize {
        match self.rows() {
            0 => 0,
            rows => self.size() / rows,
        }
    }

    /// The elements of one row.
    ///
    /// # Panics
    /// Panics if `row` is out of bounds.
    pub fn row(&self, row: usize) -> &[BitString] {
        &self.strings[self.row_range(row)]
    }

    /// Flat indices covered by one row.
    pub(crate) fn row_range(&self, row: usize) -> Range<usize> {
        let len = self.row_len();
        row * len..(row + 1) * len
    }

    /// Re-encodes one row from `values`, given in logical order.
    ///
    /// # Panics
    /// Panics if `row` is out of bounds or `values` does not hold
    /// exactly one value per element of the row.
    pub(crate) fn set_row(&mut self, row: usize, values: &[f64]) {
        let range = self.row_range(row);
        assert_eq!(range.len(), values.len(), "one value is needed per element");
        let width = self.width;
        for (string, &value) in self.strings[range].iter_mut().zip(values) {
            *string = BitString::encode(value, width);
        }
    }

    /// Builds a new set whose `k`-th row is row `order[k]` of this
    /// one. Rows may be repeated or omitted.
    ///
    /// # Panics
    /// Panics if any row index is out of bounds.
    pub(crate) fn select_rows(&self, order: &[usize]) -> BitSet {
        let mut shape = self.shape.clone();
        if let Some(rows) = shape.first_mut() {
            *rows = order.len();
        }
        BitSet {
            strings: order
                .iter()
                .flat_map(|&row| self.row(row).iter().copied())
                .collect(),
            shape,
            width: self.width,
        }
    }
}

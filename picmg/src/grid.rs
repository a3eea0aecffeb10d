//! Structured `D`-dimensional scalar/vector fields with ghost halos.
//!
//! A [`Grid`] stores one contiguous `f64` buffer representing a field over an
//! interior block of cells plus ghost (halo) layers on every spatial axis.
//! The leading (component) axis carries vector components for fields such as
//! the electric field (three components per node); scalar fields use a
//! component axis of length 1. Indexing arithmetic is centralized here so
//! that smoothers, transfer operators and halo exchange never compute flat
//! offsets by hand (see `sizeProd`/ghost-offset arithmetic in the spec this
//! crate implements).

use crate::error::{Error, Result};

/// Which face of an axis a halo operation addresses.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Side {
    /// The face at the lower-index end of the axis.
    Low,
    /// The face at the upper-index end of the axis.
    High,
}

/// A `D`-dimensional structured field with ghost layers.
///
/// `D` is the number of spatial axes (2 or 3 in practice); the grid's full
/// rank is `D + 1`, with axis 0 reserved for vector components.
#[derive(Clone, Debug)]
pub struct Grid<const D: usize> {
    n_components: usize,
    true_size: [usize; D],
    ghost_lo: [usize; D],
    ghost_hi: [usize; D],
    size: [usize; D],
    // length D + 2: size_prod[0] = 1, size_prod[1] = n_components,
    // size_prod[i + 2] = size_prod[i + 1] * size[i].
    size_prod: Vec<usize>,
    val: Vec<f64>,
    slice: Vec<f64>,
}

impl<const D: usize> Grid<D> {
    /// Builds a new grid, validating the invariant that any axis carrying
    /// ghost layers has room for at least one interior cell either side.
    pub fn new(
        n_components: usize,
        true_size: [usize; D],
        ghost_lo: [usize; D],
        ghost_hi: [usize; D],
    ) -> Result<Self> {
        let mut size = [0usize; D];
        for d in 0..D {
            size[d] = true_size[d] + ghost_lo[d] + ghost_hi[d];
            if ghost_lo[d] + ghost_hi[d] > 0 && size[d] < 2 {
                return Err(Error::Config(format!(
                    "axis {d}: size {size} too small for {lo}+{hi} ghost layers",
                    size = size[d],
                    lo = ghost_lo[d],
                    hi = ghost_hi[d],
                )));
            }
        }

        let mut size_prod = vec![1usize; D + 2];
        size_prod[1] = n_components;
        for d in 0..D {
            size_prod[d + 2] = size_prod[d + 1] * size[d];
        }

        let len = size_prod[D + 1];
        let max_face = (0..D)
            .map(|axis| {
                n_components
                    * (0..D)
                        .filter(|&a| a != axis)
                        .map(|a| true_size[a])
                        .product::<usize>()
            })
            .max()
            .unwrap_or(0);

        Ok(Self {
            n_components,
            true_size,
            ghost_lo,
            ghost_hi,
            size,
            size_prod,
            val: vec![0.0; len],
            slice: vec![0.0; max_face],
        })
    }

    /// Number of vector components stored per node.
    #[must_use]
    pub fn n_components(&self) -> usize {
        self.n_components
    }

    /// Interior extent along each spatial axis.
    #[must_use]
    pub fn true_size(&self) -> [usize; D] {
        self.true_size
    }

    /// Total extent (interior + ghosts) along each spatial axis.
    #[must_use]
    pub fn size(&self) -> [usize; D] {
        self.size
    }

    /// Number of lower ghost layers on each spatial axis.
    #[must_use]
    pub fn ghost_lo(&self) -> [usize; D] {
        self.ghost_lo
    }

    /// Number of upper ghost layers on each spatial axis.
    #[must_use]
    pub fn ghost_hi(&self) -> [usize; D] {
        self.ghost_hi
    }

    /// Cumulative products, length `D + 2`: `size_prod()[0] == 1`, and
    /// `size_prod()[axis + 1]` is the flat-index stride of spatial axis
    /// `axis`. `size_prod()[1]` is the component stride (`n_components`).
    #[must_use]
    pub fn size_prod(&self) -> &[usize] {
        &self.size_prod
    }

    /// Total number of `f64` elements backing this grid.
    #[must_use]
    pub fn len(&self) -> usize {
        self.val.len()
    }

    /// Whether this grid stores zero elements (only possible for a
    /// zero-sized axis, which [`Grid::new`] never produces for a grid with
    /// ghost layers).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.val.is_empty()
    }

    /// Raw backing storage.
    #[must_use]
    pub fn val(&self) -> &[f64] {
        &self.val
    }

    /// Mutable raw backing storage.
    pub fn val_mut(&mut self) -> &mut [f64] {
        &mut self.val
    }

    /// Sets every element to zero.
    pub fn zero(&mut self) {
        self.val.fill(0.0);
    }

    /// Sets every element to `value`.
    pub fn fill(&mut self, value: f64) {
        self.val.fill(value);
    }

    /// Flat index stride for spatial axis `axis` (`0..D`): moving by one
    /// node along `axis` changes the flat offset by this amount.
    #[must_use]
    pub fn axis_stride(&self, axis: usize) -> usize {
        self.size_prod[axis + 1]
    }

    /// Flat index stride for the component axis: moving to the next vector
    /// component changes the flat offset by this amount.
    #[must_use]
    pub fn component_stride(&self) -> usize {
        self.size_prod[0]
    }

    /// Flat offset of node `idx` (spatial indices, ghosts included),
    /// component `component`.
    #[must_use]
    pub fn offset(&self, component: usize, idx: [usize; D]) -> usize {
        let mut o = component * self.component_stride();
        for d in 0..D {
            o += idx[d] * self.axis_stride(d);
        }
        o
    }

    /// Value at node `idx`, component `component`.
    #[must_use]
    pub fn get(&self, component: usize, idx: [usize; D]) -> f64 {
        self.val[self.offset(component, idx)]
    }

    /// Sets the value at node `idx`, component `component`.
    pub fn set(&mut self, component: usize, idx: [usize; D], value: f64) {
        let o = self.offset(component, idx);
        self.val[o] = value;
    }

    /// Half-open range of valid interior indices along `axis`.
    #[must_use]
    pub fn interior_range(&self, axis: usize) -> std::ops::Range<usize> {
        self.ghost_lo[axis]..(self.ghost_lo[axis] + self.true_size[axis])
    }

    /// Iterates over every interior spatial multi-index, in row-major order
    /// (axis `D - 1` fastest).
    pub fn interior_indices(&self) -> InteriorIndices<D> {
        let mut ranges = [0..0; D];
        for d in 0..D {
            ranges[d] = self.interior_range(d);
        }
        InteriorIndices::new(ranges)
    }

    /// Serializes the `true_size`-thick interior slice adjacent to the
    /// outgoing face of `side` along `axis` into [`Grid::slice`], for every
    /// component. Returns the number of `f64` values written.
    pub fn serialize_face(&mut self, axis: usize, side: Side) -> usize {
        let mut n = 0;
        for idx in self.face_indices(axis, side, FaceKind::Interior) {
            for c in 0..self.n_components {
                self.slice[n] = self.get(c, idx);
                n += 1;
            }
        }
        n
    }

    /// Deserializes a face previously filled via [`Grid::serialize_face`]
    /// (or received over a transport) from [`Grid::slice`] into the ghost
    /// face of `side` along `axis`.
    pub fn deserialize_face(&mut self, axis: usize, side: Side) {
        let indices: Vec<_> = self.face_indices(axis, side, FaceKind::Ghost).collect();
        let mut n = 0;
        for idx in indices {
            for c in 0..self.n_components {
                let v = self.slice[n];
                self.set(c, idx, v);
                n += 1;
            }
        }
    }

    /// The scratch buffer used by `serialize_face`/`deserialize_face`.
    #[must_use]
    pub fn slice(&self) -> &[f64] {
        &self.slice
    }

    /// Mutable scratch buffer, e.g. for a transport to receive directly into.
    pub fn slice_mut(&mut self) -> &mut [f64] {
        &mut self.slice
    }

    fn face_indices(
        &self,
        axis: usize,
        side: Side,
        kind: FaceKind,
    ) -> impl Iterator<Item = [usize; D]> + '_ {
        let mut ranges: [std::ops::Range<usize>; D] =
            std::array::from_fn(|d| self.interior_range(d));
        let fixed = match (side, kind) {
            (Side::Low, FaceKind::Interior) => self.ghost_lo[axis],
            (Side::Low, FaceKind::Ghost) => self.ghost_lo[axis] - 1,
            (Side::High, FaceKind::Interior) => self.ghost_lo[axis] + self.true_size[axis] - 1,
            (Side::High, FaceKind::Ghost) => self.ghost_lo[axis] + self.true_size[axis],
        };
        ranges[axis] = fixed..(fixed + 1);
        InteriorIndices::new(ranges)
    }
}

#[derive(Clone, Copy)]
enum FaceKind {
    Interior,
    Ghost,
}

/// Row-major iterator over a `D`-dimensional box of indices (an "odometer":
/// the last axis increments fastest). Used in place of raw pointer/edge-
/// increment arithmetic for every loop over a grid's interior.
pub struct InteriorIndices<const D: usize> {
    ranges: [std::ops::Range<usize>; D],
    current: Option<[usize; D]>,
}

impl<const D: usize> InteriorIndices<D> {
    fn new(ranges: [std::ops::Range<usize>; D]) -> Self {
        let empty = ranges.iter().any(std::ops::Range::is_empty);
        let current = if empty {
            None
        } else {
            Some(std::array::from_fn(|d| ranges[d].start))
        };
        Self { ranges, current }
    }
}

impl<const D: usize> Iterator for InteriorIndices<D> {
    type Item = [usize; D];

    fn next(&mut self) -> Option<Self::Item> {
        let out = self.current?;

        let mut next = out;
        let mut carry = true;
        for d in (0..D).rev() {
            if !carry {
                break;
            }
            next[d] += 1;
            if next[d] >= self.ranges[d].end {
                next[d] = self.ranges[d].start;
            } else {
                carry = false;
            }
        }
        self.current = if carry { None } else { Some(next) };

        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_prod_is_monotonic_and_matches_len() {
        let g = Grid::<2>::new(1, [4, 4], [1, 1], [1, 1]).unwrap();
        assert_eq!(g.size(), [6, 6]);
        assert_eq!(g.size_prod(), &[1, 1, 1, 6, 36]);
        assert_eq!(g.len(), 36);
        for w in g.size_prod().windows(2) {
            assert!(w[1] >= w[0]);
        }
    }

    #[test]
    fn component_stride_is_n_components() {
        let g = Grid::<3>::new(3, [4, 4, 4], [1, 1, 1], [1, 1, 1]).unwrap();
        assert_eq!(g.size_prod()[1], 3);
        assert_eq!(g.axis_stride(0), 3);
    }

    #[test]
    fn new_rejects_axes_too_small_for_their_ghosts() {
        let err = Grid::<1>::new(1, [0], [1], [1]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn offset_matches_manual_computation() {
        let g = Grid::<2>::new(3, [2, 2], [1, 1], [1, 1]).unwrap();
        // size = [4, 4]; size_prod = [1, 3, 12, 48]
        assert_eq!(g.offset(0, [0, 0]), 0);
        assert_eq!(g.offset(1, [0, 0]), 1);
        assert_eq!(g.offset(0, [1, 0]), 12);
        assert_eq!(g.offset(0, [0, 1]), 3);
    }

    #[test]
    fn interior_indices_visits_every_interior_node_once() {
        let g = Grid::<2>::new(1, [3, 2], [1, 1], [1, 1]).unwrap();
        let v: Vec<_> = g.interior_indices().collect();
        assert_eq!(v.len(), 3 * 2);
        assert_eq!(v[0], [1, 1]);
        assert_eq!(*v.last().unwrap(), [3, 2]);
    }

    #[test]
    fn get_set_round_trip() {
        let mut g = Grid::<2>::new(1, [2, 2], [1, 1], [1, 1]).unwrap();
        g.set(0, [1, 1], 7.0);
        assert_eq!(g.get(0, [1, 1]), 7.0);
        assert_eq!(g.get(0, [1, 2]), 0.0);
    }

    #[test]
    fn serialize_then_deserialize_face_round_trips_into_ghost() {
        let mut a = Grid::<2>::new(1, [2, 2], [1, 1], [1, 1]).unwrap();
        for (i, idx) in a.interior_indices().enumerate() {
            a.set(0, idx, i as f64);
        }
        let n = a.serialize_face(0, Side::Low);
        assert_eq!(n, 2);

        let mut b = Grid::<2>::new(1, [2, 2], [1, 1], [1, 1]).unwrap();
        b.slice_mut().copy_from_slice(a.slice());
        b.deserialize_face(0, Side::High);

        assert_eq!(b.get(0, [3, 1]), a.get(0, [1, 1]));
        assert_eq!(b.get(0, [3, 2]), a.get(0, [1, 2]));
    }
}

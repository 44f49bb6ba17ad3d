//! Coordinate abstraction shared by the 2D and 3D meshes.
//!
//! The [`Point`] trait lets the mesh walk and the characteristic tracer be
//! written once for triangles and tetrahedra. It is implemented for
//! `[f64; 2]` and `[f64; 3]`.

use std::fmt::Debug;

/// A point (or displacement) in physical space.
///
/// # Example
/// ```
/// use sl_rs::mesh::Point;
///
/// let node: [f64; 2] = [1.0, 2.0];
/// let alpha: [f64; 2] = [0.1, 0.0];
/// let foot = node.sub(&alpha);
/// assert!((foot[0] - 0.9).abs() < 1e-14);
/// assert!((foot.distance(&node) - 0.1).abs() < 1e-14);
/// ```
pub trait Point: Copy + Clone + Debug + Default + PartialEq + Send + Sync + 'static {
    /// Spatial dimension (2 or 3).
    const DIM: usize;

    /// Coordinate `idx`.
    ///
    /// # Panics
    /// Panics if `idx >= Self::DIM`.
    fn coord(&self, idx: usize) -> f64;

    /// Build a point component by component.
    fn from_fn<F: FnMut(usize) -> f64>(f: F) -> Self;

    /// Build a point from the first `DIM` entries of a slice.
    ///
    /// # Panics
    /// Panics if `coords.len() < Self::DIM`.
    fn from_slice(coords: &[f64]) -> Self {
        Self::from_fn(|i| coords[i])
    }

    fn add(&self, other: &Self) -> Self {
        Self::from_fn(|i| self.coord(i) + other.coord(i))
    }

    fn sub(&self, other: &Self) -> Self {
        Self::from_fn(|i| self.coord(i) - other.coord(i))
    }

    fn scale(&self, c: f64) -> Self {
        Self::from_fn(|i| c * self.coord(i))
    }

    fn dot(&self, other: &Self) -> f64 {
        (0..Self::DIM).map(|i| self.coord(i) * other.coord(i)).sum()
    }

    /// Euclidean norm.
    fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }

    fn distance(&self, other: &Self) -> f64 {
        self.sub(other).norm()
    }

    /// True when every component is exactly zero.
    fn is_zero(&self) -> bool {
        (0..Self::DIM).all(|i| self.coord(i) == 0.0)
    }

    fn is_finite(&self) -> bool {
        (0..Self::DIM).all(|i| self.coord(i).is_finite())
    }

    /// Components as an owned vector, for error reports and events.
    fn to_vec(&self) -> Vec<f64> {
        (0..Self::DIM).map(|i| self.coord(i)).collect()
    }
}

impl Point for [f64; 2] {
    const DIM: usize = 2;

    #[inline]
    fn coord(&self, idx: usize) -> f64 {
        self[idx]
    }

    #[inline]
    fn from_fn<F: FnMut(usize) -> f64>(f: F) -> Self {
        std::array::from_fn(f)
    }
}

impl Point for [f64; 3] {
    const DIM: usize = 3;

    #[inline]
    fn coord(&self, idx: usize) -> f64 {
        self[idx]
    }

    #[inline]
    fn from_fn<F: FnMut(usize) -> f64>(f: F) -> Self {
        std::array::from_fn(f)
    }
}

//! Quadratic (P2) shape functions and clamped interpolation.
//!
//! With barycentric weights `l_i` the corner functions are
//! `φ_i = l_i (2 l_i - 1)` and the mid-edge function of edge `(a, b)` is
//! `φ = 4 l_a l_b`. Local node order is corners first, then the edges in
//! [`TRIANGLE_EDGES`] / [`TETRAHEDRON_EDGES`] order.

use std::fmt::Debug;

/// Corner pairs of the mid-edge nodes of a 6-node triangle: `m01, m12, m02`.
pub const TRIANGLE_EDGES: [[usize; 2]; 3] = [[0, 1], [1, 2], [0, 2]];

/// Corner pairs of the mid-edge nodes of a 10-node tetrahedron:
/// `m01, m12, m02, m03, m13, m23`.
pub const TETRAHEDRON_EDGES: [[usize; 2]; 6] = [[0, 1], [1, 2], [0, 2], [0, 3], [1, 3], [2, 3]];

/// Barycentric weights that know how to evaluate the P2 basis.
pub trait QuadraticBasis:
    Copy + Debug + Default + PartialEq + Send + Sync + AsRef<[f64]> + AsMut<[f64]> + 'static
{
    /// One value per quadratic node.
    type Weights: Copy + Debug + Send + Sync + AsRef<[f64]> + 'static;

    /// Evaluate all quadratic shape functions.
    fn weights(&self) -> Self::Weights;
}

impl QuadraticBasis for [f64; 3] {
    type Weights = [f64; 6];

    #[inline]
    fn weights(&self) -> [f64; 6] {
        let mut phi = [0.0; 6];
        fill_p2(self, &TRIANGLE_EDGES, &mut phi);
        phi
    }
}

impl QuadraticBasis for [f64; 4] {
    type Weights = [f64; 10];

    #[inline]
    fn weights(&self) -> [f64; 10] {
        let mut phi = [0.0; 10];
        fill_p2(self, &TETRAHEDRON_EDGES, &mut phi);
        phi
    }
}

#[inline]
fn fill_p2(l: &[f64], edges: &[[usize; 2]], phi: &mut [f64]) {
    let corners = l.len();
    for (i, &li) in l.iter().enumerate() {
        phi[i] = li * (2.0 * li - 1.0);
    }
    for (e, &[a, b]) in edges.iter().enumerate() {
        phi[corners + e] = 4.0 * l[a] * l[b];
    }
}

/// Weighted sum `Σ φ_i · field[nodes[i]]`.
#[inline]
pub fn interpolate(weights: &[f64], nodes: &[usize], field: &[f64]) -> f64 {
    weights
        .iter()
        .zip(nodes)
        .map(|(&w, &n)| w * field[n])
        .sum()
}

/// Min and max of `field` over the given corner nodes.
#[inline]
pub fn corner_range(corners: &[usize], field: &[f64]) -> (f64, f64) {
    corners.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &n| {
        (lo.min(field[n]), hi.max(field[n]))
    })
}

/// Interpolate and, if `clamp` is set, limit the value to the corner range.
///
/// `nodes` holds the element's quadratic nodes with the `n_corners` corner
/// nodes first.
#[inline]
pub fn sample(weights: &[f64], nodes: &[usize], n_corners: usize, field: &[f64], clamp: bool) -> f64 {
    let value = interpolate(weights, nodes, field);
    if clamp {
        let (lo, hi) = corner_range(&nodes[..n_corners], field);
        value.max(lo).min(hi)
    } else {
        value
    }
}

/// Zero the negative weights and rescale the rest to sum to one.
///
/// Falls back to the centroid if nothing positive remains.
pub fn clip_barycentric(bary: &mut [f64]) {
    let mut sum = 0.0;
    for l in bary.iter_mut() {
        if *l < 0.0 {
            *l = 0.0;
        }
        sum += *l;
    }
    if sum > 0.0 {
        bary.iter_mut().for_each(|l| *l /= sum);
    } else {
        let uniform = 1.0 / bary.len() as f64;
        bary.iter_mut().for_each(|l| *l = uniform);
    }
}

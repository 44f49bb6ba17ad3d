//! Per-element affine maps for straight-sided simplices.
//!
//! The geometry of a P2 element is taken from its corner nodes only, so the
//! map from local coordinates to physical space is affine and constant per
//! element:
//!
//! x = x0 + a p + b q
//! y = y0 + c p + d q
//!
//! in 2D, and `X = X0 + J (p, q, r)` in 3D. The inverse is cached so that
//! the mesh walk can compute barycentric weights with a handful of flops.

use crate::mesh::MeshError;
use crate::types::ElementIndex;

/// Relative determinant threshold: `|det| <= DEGENERACY_TOLERANCE * h^D`
/// marks an element as degenerate, `h` being its longest corner edge.
pub const DEGENERACY_TOLERANCE: f64 = 1e-12;

/// Affine coefficients of 2D triangles.
#[derive(Clone, Debug)]
pub struct AffineFactors2D {
    /// x of corner 0
    pub x0: Vec<f64>,
    /// y of corner 0
    pub y0: Vec<f64>,
    /// x1 - x0
    pub a: Vec<f64>,
    /// x2 - x0
    pub b: Vec<f64>,
    /// y1 - y0
    pub c: Vec<f64>,
    /// y2 - y0
    pub d: Vec<f64>,
    /// a d - b c (twice the signed area)
    pub det: Vec<f64>,
    /// Longest corner edge of each element.
    pub diameter: Vec<f64>,
    pub n_elements: usize,
}

impl AffineFactors2D {
    /// Compute the maps and reject degenerate triangles.
    pub fn compute(x: &[f64], y: &[f64], corners: &[[usize; 3]]) -> Result<Self, MeshError> {
        let n_elements = corners.len();
        let mut f = Self {
            x0: Vec::with_capacity(n_elements),
            y0: Vec::with_capacity(n_elements),
            a: Vec::with_capacity(n_elements),
            b: Vec::with_capacity(n_elements),
            c: Vec::with_capacity(n_elements),
            d: Vec::with_capacity(n_elements),
            det: Vec::with_capacity(n_elements),
            diameter: Vec::with_capacity(n_elements),
            n_elements,
        };

        for (k, &[n0, n1, n2]) in corners.iter().enumerate() {
            let a = x[n1] - x[n0];
            let b = x[n2] - x[n0];
            let c = y[n1] - y[n0];
            let d = y[n2] - y[n0];
            let det = a * d - b * c;

            let h = [(a, c), (b, d), (x[n2] - x[n1], y[n2] - y[n1])]
                .iter()
                .map(|&(dx, dy)| dx.hypot(dy))
                .fold(0.0, f64::max);

            if !(det.abs() > DEGENERACY_TOLERANCE * h * h) {
                return Err(MeshError::DegenerateElement {
                    element: ElementIndex::new(k),
                    det,
                    centroid: vec![
                        (x[n0] + x[n1] + x[n2]) / 3.0,
                        (y[n0] + y[n1] + y[n2]) / 3.0,
                    ],
                });
            }

            f.x0.push(x[n0]);
            f.y0.push(y[n0]);
            f.a.push(a);
            f.b.push(b);
            f.c.push(c);
            f.d.push(d);
            f.det.push(det);
            f.diameter.push(h);
        }

        Ok(f)
    }

    /// Barycentric weights `[1 - p - q, p, q]` of `(px, py)` in element `k`.
    #[inline]
    pub fn barycentric(&self, k: usize, px: f64, py: f64) -> [f64; 3] {
        let dx = px - self.x0[k];
        let dy = py - self.y0[k];
        let p = (dx * self.d[k] - self.b[k] * dy) / self.det[k];
        let q = (self.a[k] * dy - dx * self.c[k]) / self.det[k];
        [1.0 - p - q, p, q]
    }

    /// Inverse of [`barycentric`](Self::barycentric).
    #[inline]
    pub fn physical(&self, k: usize, bary: &[f64; 3]) -> [f64; 2] {
        let [_, p, q] = *bary;
        [
            self.x0[k] + self.a[k] * p + self.b[k] * q,
            self.y0[k] + self.c[k] * p + self.d[k] * q,
        ]
    }

    #[inline]
    pub fn area(&self, k: usize) -> f64 {
        0.5 * self.det[k].abs()
    }
}

/// Affine coefficients of 3D tetrahedra.
#[derive(Clone, Debug)]
pub struct AffineFactors3D {
    /// Corner 0 of each element.
    pub origin: Vec<[f64; 3]>,
    /// Row-major Jacobian with columns `X1 - X0`, `X2 - X0`, `X3 - X0`.
    pub jacobian: Vec<[f64; 9]>,
    /// Row-major inverse Jacobian.
    pub inv_jacobian: Vec<[f64; 9]>,
    pub det: Vec<f64>,
    pub diameter: Vec<f64>,
    pub n_elements: usize,
}

impl AffineFactors3D {
    /// Compute the maps and reject degenerate tetrahedra.
    pub fn compute(
        x: &[f64],
        y: &[f64],
        z: &[f64],
        corners: &[[usize; 4]],
    ) -> Result<Self, MeshError> {
        let n_elements = corners.len();
        let mut origin = Vec::with_capacity(n_elements);
        let mut jacobian = Vec::with_capacity(n_elements);
        let mut inv_jacobian = Vec::with_capacity(n_elements);
        let mut dets = Vec::with_capacity(n_elements);
        let mut diameter = Vec::with_capacity(n_elements);

        for (k, corner) in corners.iter().enumerate() {
            let pts = corner.map(|n| [x[n], y[n], z[n]]);
            let o = pts[0];
            let e = |i: usize, axis: usize| pts[i][axis] - o[axis];

            // Columns are the edge vectors from corner 0
            #[rustfmt::skip]
            let j = [
                e(1, 0), e(2, 0), e(3, 0),
                e(1, 1), e(2, 1), e(3, 1),
                e(1, 2), e(2, 2), e(3, 2),
            ];
            let det = j[0] * (j[4] * j[8] - j[5] * j[7]) - j[1] * (j[3] * j[8] - j[5] * j[6])
                + j[2] * (j[3] * j[7] - j[4] * j[6]);

            let mut h: f64 = 0.0;
            for a in 0..4 {
                for b in (a + 1)..4 {
                    let dist = ((pts[b][0] - pts[a][0]).powi(2)
                        + (pts[b][1] - pts[a][1]).powi(2)
                        + (pts[b][2] - pts[a][2]).powi(2))
                    .sqrt();
                    h = h.max(dist);
                }
            }

            if !(det.abs() > DEGENERACY_TOLERANCE * h * h * h) {
                let centroid = (0..3)
                    .map(|axis| pts.iter().map(|p| p[axis]).sum::<f64>() / 4.0)
                    .collect();
                return Err(MeshError::DegenerateElement {
                    element: ElementIndex::new(k),
                    det,
                    centroid,
                });
            }

            let inv_det = 1.0 / det;
            let inv = [
                (j[4] * j[8] - j[5] * j[7]) * inv_det,
                (j[2] * j[7] - j[1] * j[8]) * inv_det,
                (j[1] * j[5] - j[2] * j[4]) * inv_det,
                (j[5] * j[6] - j[3] * j[8]) * inv_det,
                (j[0] * j[8] - j[2] * j[6]) * inv_det,
                (j[2] * j[3] - j[0] * j[5]) * inv_det,
                (j[3] * j[7] - j[4] * j[6]) * inv_det,
                (j[1] * j[6] - j[0] * j[7]) * inv_det,
                (j[0] * j[4] - j[1] * j[3]) * inv_det,
            ];

            origin.push(o);
            jacobian.push(j);
            inv_jacobian.push(inv);
            dets.push(det);
            diameter.push(h);
        }

        Ok(Self {
            origin,
            jacobian,
            inv_jacobian,
            det: dets,
            diameter,
            n_elements,
        })
    }

    /// Barycentric weights `[1 - p - q - r, p, q, r]` of `point` in element `k`.
    #[inline]
    pub fn barycentric(&self, k: usize, point: &[f64; 3]) -> [f64; 4] {
        let o = &self.origin[k];
        let m = &self.inv_jacobian[k];
        let d = [point[0] - o[0], point[1] - o[1], point[2] - o[2]];
        let p = m[0] * d[0] + m[1] * d[1] + m[2] * d[2];
        let q = m[3] * d[0] + m[4] * d[1] + m[5] * d[2];
        let r = m[6] * d[0] + m[7] * d[1] + m[8] * d[2];
        [1.0 - p - q - r, p, q, r]
    }

    /// Inverse of [`barycentric`](Self::barycentric).
    #[inline]
    pub fn physical(&self, k: usize, bary: &[f64; 4]) -> [f64; 3] {
        let o = &self.origin[k];
        let j = &self.jacobian[k];
        let [_, p, q, r] = *bary;
        [
            o[0] + j[0] * p + j[1] * q + j[2] * r,
            o[1] + j[3] * p + j[4] * q + j[5] * r,
            o[2] + j[6] * p + j[7] * q + j[8] * r,
        ]
    }

    #[inline]
    pub fn volume(&self, k: usize) -> f64 {
        self.det[k].abs() / 6.0
    }
}

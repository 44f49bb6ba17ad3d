//! Structured P2 meshes of a rectangle and a box.
//!
//! Nodes live on a lattice with twice the cell resolution, so every
//! mid-edge node is a lattice point and is shared between neighboring
//! elements automatically.
//!
//! ```
//! use sl_rs::mesh::{MeshTopology2D, MeshTopology3D, SimplexMesh};
//!
//! let tri = MeshTopology2D::uniform_rectangle(0.0, 1.0, 0.0, 1.0, 4, 4).unwrap();
//! assert_eq!(tri.n_elements(), 32);
//! assert_eq!(tri.n_nodes(), 81);
//!
//! let tet = MeshTopology3D::uniform_box([0.0; 3], [1.0; 3], [2, 2, 2]).unwrap();
//! assert_eq!(tet.n_elements(), 48);
//! assert_eq!(tet.n_nodes(), 125);
//! ```

use crate::characteristics::shape::{TETRAHEDRON_EDGES, TRIANGLE_EDGES};
use crate::mesh::{MeshError, MeshTopology2D, MeshTopology3D};

/// Corner offsets of the six Kuhn tetrahedra of a unit cube, one per axis
/// permutation, all sharing the main diagonal.
const KUHN_TETS: [[[usize; 3]; 4]; 6] = [
    [[0, 0, 0], [1, 0, 0], [1, 1, 0], [1, 1, 1]],
    [[0, 0, 0], [1, 0, 0], [1, 0, 1], [1, 1, 1]],
    [[0, 0, 0], [0, 1, 0], [1, 1, 0], [1, 1, 1]],
    [[0, 0, 0], [0, 1, 0], [0, 1, 1], [1, 1, 1]],
    [[0, 0, 0], [0, 0, 1], [1, 0, 1], [1, 1, 1]],
    [[0, 0, 0], [0, 0, 1], [0, 1, 1], [1, 1, 1]],
];

impl MeshTopology2D {
    /// Uniform mesh of `[x0, x1] × [y0, y1]` with `nx × ny` cells, each
    /// split into two triangles along the diagonal from its lower-left corner.
    pub fn uniform_rectangle(
        x0: f64,
        x1: f64,
        y0: f64,
        y1: f64,
        nx: usize,
        ny: usize,
    ) -> Result<Self, MeshError> {
        if nx == 0 || ny == 0 {
            return Err(MeshError::EmptyMesh);
        }
        let (px, py) = (2 * nx + 1, 2 * ny + 1);
        let id = |i: usize, j: usize| j * px + i;

        let mut x = Vec::with_capacity(px * py);
        let mut y = Vec::with_capacity(px * py);
        for j in 0..py {
            for i in 0..px {
                x.push(x0 + (x1 - x0) * i as f64 / (px - 1) as f64);
                y.push(y0 + (y1 - y0) * j as f64 / (py - 1) as f64);
            }
        }

        let mut nodes = Vec::with_capacity(2 * nx * ny);
        for cj in 0..ny {
            for ci in 0..nx {
                let (i, j) = (2 * ci, 2 * cj);
                let lower = [(i, j), (i + 2, j), (i + 2, j + 2)];
                let upper = [(i, j), (i + 2, j + 2), (i, j + 2)];
                for tri in [lower, upper] {
                    let mut n = [0usize; 6];
                    for (c, &(a, b)) in tri.iter().enumerate() {
                        n[c] = id(a, b);
                    }
                    for (e, &[ca, cb]) in TRIANGLE_EDGES.iter().enumerate() {
                        n[3 + e] = id((tri[ca].0 + tri[cb].0) / 2, (tri[ca].1 + tri[cb].1) / 2);
                    }
                    nodes.push(n);
                }
            }
        }

        Self::from_p2(x, y, nodes)
    }
}

impl MeshTopology3D {
    /// Uniform mesh of the box `[lo, hi]` with `cells` cubes per axis, each
    /// split into six Kuhn tetrahedra.
    pub fn uniform_box(lo: [f64; 3], hi: [f64; 3], cells: [usize; 3]) -> Result<Self, MeshError> {
        if cells.contains(&0) {
            return Err(MeshError::EmptyMesh);
        }
        let p = cells.map(|c| 2 * c + 1);
        let id = |v: [usize; 3]| (v[2] * p[1] + v[1]) * p[0] + v[0];

        let n_points = p[0] * p[1] * p[2];
        let mut coords = [
            Vec::with_capacity(n_points),
            Vec::with_capacity(n_points),
            Vec::with_capacity(n_points),
        ];
        for k in 0..p[2] {
            for j in 0..p[1] {
                for i in 0..p[0] {
                    for (axis, &idx) in [i, j, k].iter().enumerate() {
                        let t = idx as f64 / (p[axis] - 1) as f64;
                        coords[axis].push(lo[axis] + (hi[axis] - lo[axis]) * t);
                    }
                }
            }
        }

        let mut nodes = Vec::with_capacity(6 * cells.iter().product::<usize>());
        for ck in 0..cells[2] {
            for cj in 0..cells[1] {
                for ci in 0..cells[0] {
                    let base = [2 * ci, 2 * cj, 2 * ck];
                    for tet in KUHN_TETS {
                        let v = tet.map(|o| [base[0] + 2 * o[0], base[1] + 2 * o[1], base[2] + 2 * o[2]]);
                        let mut n = [0usize; 10];
                        for c in 0..4 {
                            n[c] = id(v[c]);
                        }
                        for (e, &[a, b]) in TETRAHEDRON_EDGES.iter().enumerate() {
                            n[4 + e] = id([
                                (v[a][0] + v[b][0]) / 2,
                                (v[a][1] + v[b][1]) / 2,
                                (v[a][2] + v[b][2]) / 2,
                            ]);
                        }
                        nodes.push(n);
                    }
                }
            }
        }

        let [x, y, z] = coords;
        Self::from_p2(x, y, z, nodes)
    }
}

//! Point location by walking across element faces.
//!
//! Starting from a known element, the walk computes the query point's
//! barycentric weights, and while the point is outside it steps into the
//! neighbor across the exit face. It never steps straight back into the
//! element it came from. When the exit face lies on the domain boundary the
//! point is projected onto that face; if the projection falls beyond the
//! face the walk "leaps" along the boundary to the neighbor across the face
//! opposite the most negative projected weight.
//!
//! ```
//! use sl_rs::characteristics::{LocateStatus, PointLocator};
//! use sl_rs::mesh::MeshTopology2D;
//! use sl_rs::types::ElementIndex;
//!
//! let mesh = MeshTopology2D::uniform_rectangle(0.0, 1.0, 0.0, 1.0, 4, 4).unwrap();
//! let locator = PointLocator::new(&mesh);
//!
//! let hit = locator.locate(&[0.8, 0.65], ElementIndex::ZERO);
//! assert_eq!(hit.status, LocateStatus::Inside);
//!
//! let clamped = locator.locate(&[1.5, 0.5], ElementIndex::ZERO);
//! assert_eq!(clamped.status, LocateStatus::Boundary);
//! ```

use crate::characteristics::config::LocateOptions;
use crate::characteristics::shape::{QuadraticBasis, clip_barycentric};
use crate::mesh::SimplexMesh;
use crate::mesh::traits::most_negative;
use crate::types::{ElementIndex, FaceIndex};

/// How a walk ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocateStatus {
    /// The point lies in the returned element (within tolerance).
    Inside,
    /// The point is outside the domain; weights were clamped onto the boundary.
    Boundary,
    /// The step cap was hit; weights were clamped into the last element.
    Exhausted,
}

impl LocateStatus {
    /// True unless the point was found inside the mesh.
    pub fn is_clamped(self) -> bool {
        !matches!(self, LocateStatus::Inside)
    }
}

/// Result of a point location.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Location<B> {
    pub element: ElementIndex,
    /// Barycentric weights in `element`; non-negative unless `Inside`
    /// within tolerance.
    pub bary: B,
    pub status: LocateStatus,
    /// Elements visited, including the start element.
    pub steps: usize,
    /// Boundary leaps taken.
    pub leaps: usize,
}

impl<B: QuadraticBasis> Location<B> {
    /// Local coordinates `(p, q[, r])`.
    pub fn local(&self) -> &[f64] {
        &self.bary.as_ref()[1..]
    }

    /// P2 shape function values at the located point.
    pub fn weights(&self) -> B::Weights {
        self.bary.weights()
    }
}

/// Mesh walk over a [`SimplexMesh`].
#[derive(Clone, Copy, Debug)]
pub struct PointLocator<'m, M> {
    mesh: &'m M,
    options: LocateOptions,
}

impl<'m, M: SimplexMesh> PointLocator<'m, M> {
    pub fn new(mesh: &'m M) -> Self {
        Self {
            mesh,
            options: LocateOptions::default(),
        }
    }

    pub fn with_options(mut self, options: LocateOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> LocateOptions {
        self.options
    }

    pub fn mesh(&self) -> &'m M {
        self.mesh
    }

    /// Find the element containing `point`, starting the walk at `start`.
    pub fn locate(&self, point: &M::Point, start: ElementIndex) -> Location<M::Barycentric> {
        let tol = self.options.tolerance;
        let mut current = start;
        let mut came_from: Option<ElementIndex> = None;
        let mut steps = 0;
        let mut leaps = 0;

        loop {
            let bary = self.mesh.barycentric(current, point);
            steps += 1;

            if bary.as_ref().iter().all(|&l| l >= -tol) {
                return Location {
                    element: current,
                    bary,
                    status: LocateStatus::Inside,
                    steps,
                    leaps,
                };
            }
            if steps >= self.options.max_steps {
                return clamped(current, bary, LocateStatus::Exhausted, steps, leaps);
            }

            let face = self.exit_face(current, &bary, came_from);
            if let Some(next) = self.mesh.neighbor(current, face) {
                came_from = Some(current);
                current = next;
                continue;
            }

            // Boundary face: spread the violating weight equally over the
            // others. This is the nearest point of the face in barycentric
            // coordinates; in physical space the point may also slide along
            // the face.
            let mut projected = bary;
            let weights = projected.as_mut();
            let lf = weights[face.get()];
            let share = lf / (M::CORNERS - 1) as f64;
            for (i, l) in weights.iter_mut().enumerate() {
                *l = if i == face.get() { 0.0 } else { *l + share };
            }

            if weights.iter().all(|&l| l >= -tol) {
                return clamped(current, projected, LocateStatus::Boundary, steps, leaps);
            }

            let along = FaceIndex::new(most_negative(weights));
            match self.mesh.neighbor(current, along) {
                Some(next) if Some(next) != came_from => {
                    leaps += 1;
                    came_from = Some(current);
                    current = next;
                }
                _ => return clamped(current, projected, LocateStatus::Boundary, steps, leaps),
            }
        }
    }

    /// Exit face, avoiding a step back into `came_from` when another
    /// violated face has a neighbor.
    fn exit_face(
        &self,
        k: ElementIndex,
        bary: &M::Barycentric,
        came_from: Option<ElementIndex>,
    ) -> FaceIndex {
        let primary = M::exit_face(bary);
        if came_from.is_none() || self.mesh.neighbor(k, primary) != came_from {
            return primary;
        }

        let l = bary.as_ref();
        let mut best: Option<usize> = None;
        for i in 0..M::CORNERS {
            if i == primary.get() || l[i] >= -self.options.tolerance {
                continue;
            }
            let leads_elsewhere = self
                .mesh
                .neighbor(k, FaceIndex::new(i))
                .is_some_and(|nb| Some(nb) != came_from);
            if leads_elsewhere && best.is_none_or(|b| l[i] < l[b]) {
                best = Some(i);
            }
        }
        best.map_or(primary, FaceIndex::new)
    }
}

fn clamped<B: QuadraticBasis>(
    element: ElementIndex,
    mut bary: B,
    status: LocateStatus,
    steps: usize,
    leaps: usize,
) -> Location<B> {
    clip_barycentric(bary.as_mut());
    Location {
        element,
        bary,
        status,
        steps,
        leaps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{MeshTopology2D, MeshTopology3D};
    use approx::assert_relative_eq;

    fn single_triangle() -> MeshTopology2D {
        let x = vec![0.0, 1.0, 0.0, 0.5, 0.5, 0.0];
        let y = vec![0.0, 0.0, 1.0, 0.0, 0.5, 0.5];
        MeshTopology2D::from_p2(x, y, vec![[0, 1, 2, 3, 4, 5]]).unwrap()
    }

    #[test]
    fn test_inside_start_element() {
        let mesh = single_triangle();
        let loc = PointLocator::new(&mesh).locate(&[0.2, 0.3], ElementIndex::ZERO);
        assert_eq!(loc.status, LocateStatus::Inside);
        assert_eq!(loc.steps, 1);
        assert_relative_eq!(loc.local()[0], 0.2, epsilon = 1e-14);
        assert_relative_eq!(loc.local()[1], 0.3, epsilon = 1e-14);
    }

    #[test]
    fn test_boundary_projection_spreads_weight_equally() {
        let mesh = single_triangle();
        // l = [0.6, -0.1, 0.5] beyond the leg x = 0
        let loc = PointLocator::new(&mesh).locate(&[-0.1, 0.5], ElementIndex::ZERO);
        assert_eq!(loc.status, LocateStatus::Boundary);
        assert_relative_eq!(loc.bary[0], 0.55, epsilon = 1e-14);
        assert_relative_eq!(loc.bary[1], 0.0);
        assert_relative_eq!(loc.bary[2], 0.45, epsilon = 1e-14);

        let on_edge = mesh.physical(loc.element, &loc.bary);
        assert_relative_eq!(on_edge[0], 0.0, epsilon = 1e-14);
        assert_relative_eq!(on_edge[1], 0.45, epsilon = 1e-14);
    }

    #[test]
    fn test_projection_onto_boundary_edge() {
        let mesh = single_triangle();
        // Beyond the hypotenuse, projects onto its middle
        let loc = PointLocator::new(&mesh).locate(&[1.0, 1.0], ElementIndex::ZERO);
        assert_eq!(loc.status, LocateStatus::Boundary);
        assert_relative_eq!(loc.bary[0], 0.0);
        assert_relative_eq!(loc.bary[1], 0.5, epsilon = 1e-14);
        assert_relative_eq!(loc.bary[2], 0.5, epsilon = 1e-14);
    }

    #[test]
    fn test_far_point_clamps_to_corner() {
        let mesh = single_triangle();
        let loc = PointLocator::new(&mesh).locate(&[-5.0, -5.0], ElementIndex::ZERO);
        assert_eq!(loc.status, LocateStatus::Boundary);
        assert_eq!(loc.bary, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_walk_crosses_elements() {
        let mesh = MeshTopology2D::uniform_rectangle(0.0, 1.0, 0.0, 1.0, 8, 8).unwrap();
        let locator = PointLocator::new(&mesh);
        let target = [0.93, 0.71];
        let loc = locator.locate(&target, ElementIndex::ZERO);
        assert_eq!(loc.status, LocateStatus::Inside);
        assert!(loc.steps > 1);
        let back = mesh.physical(loc.element, &loc.bary);
        assert_relative_eq!(back[0], target[0], epsilon = 1e-12);
        assert_relative_eq!(back[1], target[1], epsilon = 1e-12);
    }

    #[test]
    fn test_step_cap_reports_exhausted() {
        let mesh = MeshTopology2D::uniform_rectangle(0.0, 1.0, 0.0, 1.0, 8, 8).unwrap();
        let locator = PointLocator::new(&mesh).with_options(LocateOptions {
            max_steps: 2,
            ..Default::default()
        });
        let loc = locator.locate(&[0.95, 0.95], ElementIndex::ZERO);
        assert_eq!(loc.status, LocateStatus::Exhausted);
        assert_eq!(loc.steps, 2);
        assert!(loc.status.is_clamped());
        assert_relative_eq!(loc.bary.iter().sum::<f64>(), 1.0, epsilon = 1e-14);
        assert!(loc.bary.iter().all(|&l| l >= 0.0));
    }

    #[test]
    fn test_walk_in_box() {
        let mesh = MeshTopology3D::uniform_box([0.0; 3], [1.0; 3], [3, 3, 3]).unwrap();
        let target = [0.81, 0.17, 0.66];
        let loc = PointLocator::new(&mesh).locate(&target, ElementIndex::ZERO);
        assert_eq!(loc.status, LocateStatus::Inside);
        let back = mesh.physical(loc.element, &loc.bary);
        for d in 0..3 {
            assert_relative_eq!(back[d], target[d], epsilon = 1e-12);
        }
    }
}

//! Antidiffusive correction of advected fields.
//!
//! Interpolating at characteristic feet smooths the transported field. The
//! correction pushes each node's value forward along its characteristic and
//! compares what the advected field implies there with the value the node
//! carried before the step. The residual is fed back, weighted by the P2
//! shape functions, onto the nodes of the element containing the forward
//! point.
//!
//! Sweeps are Jacobi style: each sweep reads the field left by the previous
//! one and computes all increments before applying them. Each node gathers
//! its increment from a fixed list of contributions, so parallel and
//! sequential sweeps produce the same bits.
//!
//! The correction is not limited: values may leave the range of the
//! original field, most visibly on rough data.

use log::debug;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::characteristics::config::{AntidiffusionConfig, LocateOptions, SweepMode};
use crate::characteristics::error::{CharacteristicsError, Result};
use crate::characteristics::locate::PointLocator;
use crate::characteristics::shape::interpolate;
use crate::characteristics::tracer::StepInput;
use crate::mesh::{Point, SimplexMesh};
use crate::types::{ElementIndex, NodeIndex};

/// Outcome of [`AntidiffusionCorrector::correct`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AntidiffusionReport {
    /// Sweeps applied to the field.
    pub sweeps: usize,
    /// Largest absolute residual before the first sweep.
    pub initial_max_residual: f64,
    /// Largest absolute residual after the last sweep.
    pub final_max_residual: f64,
    pub contributing_nodes: usize,
    pub excluded_nodes: usize,
    /// `Converge` mode reached its tolerance. Always false for `Fixed`.
    pub converged: bool,
}

/// Forward sample locations for one step, reusable for every field.
#[derive(Clone, Debug)]
pub struct AntidiffusionCorrector<'m, M> {
    mesh: &'m M,
    config: AntidiffusionConfig,
    /// Nodes whose residual is fed back.
    contributors: Vec<NodeIndex>,
    /// Element of each contributor's forward point.
    elements: Vec<ElementIndex>,
    /// Unclamped P2 weights, `NODES_PER_ELEMENT` per contributor.
    weights: Vec<f64>,
    /// CSR offsets into `gather`, one row per node.
    gather_offsets: Vec<usize>,
    /// Indices into `weights`, grouped by receiving node in contributor order.
    /// Dirichlet nodes have empty rows.
    gather: Vec<usize>,
    excluded: usize,
    #[cfg_attr(not(feature = "parallel"), allow(dead_code))]
    parallel: bool,
}

impl<'m, M: SimplexMesh> AntidiffusionCorrector<'m, M> {
    /// Locate every node's forward point `x_n + dt·(1.5·v - 0.5·v_prev)`.
    ///
    /// Nodes are excluded when their forward point falls outside the mesh,
    /// when `excluded[n]` is set (e.g. clamped during the trace), or when
    /// they are Dirichlet nodes.
    pub fn prepare(
        mesh: &'m M,
        config: AntidiffusionConfig,
        options: LocateOptions,
        input: &StepInput<'_>,
        reference: &[ElementIndex],
        excluded: &[bool],
    ) -> Result<Self> {
        config.validate()?;
        input.validate(mesh)?;
        let n_nodes = mesh.n_nodes();
        if reference.len() != n_nodes {
            return Err(CharacteristicsError::FieldLength {
                what: "reference",
                found: reference.len(),
                expected: n_nodes,
            });
        }
        if excluded.len() != n_nodes {
            return Err(CharacteristicsError::FieldLength {
                what: "excluded",
                found: excluded.len(),
                expected: n_nodes,
            });
        }

        let locator = PointLocator::new(mesh).with_options(options);
        let npe = M::NODES_PER_ELEMENT;
        let mut contributors = Vec::with_capacity(n_nodes);
        let mut elements = Vec::with_capacity(n_nodes);
        let mut weights = Vec::with_capacity(n_nodes * npe);
        let dirichlet: Vec<bool> = NodeIndex::iter(n_nodes).map(|n| input.is_dirichlet(n)).collect();

        for n in NodeIndex::iter(n_nodes) {
            if dirichlet[n] || excluded[n] {
                continue;
            }
            let x = mesh.node(n);
            let forward = M::Point::from_fn(|d| x.coord(d) + input.displacement(d, n));
            let loc = locator.locate(&forward, reference[n]);
            if loc.status.is_clamped() {
                continue;
            }
            contributors.push(n);
            elements.push(loc.element);
            weights.extend_from_slice(loc.weights().as_ref());
        }

        let (gather_offsets, gather) = gather_lists(mesh, &elements, &dirichlet);
        let excluded = n_nodes - contributors.len();
        debug!(
            "antidiffusion: {} contributing nodes, {} excluded",
            contributors.len(),
            excluded
        );

        Ok(Self {
            mesh,
            config,
            contributors,
            elements,
            weights,
            gather_offsets,
            gather,
            excluded,
            parallel: cfg!(feature = "parallel"),
        })
    }

    /// Run sweeps on rayon's pool. Ignored without the `parallel` feature.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel && cfg!(feature = "parallel");
        self
    }

    pub fn contributing_nodes(&self) -> usize {
        self.contributors.len()
    }

    pub fn excluded_nodes(&self) -> usize {
        self.excluded
    }

    pub fn config(&self) -> AntidiffusionConfig {
        self.config
    }

    /// Correct `field` (the advected values) towards `original` (the values
    /// before the step).
    pub fn correct(&self, original: &[f64], field: &mut [f64]) -> Result<AntidiffusionReport> {
        let n_nodes = self.mesh.n_nodes();
        for (what, len) in [("original", original.len()), ("field", field.len())] {
            if len != n_nodes {
                return Err(CharacteristicsError::FieldLength {
                    what,
                    found: len,
                    expected: n_nodes,
                });
            }
        }

        let (max_sweeps, tolerance) = match self.config.mode {
            SweepMode::Fixed(n) => (n, None),
            SweepMode::Converge {
                tolerance,
                max_sweeps,
            } => (max_sweeps, Some(tolerance)),
        };

        let mut report = AntidiffusionReport {
            contributing_nodes: self.contributors.len(),
            excluded_nodes: self.excluded,
            ..Default::default()
        };

        let (mut increment, mut residual) = self.sweep(original, field);
        report.initial_max_residual = residual;

        while report.sweeps < max_sweeps {
            if tolerance.is_some_and(|tol| residual < tol) {
                break;
            }
            for (value, delta) in field.iter_mut().zip(&increment) {
                *value += delta;
            }
            report.sweeps += 1;
            (increment, residual) = self.sweep(original, field);
        }

        report.final_max_residual = residual;
        report.converged = tolerance.is_some_and(|tol| residual < tol);
        Ok(report)
    }

    /// `original - implied` at contributor `i`'s forward point.
    fn residual(&self, i: usize, original: &[f64], field: &[f64]) -> f64 {
        let npe = M::NODES_PER_ELEMENT;
        let nodes = self.mesh.element_nodes(self.elements[i]);
        let phi = &self.weights[i * npe..(i + 1) * npe];
        original[self.contributors[i]] - interpolate(phi, nodes, field)
    }

    /// Relaxed increment of node `n` from the contributor residuals.
    fn increment(&self, n: usize, residuals: &[f64]) -> f64 {
        let npe = M::NODES_PER_ELEMENT;
        let row = &self.gather[self.gather_offsets[n]..self.gather_offsets[n + 1]];
        let sum: f64 = row.iter().map(|&k| residuals[k / npe] * self.weights[k]).sum();
        self.config.relaxation * sum
    }

    /// Increments and largest residual for the current field.
    fn sweep(&self, original: &[f64], field: &[f64]) -> (Vec<f64>, f64) {
        let n_contributors = self.contributors.len();
        let n_nodes = field.len();

        #[cfg(feature = "parallel")]
        {
            if self.parallel {
                let residuals: Vec<f64> = (0..n_contributors)
                    .into_par_iter()
                    .map(|i| self.residual(i, original, field))
                    .collect();
                let increment = (0..n_nodes)
                    .into_par_iter()
                    .map(|n| self.increment(n, &residuals))
                    .collect();
                return (increment, max_abs(&residuals));
            }
        }

        let residuals: Vec<f64> = (0..n_contributors)
            .map(|i| self.residual(i, original, field))
            .collect();
        let increment = (0..n_nodes).map(|n| self.increment(n, &residuals)).collect();
        (increment, max_abs(&residuals))
    }
}

fn max_abs(values: &[f64]) -> f64 {
    values.iter().fold(0.0_f64, |m, r| m.max(r.abs()))
}

/// For every node, the `weights` entries that feed it, in contributor order.
fn gather_lists<M: SimplexMesh>(
    mesh: &M,
    elements: &[ElementIndex],
    dirichlet: &[bool],
) -> (Vec<usize>, Vec<usize>) {
    let npe = M::NODES_PER_ELEMENT;
    let mut offsets = vec![0usize; dirichlet.len() + 1];
    for &k in elements {
        for &target in mesh.element_nodes(k) {
            if !dirichlet[target] {
                offsets[target + 1] += 1;
            }
        }
    }
    for n in 0..dirichlet.len() {
        offsets[n + 1] += offsets[n];
    }

    let mut cursor = offsets.clone();
    let mut gather = vec![0usize; offsets[dirichlet.len()]];
    for (i, &k) in elements.iter().enumerate() {
        for (j, &target) in mesh.element_nodes(k).iter().enumerate() {
            if !dirichlet[target] {
                gather[cursor[target]] = i * npe + j;
                cursor[target] += 1;
            }
        }
    }
    (offsets, gather)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MeshTopology2D;
    use approx::assert_relative_eq;

    fn setup() -> (MeshTopology2D, Vec<f64>, Vec<f64>) {
        let mesh = MeshTopology2D::uniform_rectangle(0.0, 1.0, 0.0, 1.0, 6, 6).unwrap();
        let u = vec![1.0; mesh.n_nodes()];
        let v = vec![0.0; mesh.n_nodes()];
        (mesh, u, v)
    }

    #[test]
    fn test_constant_field_untouched() {
        let (mesh, u, v) = setup();
        let vel = [u.as_slice(), v.as_slice()];
        let input = StepInput::new(&vel, &vel, 0.05);
        let reference = mesh.initial_reference_elements();
        let excluded = vec![false; mesh.n_nodes()];
        let corrector = AntidiffusionCorrector::prepare(
            &mesh,
            AntidiffusionConfig::default(),
            LocateOptions::default(),
            &input,
            &reference,
            &excluded,
        )
        .unwrap();

        let original = vec![2.5; mesh.n_nodes()];
        let mut field = original.clone();
        let report = corrector.correct(&original, &mut field).unwrap();
        assert_eq!(report.sweeps, 10);
        assert!(!report.converged);
        for value in field {
            assert_relative_eq!(value, 2.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_outflow_nodes_excluded() {
        let (mesh, u, v) = setup();
        let vel = [u.as_slice(), v.as_slice()];
        let input = StepInput::new(&vel, &vel, 0.05);
        let reference = mesh.initial_reference_elements();
        let excluded = vec![false; mesh.n_nodes()];
        let corrector = AntidiffusionCorrector::prepare(
            &mesh,
            AntidiffusionConfig::default(),
            LocateOptions::default(),
            &input,
            &reference,
            &excluded,
        )
        .unwrap();

        // Nodes on x = 1 move out of the domain
        let outflow = mesh.x.iter().filter(|&&x| x > 1.0 - 1e-12).count();
        assert_eq!(corrector.excluded_nodes(), outflow);
        assert_eq!(corrector.contributing_nodes(), mesh.n_nodes() - outflow);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_sweeps_match_sequential() {
        let mesh = MeshTopology2D::uniform_rectangle(0.0, 1.0, 0.0, 1.0, 8, 8).unwrap();
        let u: Vec<f64> = mesh.y.iter().map(|y| 0.5 - y).collect();
        let v: Vec<f64> = mesh.x.iter().map(|x| x - 0.5).collect();
        let vel = [u.as_slice(), v.as_slice()];
        let input = StepInput::new(&vel, &vel, 0.1);
        let reference = mesh.initial_reference_elements();
        let corrector = AntidiffusionCorrector::prepare(
            &mesh,
            AntidiffusionConfig::default(),
            LocateOptions::default(),
            &input,
            &reference,
            &vec![false; mesh.n_nodes()],
        )
        .unwrap();

        let original: Vec<f64> = mesh
            .x
            .iter()
            .zip(&mesh.y)
            .map(|(x, y)| (7.0 * x).sin() * (5.0 * y).cos())
            .collect();
        let advected: Vec<f64> = original.iter().map(|c| 0.9 * c).collect();
        let run = |parallel: bool| {
            let mut field = advected.clone();
            let report = corrector
                .clone()
                .with_parallel(parallel)
                .correct(&original, &mut field)
                .unwrap();
            (field, report)
        };

        let (sequential, a) = run(false);
        let (parallel, b) = run(true);
        assert_eq!(sequential, parallel);
        assert_eq!(a, b);
    }

    #[test]
    fn test_gather_skips_dirichlet_nodes() {
        let (mesh, u, v) = setup();
        let vel = [u.as_slice(), v.as_slice()];
        let inflow: Vec<bool> = mesh.x.iter().map(|&x| x < 0.25).collect();
        let input = StepInput::new(&vel, &vel, 0.05).with_dirichlet(&inflow);
        let reference = mesh.initial_reference_elements();
        let corrector = AntidiffusionCorrector::prepare(
            &mesh,
            AntidiffusionConfig::default(),
            LocateOptions::default(),
            &input,
            &reference,
            &vec![false; mesh.n_nodes()],
        )
        .unwrap();

        for n in 0..mesh.n_nodes() {
            let row = &corrector.gather[corrector.gather_offsets[n]..corrector.gather_offsets[n + 1]];
            if inflow[n] {
                assert!(row.is_empty());
            } else {
                assert!(!row.is_empty());
            }
            // contributor order
            assert!(row.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let (mesh, u, v) = setup();
        let vel = [u.as_slice(), v.as_slice()];
        let input = StepInput::new(&vel, &vel, 0.05);
        let reference = mesh.initial_reference_elements();
        let corrector = AntidiffusionCorrector::prepare(
            &mesh,
            AntidiffusionConfig::default(),
            LocateOptions::default(),
            &input,
            &reference,
            &vec![false; mesh.n_nodes()],
        )
        .unwrap();
        let mut short = vec![0.0; 3];
        let err = corrector
            .correct(&vec![0.0; mesh.n_nodes()], &mut short)
            .unwrap_err();
        assert!(matches!(err, CharacteristicsError::FieldLength { what: "field", .. }));
    }
}

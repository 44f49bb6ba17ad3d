//! Integration tests for semi-Lagrangian transport on triangle meshes.
//!
//! These tests verify:
//! 1. Rigid translation reproduces the exact solution away from the inflow edge
//! 2. Zero time step and zero velocity are exact identities
//! 3. Clamped interpolation never creates new extrema
//! 4. Dirichlet nodes are passed through unchanged
//! 5. Parallel and sequential tracing agree bit for bit
//! 6. Sub-stepping, foot fallback and walk failure policies

use std::sync::Arc;

use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sl_rs::characteristics::{
    CharacteristicTracer, CharacteristicsConfig, CharacteristicsError, CollectingSink,
    FootQuadrature, NullSink, StepInput, TraceEvent, WalkFailurePolicy,
};
use sl_rs::mesh::{MeshTopology2D, SimplexMesh};

const TOL: f64 = 1e-12;

fn unit_square(n: usize) -> MeshTopology2D {
    MeshTopology2D::uniform_rectangle(0.0, 1.0, 0.0, 1.0, n, n).unwrap()
}

/// Uniform flow `(u, v)` at every node.
fn uniform_flow(mesh: &MeshTopology2D, u: f64, v: f64) -> (Vec<f64>, Vec<f64>) {
    (vec![u; mesh.n_nodes()], vec![v; mesh.n_nodes()])
}

/// Solid-body rotation about (0.5, 0.5).
fn rotation(mesh: &MeshTopology2D) -> (Vec<f64>, Vec<f64>) {
    let u = mesh.y.iter().map(|y| 0.5 - y).collect();
    let v = mesh.x.iter().map(|x| x - 0.5).collect();
    (u, v)
}

fn random_field(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(0.0..1.0)).collect()
}

fn tracer(mesh: &MeshTopology2D, config: CharacteristicsConfig) -> CharacteristicTracer<'_, MeshTopology2D> {
    CharacteristicTracer::new(mesh, config).unwrap().with_sink(NullSink)
}

// ============================================================================
// Exact Transport
// ============================================================================

#[test]
fn test_rigid_translation_exact_away_from_inflow() {
    let mesh = unit_square(8);
    let (u, v) = uniform_flow(&mesh, 1.0, 0.0);
    let vel = [u.as_slice(), v.as_slice()];
    let dt = 0.1;

    let mut c = mesh.x.clone();
    let mut reference = mesh.initial_reference_elements();
    let report = tracer(&mesh, CharacteristicsConfig::default())
        .advect(&StepInput::new(&vel, &vel, dt), &mut [&mut c[..]], &mut reference)
        .unwrap();

    for (n, &x) in mesh.x.iter().enumerate() {
        if x > dt + 1e-9 {
            assert_relative_eq!(c[n], x - dt, epsilon = TOL);
        } else {
            // Foot left the domain: clamped onto the inflow edge x = 0
            assert_relative_eq!(c[n], 0.0, epsilon = TOL);
        }
    }

    // Columns x = 0 and x = 1/16, 17 nodes each
    assert_eq!(report.boundary_clamps, 34);
    assert_eq!(report.nodes_traced, mesh.n_nodes());
    assert_eq!(report.foot_fallbacks, 0);
    assert_eq!(report.walk_cap_hits, 0);
    assert_eq!(report.mean_foot_iterations(), 2.0);
}

#[test]
fn test_reference_elements_contain_feet() {
    let mesh = unit_square(6);
    let (u, v) = uniform_flow(&mesh, 0.3, -0.2);
    let vel = [u.as_slice(), v.as_slice()];
    let dt = 0.25;

    let mut c = vec![1.0; mesh.n_nodes()];
    let mut reference = mesh.initial_reference_elements();
    tracer(&mesh, CharacteristicsConfig::default())
        .advect(&StepInput::new(&vel, &vel, dt), &mut [&mut c[..]], &mut reference)
        .unwrap();

    for n in 0..mesh.n_nodes() {
        let foot = [mesh.x[n] - 0.3 * dt, mesh.y[n] + 0.2 * dt];
        if !(0.0..=1.0).contains(&foot[0]) || !(0.0..=1.0).contains(&foot[1]) {
            continue;
        }
        let bary = mesh.barycentric(reference[n], &foot);
        assert!(
            bary.iter().all(|&l| l >= -1e-6),
            "node {n}: foot {foot:?} outside reference {}",
            reference[n]
        );
    }
}

#[test]
fn test_zero_time_step_is_identity() {
    let mesh = unit_square(5);
    let (u, v) = rotation(&mesh);
    let vel = [u.as_slice(), v.as_slice()];
    let original = random_field(mesh.n_nodes(), 1);

    let mut c = original.clone();
    let mut reference = mesh.initial_reference_elements();
    let report = tracer(&mesh, CharacteristicsConfig::default())
        .advect(&StepInput::new(&vel, &vel, 0.0), &mut [&mut c[..]], &mut reference)
        .unwrap();

    assert_eq!(c, original);
    assert_eq!(report.stationary_nodes, mesh.n_nodes());
    assert_eq!(reference, mesh.initial_reference_elements());
}

#[test]
fn test_zero_velocity_is_identity() {
    let mesh = unit_square(5);
    let (u, v) = uniform_flow(&mesh, 0.0, 0.0);
    let vel = [u.as_slice(), v.as_slice()];
    let original = random_field(mesh.n_nodes(), 2);

    let mut c = original.clone();
    let mut reference = mesh.initial_reference_elements();
    let report = tracer(&mesh, CharacteristicsConfig::default())
        .advect(&StepInput::new(&vel, &vel, 0.3), &mut [&mut c[..]], &mut reference)
        .unwrap();

    assert_eq!(c, original);
    assert_eq!(report.stationary_nodes, mesh.n_nodes());
    assert_eq!(report.walk_steps, 0);
}

#[test]
fn test_endpoint_quadrature_matches_midpoint_for_uniform_flow() {
    let mesh = unit_square(6);
    let (u, v) = uniform_flow(&mesh, 0.7, 0.4);
    let vel = [u.as_slice(), v.as_slice()];
    let input = StepInput::new(&vel, &vel, 0.1);
    let original: Vec<f64> = mesh.x.iter().zip(&mesh.y).map(|(x, y)| x * x + y).collect();

    let mut results = Vec::new();
    for quadrature in [FootQuadrature::Midpoint, FootQuadrature::Endpoint] {
        let config = CharacteristicsConfig::default().with_foot_quadrature(quadrature);
        let mut c = original.clone();
        let mut reference = mesh.initial_reference_elements();
        tracer(&mesh, config)
            .advect(&input, &mut [&mut c[..]], &mut reference)
            .unwrap();
        results.push(c);
    }
    assert_eq!(results[0], results[1]);
}

// ============================================================================
// Bounds and Boundary Conditions
// ============================================================================

#[test]
fn test_rotation_creates_no_new_extrema() {
    let mesh = unit_square(8);
    let (u, v) = rotation(&mesh);
    let vel = [u.as_slice(), v.as_slice()];
    let input = StepInput::new(&vel, &vel, 0.05);
    let tracer = tracer(&mesh, CharacteristicsConfig::default());

    let mut c = random_field(mesh.n_nodes(), 42);
    let lo = c.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = c.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut reference = mesh.initial_reference_elements();

    for _ in 0..10 {
        tracer.advect(&input, &mut [&mut c[..]], &mut reference).unwrap();
        for &value in &c {
            assert!(value >= lo - TOL && value <= hi + TOL, "{value} outside [{lo}, {hi}]");
        }
    }
}

#[test]
fn test_dirichlet_nodes_unchanged() {
    let mesh = unit_square(8);
    let (u, v) = uniform_flow(&mesh, 1.0, 0.0);
    let vel = [u.as_slice(), v.as_slice()];
    let inflow: Vec<bool> = mesh.x.iter().map(|&x| x == 0.0).collect();
    let input = StepInput::new(&vel, &vel, 0.1).with_dirichlet(&inflow);

    let original = random_field(mesh.n_nodes(), 9);
    let mut c = original.clone();
    let mut reference = mesh.initial_reference_elements();
    let report = tracer(&mesh, CharacteristicsConfig::default())
        .advect(&input, &mut [&mut c[..]], &mut reference)
        .unwrap();

    for n in (0..mesh.n_nodes()).filter(|&n| inflow[n]) {
        assert_eq!(c[n], original[n]);
    }
    assert_eq!(report.dirichlet_nodes, 17);
    assert_eq!(report.nodes_traced, mesh.n_nodes() - 17);
    // Only the x = 1/16 column still leaves the domain
    assert_eq!(report.boundary_clamps, 17);
}

// ============================================================================
// Execution Modes
// ============================================================================

#[cfg(feature = "parallel")]
#[test]
fn test_parallel_matches_sequential() {
    let mesh = unit_square(10);
    let (u, v) = rotation(&mesh);
    let vel = [u.as_slice(), v.as_slice()];
    let input = StepInput::new(&vel, &vel, 0.08);
    let original = random_field(mesh.n_nodes(), 5);
    let second: Vec<f64> = mesh.x.iter().map(|x| x.sin()).collect();

    let run = |parallel: bool| {
        let mut c = original.clone();
        let mut s = second.clone();
        let mut reference = mesh.initial_reference_elements();
        let report = tracer(&mesh, CharacteristicsConfig::default())
            .with_parallel(parallel)
            .advect(&input, &mut [&mut c[..], &mut s[..]], &mut reference)
            .unwrap();
        (c, s, reference, report)
    };

    assert_eq!(run(false), run(true));
}

#[test]
fn test_advect_into_leaves_inputs_untouched() {
    let mesh = unit_square(6);
    let (u, v) = rotation(&mesh);
    let vel = [u.as_slice(), v.as_slice()];
    let input = StepInput::new(&vel, &vel, 0.1);
    let tracer = tracer(&mesh, CharacteristicsConfig::default());
    let original = random_field(mesh.n_nodes(), 17);

    let mut out = vec![0.0; mesh.n_nodes()];
    let mut reference = mesh.initial_reference_elements();
    tracer
        .advect_into(&input, &[original.as_slice()], &mut [&mut out[..]], &mut reference)
        .unwrap();

    let mut in_place = original.clone();
    let mut reference = mesh.initial_reference_elements();
    tracer
        .advect(&input, &mut [&mut in_place[..]], &mut reference)
        .unwrap();

    assert_eq!(out, in_place);
    assert_ne!(out, original);
}

#[test]
fn test_advect_into_rejects_mismatched_outputs() {
    let mesh = unit_square(2);
    let (u, v) = uniform_flow(&mesh, 1.0, 0.0);
    let vel = [u.as_slice(), v.as_slice()];
    let input = StepInput::new(&vel, &vel, 0.1);
    let field = vec![0.0; mesh.n_nodes()];
    let mut short = vec![0.0; 4];
    let mut reference = mesh.initial_reference_elements();

    let err = tracer(&mesh, CharacteristicsConfig::default())
        .advect_into(&input, &[field.as_slice()], &mut [&mut short[..]], &mut reference)
        .unwrap_err();
    assert!(matches!(err, CharacteristicsError::FieldLength { what: "output field", .. }));
}

#[test]
fn test_substeps_match_single_step_for_uniform_flow() {
    let mesh = unit_square(8);
    let (u, v) = uniform_flow(&mesh, 1.0, 0.0);
    let vel = [u.as_slice(), v.as_slice()];
    let input = StepInput::new(&vel, &vel, 0.1);
    let exact: Vec<f64> = mesh.x.iter().zip(&mesh.y).map(|(x, y)| x - 0.1 + 2.0 * y).collect();

    for substeps in [1, 4] {
        let config = CharacteristicsConfig::default().with_substeps(substeps);
        let mut c: Vec<f64> = mesh.x.iter().zip(&mesh.y).map(|(x, y)| x + 2.0 * y).collect();
        let mut reference = mesh.initial_reference_elements();
        let report = tracer(&mesh, config)
            .advect(&input, &mut [&mut c[..]], &mut reference)
            .unwrap();

        assert_eq!(report.substeps, substeps);
        assert_eq!(report.nodes_traced, substeps * mesh.n_nodes());
        // Clamping at the inflow edge spreads one element per substep
        for n in (0..mesh.n_nodes()).filter(|&n| mesh.x[n] > 0.5) {
            assert_relative_eq!(c[n], exact[n], epsilon = 1e-10);
        }
    }
}

// ============================================================================
// Degraded Paths
// ============================================================================

#[test]
fn test_foot_fallback_for_every_moving_node() {
    let mesh = unit_square(8);
    let (u, v) = rotation(&mesh);
    let vel = [u.as_slice(), v.as_slice()];
    let input = StepInput::new(&vel, &vel, 0.05);
    let sink = Arc::new(CollectingSink::new());
    let tracer = CharacteristicTracer::new(&mesh, CharacteristicsConfig::default().with_max_iterations(1))
        .unwrap()
        .with_sink(Arc::clone(&sink));

    let mut c = random_field(mesh.n_nodes(), 3);
    let mut reference = mesh.initial_reference_elements();
    let report = tracer
        .advect(&input, &mut [&mut c[..]], &mut reference)
        .unwrap();

    // The rotation center does not move
    assert_eq!(report.stationary_nodes, 1);
    assert_eq!(report.foot_fallbacks, mesh.n_nodes() - 1);
    assert_eq!(
        sink.count(|e| matches!(e, TraceEvent::FootFallback { .. })),
        mesh.n_nodes() - 1
    );
    assert!(report.has_degradations());
    assert_eq!(sink.reports(), vec![report]);
}

#[test]
fn test_abort_policy_fails_step_and_keeps_fields() {
    let mesh = unit_square(8);
    let (u, v) = uniform_flow(&mesh, 1.0, 0.0);
    let vel = [u.as_slice(), v.as_slice()];
    let input = StepInput::new(&vel, &vel, 0.5);
    let config = CharacteristicsConfig::default()
        .with_max_iterations(1)
        .with_walk_failure(WalkFailurePolicy::Abort);

    let original = random_field(mesh.n_nodes(), 8);
    let mut c = original.clone();
    let mut reference = mesh.initial_reference_elements();
    let err = tracer(&mesh, config)
        .advect(&input, &mut [&mut c[..]], &mut reference)
        .unwrap_err();

    assert!(matches!(err, CharacteristicsError::WalkNonConvergence { .. }));
    assert_eq!(c, original);
    assert_eq!(reference, mesh.initial_reference_elements());
}

/// Slow drift everywhere moves most feet into a neighbor element, but the
/// last node's walk runs out of steps, so the step fails after earlier
/// nodes were traced.
#[test]
fn test_failed_step_restores_reference_elements() {
    let mesh = unit_square(8);
    let n = mesh.n_nodes();
    let (mut u, mut v) = uniform_flow(&mesh, 0.01, 0.0);
    u[n - 1] = 1.6;
    v[n - 1] = 0.8;
    let vel = [u.as_slice(), v.as_slice()];
    let input = StepInput::new(&vel, &vel, 0.5);
    let config = CharacteristicsConfig::default()
        .with_max_iterations(4)
        .with_walk_failure(WalkFailurePolicy::Abort);

    let original = random_field(n, 12);
    let mut c = original.clone();
    let mut reference = mesh.initial_reference_elements();
    let err = tracer(&mesh, config)
        .with_parallel(false)
        .advect(&input, &mut [&mut c[..]], &mut reference)
        .unwrap_err();

    assert!(matches!(err, CharacteristicsError::WalkNonConvergence { .. }));
    assert_eq!(c, original);
    assert_eq!(reference, mesh.initial_reference_elements());
}

#[test]
fn test_degrade_policy_counts_cap_hits() {
    let mesh = unit_square(8);
    let (u, v) = uniform_flow(&mesh, 1.0, 0.0);
    let vel = [u.as_slice(), v.as_slice()];
    let input = StepInput::new(&vel, &vel, 0.5);
    let sink = Arc::new(CollectingSink::new());
    let tracer = CharacteristicTracer::new(&mesh, CharacteristicsConfig::default().with_max_iterations(1))
        .unwrap()
        .with_sink(Arc::clone(&sink));

    let mut c = random_field(mesh.n_nodes(), 8);
    let mut reference = mesh.initial_reference_elements();
    let report = tracer
        .advect(&input, &mut [&mut c[..]], &mut reference)
        .unwrap();

    assert!(report.walk_cap_hits > 0);
    assert_eq!(
        sink.count(|e| matches!(e, TraceEvent::WalkCapHit { .. })),
        report.walk_cap_hits
    );
    assert!(c.iter().all(|v| (0.0..1.0).contains(v)));
}

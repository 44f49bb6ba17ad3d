//! Tracer and antidiffusion configuration.
//!
//! ```
//! use sl_rs::characteristics::{
//!     AntidiffusionConfig, CharacteristicsConfig, FootQuadrature, SweepMode,
//! };
//!
//! let config = CharacteristicsConfig::default()
//!     .with_foot_quadrature(FootQuadrature::Endpoint)
//!     .with_substeps(2)
//!     .with_antidiffusion(AntidiffusionConfig::default().with_mode(SweepMode::Converge {
//!         tolerance: 1e-10,
//!         max_sweeps: 50,
//!     }));
//! assert!(config.validate().is_ok());
//! ```

use crate::characteristics::error::{CharacteristicsError, Result};

/// Walk and foot-search iteration cap.
pub const DEFAULT_MAX_ITERATIONS: usize = 96;

/// Inside test tolerance on barycentric weights.
pub const DEFAULT_BOUNDARY_TOLERANCE: f64 = 1e-6;

/// Where velocities are sampled during the foot search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FootQuadrature {
    /// At the characteristic midpoint `x - α/2` (second order).
    #[default]
    Midpoint,
    /// At the current foot estimate `x - α`.
    Endpoint,
}

/// Reaction to a mesh walk that reaches its step cap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WalkFailurePolicy {
    /// Clamp into the last element visited and count the event.
    #[default]
    Degrade,
    /// Fail the step with `WalkNonConvergence`.
    Abort,
}

/// Parameters of a single point location.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LocateOptions {
    /// A point is inside when every barycentric weight is `>= -tolerance`.
    pub tolerance: f64,
    /// Maximum number of elements visited.
    pub max_steps: usize,
}

impl Default for LocateOptions {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_BOUNDARY_TOLERANCE,
            max_steps: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// How many relaxation sweeps the antidiffusion pass runs.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SweepMode {
    /// Exactly this many sweeps.
    Fixed(usize),
    /// Sweep until the largest residual is below `tolerance`.
    Converge { tolerance: f64, max_sweeps: usize },
}

impl Default for SweepMode {
    fn default() -> Self {
        SweepMode::Fixed(10)
    }
}

/// Antidiffusion settings.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AntidiffusionConfig {
    /// Fraction of each residual fed back per sweep.
    pub relaxation: f64,
    pub mode: SweepMode,
}

impl Default for AntidiffusionConfig {
    fn default() -> Self {
        Self {
            relaxation: 0.667,
            mode: SweepMode::default(),
        }
    }
}

impl AntidiffusionConfig {
    pub fn with_relaxation(mut self, relaxation: f64) -> Self {
        self.relaxation = relaxation;
        self
    }

    pub fn with_mode(mut self, mode: SweepMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.relaxation > 0.0 && self.relaxation <= 1.0) {
            return Err(CharacteristicsError::InvalidConfig(format!(
                "relaxation must be in (0, 1], got {}",
                self.relaxation
            )));
        }
        if let SweepMode::Converge { tolerance, .. } = self.mode
            && !(tolerance > 0.0)
        {
            return Err(CharacteristicsError::InvalidConfig(format!(
                "sweep tolerance must be positive, got {tolerance}"
            )));
        }
        Ok(())
    }
}

/// Configuration of the characteristic tracer.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CharacteristicsConfig {
    /// Foot convergence tolerance; `None` uses the mesh's dimension default.
    pub foot_tolerance: Option<f64>,
    /// Cap for both the foot iteration and each mesh walk.
    pub max_iterations: usize,
    /// Barycentric inside tolerance ε.
    pub boundary_tolerance: f64,
    pub foot_quadrature: FootQuadrature,
    /// Clamp interpolated values to the corner-node range.
    pub clamp_to_corners: bool,
    pub walk_failure: WalkFailurePolicy,
    /// Number of equal substeps per call.
    pub substeps: usize,
    /// Run an antidiffusion pass after sampling.
    pub antidiffusion: Option<AntidiffusionConfig>,
}

impl Default for CharacteristicsConfig {
    fn default() -> Self {
        Self {
            foot_tolerance: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            boundary_tolerance: DEFAULT_BOUNDARY_TOLERANCE,
            foot_quadrature: FootQuadrature::default(),
            clamp_to_corners: true,
            walk_failure: WalkFailurePolicy::default(),
            substeps: 1,
            antidiffusion: None,
        }
    }
}

impl CharacteristicsConfig {
    pub fn with_foot_tolerance(mut self, tolerance: f64) -> Self {
        self.foot_tolerance = Some(tolerance);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_boundary_tolerance(mut self, tolerance: f64) -> Self {
        self.boundary_tolerance = tolerance;
        self
    }

    pub fn with_foot_quadrature(mut self, quadrature: FootQuadrature) -> Self {
        self.foot_quadrature = quadrature;
        self
    }

    pub fn with_clamp_to_corners(mut self, clamp: bool) -> Self {
        self.clamp_to_corners = clamp;
        self
    }

    pub fn with_walk_failure(mut self, policy: WalkFailurePolicy) -> Self {
        self.walk_failure = policy;
        self
    }

    pub fn with_substeps(mut self, substeps: usize) -> Self {
        self.substeps = substeps;
        self
    }

    pub fn with_antidiffusion(mut self, antidiffusion: AntidiffusionConfig) -> Self {
        self.antidiffusion = Some(antidiffusion);
        self
    }

    /// Options for each mesh walk.
    pub fn locate_options(&self) -> LocateOptions {
        LocateOptions {
            tolerance: self.boundary_tolerance,
            max_steps: self.max_iterations,
        }
    }

    /// Foot tolerance, falling back to `default` when unset.
    pub fn foot_tolerance_or(&self, default: f64) -> f64 {
        self.foot_tolerance.unwrap_or(default)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(tol) = self.foot_tolerance
            && !(tol > 0.0 && tol.is_finite())
        {
            return Err(CharacteristicsError::InvalidConfig(format!(
                "foot tolerance must be positive, got {tol}"
            )));
        }
        if self.max_iterations == 0 {
            return Err(CharacteristicsError::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if !(self.boundary_tolerance >= 0.0 && self.boundary_tolerance.is_finite()) {
            return Err(CharacteristicsError::InvalidConfig(format!(
                "boundary tolerance must be non-negative, got {}",
                self.boundary_tolerance
            )));
        }
        if self.substeps == 0 {
            return Err(CharacteristicsError::InvalidConfig(
                "substeps must be at least 1".to_string(),
            ));
        }
        if let Some(antidiffusion) = &self.antidiffusion {
            antidiffusion.validate()?;
        }
        Ok(())
    }
}

//! The ARAP local/global iteration.

use nalgebra::{Matrix3, Point3};

use super::analysis::MeshAnalysis;
use super::constraints::ConstraintSet;
use super::position::{global_step, GlobalSolver, LinearSolver};
use super::rotation::local_step;
use crate::algo::progress::{CancelToken, Progress};
use crate::error::{MeshError, Result};
use crate::mesh::TriMesh;

/// Options for ARAP deformation.
#[derive(Debug, Clone)]
pub struct DeformOptions {
    /// Number of local/global iterations. Always run in full; there is no
    /// convergence test.
    pub iterations: usize,

    /// Whether to fit rotations in parallel (default: true).
    pub parallel: bool,

    /// How the global linear system is solved.
    pub solver: LinearSolver,

    /// Checked between iterations; a cancelled run returns
    /// [`MeshError::Cancelled`].
    pub cancel: Option<CancelToken>,
}

impl Default for DeformOptions {
    fn default() -> Self {
        Self {
            iterations: 5,
            parallel: true,
            solver: LinearSolver::Direct,
            cancel: None,
        }
    }
}

impl DeformOptions {
    /// Create options with the specified number of iterations.
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set whether to use parallel execution.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Create options for single-threaded execution.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Set the linear solver.
    pub fn with_solver(mut self, solver: LinearSolver) -> Self {
        self.solver = solver;
        self
    }

    /// Attach a cancellation token.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(MeshError::invalid_param(
                "iterations",
                self.iterations,
                "must be at least 1",
            ));
        }
        if let LinearSolver::ConjugateGradient {
            max_iterations,
            tolerance,
        } = self.solver
        {
            if max_iterations == 0 {
                return Err(MeshError::invalid_param(
                    "max_iterations",
                    max_iterations,
                    "must be at least 1",
                ));
            }
            if tolerance.is_nan() || tolerance <= 0.0 {
                return Err(MeshError::invalid_param("tolerance", tolerance, "must be positive"));
            }
        }
        Ok(())
    }
}

/// Result of a deformation with diagnostics.
#[derive(Debug, Clone)]
pub struct Deformation {
    /// Deformed vertex positions, indexed like the rest pose.
    pub positions: Vec<Point3<f64>>,

    /// ARAP energy after each iteration (empty when nothing was pinned).
    pub energies: Vec<f64>,

    /// Number of iterations that ran.
    pub iterations: usize,
}

/// A mesh prepared for repeated ARAP deformation.
///
/// Construction runs the mesh analysis once; every call to
/// [`deform`](Self::deform) starts again from the rest pose, so calls are
/// independent of each other.
///
/// # Example
///
/// ```
/// use pliant::algo::deform::{ArapDeformer, ConstraintSet, DeformOptions};
/// use pliant::mesh::TriMesh;
/// use nalgebra::Point3;
///
/// let mesh = TriMesh::new(
///     vec![
///         Point3::new(0.0, 0.0, 0.0),
///         Point3::new(1.0, 0.0, 0.0),
///         Point3::new(1.0, 1.0, 0.0),
///         Point3::new(0.0, 1.0, 0.0),
///     ],
///     vec![[0, 1, 2], [0, 2, 3]],
/// ).unwrap();
/// let deformer = ArapDeformer::new(mesh);
///
/// let mut constraints = ConstraintSet::new();
/// constraints.set(0, Point3::new(0.0, 0.0, 0.0));
/// constraints.set(2, Point3::new(2.0, 1.0, 0.0));
///
/// let positions = deformer.deform(&constraints, &DeformOptions::default()).unwrap();
/// assert!((positions[2] - Point3::new(2.0, 1.0, 0.0)).norm() < 1e-9);
/// ```
#[derive(Debug, Clone)]
pub struct ArapDeformer {
    mesh: TriMesh,
    analysis: MeshAnalysis,
}

impl ArapDeformer {
    /// Analyze `mesh` and cache the result.
    pub fn new(mesh: TriMesh) -> Self {
        let analysis = MeshAnalysis::new(&mesh);
        Self { mesh, analysis }
    }

    /// The rest-pose mesh.
    #[inline]
    pub fn mesh(&self) -> &TriMesh {
        &self.mesh
    }

    /// The cached analysis.
    #[inline]
    pub fn analysis(&self) -> &MeshAnalysis {
        &self.analysis
    }

    /// Deform the mesh so pinned vertices reach their targets.
    ///
    /// An empty constraint set returns the rest pose without iterating or
    /// checking `options`.
    pub fn deform(
        &self,
        constraints: &ConstraintSet,
        options: &DeformOptions,
    ) -> Result<Vec<Point3<f64>>> {
        self.run(constraints, options, &Progress::none(), false)
            .map(|d| d.positions)
    }

    /// Deform with per-iteration progress reports and energy tracking.
    pub fn deform_with_progress(
        &self,
        constraints: &ConstraintSet,
        options: &DeformOptions,
        progress: &Progress,
    ) -> Result<Deformation> {
        self.run(constraints, options, progress, true)
    }

    fn run(
        &self,
        constraints: &ConstraintSet,
        options: &DeformOptions,
        progress: &Progress,
        track_energy: bool,
    ) -> Result<Deformation> {
        let rest = self.mesh.positions();

        if constraints.is_empty() {
            return Ok(Deformation {
                positions: rest.to_vec(),
                energies: Vec::new(),
                iterations: 0,
            });
        }
        options.validate()?;
        constraints.validate(self.mesh.num_vertices())?;

        let solver = GlobalSolver::new(&self.analysis, constraints.to_pins(), options.solver)?;
        log::debug!(
            "deforming {} vertices with {} pins over {} iterations",
            rest.len(),
            solver.num_pinned(),
            options.iterations
        );

        let total = options.iterations;
        let mut positions = rest.to_vec();
        let mut energies = Vec::with_capacity(if track_energy { total } else { 0 });

        for iteration in 0..total {
            if let Some(token) = &options.cancel {
                if token.is_cancelled() {
                    log::debug!("deformation cancelled after {} iterations", iteration);
                    return Err(MeshError::Cancelled {
                        completed: iteration,
                    });
                }
            }

            let rotations = local_step(&self.analysis, rest, &positions, options.parallel);
            positions = global_step(&self.analysis, rest, &rotations, &solver)?;

            if track_energy {
                let energy = arap_energy(&self.analysis, rest, &positions, &rotations);
                log::trace!("iteration {}: energy {:.6e}", iteration + 1, energy);
                energies.push(energy);
            }
            progress.report(iteration + 1, total, "ARAP iteration");
        }

        Ok(Deformation {
            positions,
            energies,
            iterations: total,
        })
    }
}

/// ARAP energy `sum_i sum_j w_ij |(p'_i - p'_j) - R_i (p_i - p_j)|^2`.
pub fn arap_energy(
    analysis: &MeshAnalysis,
    rest: &[Point3<f64>],
    deformed: &[Point3<f64>],
    rotations: &[Matrix3<f64>],
) -> f64 {
    (0..analysis.num_vertices())
        .map(|i| {
            analysis
                .neighbors(i)
                .iter()
                .zip(analysis.neighbor_weights(i))
                .map(|(&j, &w)| {
                    let residual = (deformed[i] - deformed[j]) - rotations[i] * (rest[i] - rest[j]);
                    w * residual.norm_squared()
                })
                .sum::<f64>()
        })
        .sum()
}

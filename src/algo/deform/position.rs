//! Global step: solving for vertex positions under fixed rotations.
//!
//! Pinned vertices enter through an augmented system
//!
//! ```text
//! [ L   Cᵀ ] [ X ]   [ B ]
//! [ C   0  ] [ λ ] = [ T ]
//! ```
//!
//! where `C` selects the pinned vertices and `T` holds their targets. The
//! matrix depends only on the Laplacian and which vertices are pinned, so a
//! [`GlobalSolver`] is built once per deformation and reused by every
//! iteration; only the right-hand side changes.

use nalgebra::linalg::LU;
use nalgebra::{DMatrix, DVector, Dyn, Matrix3, Point3, Vector3};

use super::analysis::MeshAnalysis;
use crate::algo::sparse::{conjugate_gradient, CsrMatrix};
use crate::error::{MeshError, Result};

/// Pivots smaller than this fraction of the largest pivot mark a singular system.
const SINGULAR_PIVOT_RATIO: f64 = 1e-12;

/// How the global linear system is solved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LinearSolver {
    /// Dense LU factorization of the augmented system.
    ///
    /// Exact and robust; cost grows cubically with the vertex count.
    Direct,

    /// Conjugate gradient on the Laplacian block of the free vertices.
    ///
    /// The constraint rows fix pinned positions exactly, so they are
    /// eliminated before iterating. Suited to large meshes with positive
    /// cotangent weights.
    ConjugateGradient {
        /// Maximum CG iterations per coordinate solve.
        max_iterations: usize,
        /// Relative residual tolerance.
        tolerance: f64,
    },
}

impl Default for LinearSolver {
    fn default() -> Self {
        LinearSolver::Direct
    }
}

impl LinearSolver {
    /// Conjugate gradient with default limits.
    pub fn conjugate_gradient() -> Self {
        LinearSolver::ConjugateGradient {
            max_iterations: 2000,
            tolerance: 1e-10,
        }
    }
}

/// Build the augmented `(V + k) x (V + k)` system matrix.
///
/// The top-left block is `L`; constraint `m` pinning vertex `v` sets
/// `A(V + m, v) = A(v, V + m) = 1`.
pub fn augmented_matrix(laplacian: &CsrMatrix, pinned: &[usize]) -> CsrMatrix {
    let n = laplacian.nrows();
    let size = n + pinned.len();
    let mut triplets: Vec<(usize, usize, f64)> = Vec::with_capacity(laplacian.nnz() + 2 * pinned.len());

    for i in 0..n {
        triplets.extend(laplacian.row(i).map(|(j, v)| (i, j, v)));
    }
    for (m, &v) in pinned.iter().enumerate() {
        triplets.push((n + m, v, 1.0));
        triplets.push((v, n + m, 1.0));
    }

    CsrMatrix::from_triplets(size, size, triplets)
}

/// Right-hand side rows for the mesh vertices:
/// `b_i = 0.5 * sum_j w_ij (R_i + R_j)(p_i - p_j)`.
pub fn rotation_rhs(
    analysis: &MeshAnalysis,
    rest: &[Point3<f64>],
    rotations: &[Matrix3<f64>],
) -> Vec<Vector3<f64>> {
    (0..analysis.num_vertices())
        .map(|i| {
            let mut b = Vector3::zeros();
            for (&j, &w) in analysis.neighbors(i).iter().zip(analysis.neighbor_weights(i)) {
                b += (0.5 * w) * ((rotations[i] + rotations[j]) * (rest[i] - rest[j]));
            }
            b
        })
        .collect()
}

enum Factorization {
    Dense(LU<f64, Dyn, Dyn>),
    Reduced {
        /// Laplacian restricted to free vertices.
        matrix: CsrMatrix,
        /// Per free vertex, the coupling `sum_c L(f, c) t_c` to pinned targets.
        pinned_coupling: Vec<Vector3<f64>>,
        /// Global index of each free vertex.
        free: Vec<usize>,
        max_iterations: usize,
        tolerance: f64,
    },
}

/// A prepared global-step solver for one constraint configuration.
pub struct GlobalSolver {
    num_vertices: usize,
    pinned: Vec<(usize, Point3<f64>)>,
    factorization: Factorization,
}

impl std::fmt::Debug for GlobalSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalSolver")
            .field("num_vertices", &self.num_vertices)
            .field("pinned", &self.pinned.len())
            .finish_non_exhaustive()
    }
}

impl GlobalSolver {
    /// Prepare the solver for the given pins.
    ///
    /// `pinned` must be sorted by vertex with unique, in-range vertices (as a
    /// [`ConstraintSet`](super::ConstraintSet) yields them). Fails with
    /// [`MeshError::SingularSystem`] when a connected component carries no
    /// pin, since its position is then undetermined.
    pub fn new(
        analysis: &MeshAnalysis,
        pinned: Vec<(usize, Point3<f64>)>,
        strategy: LinearSolver,
    ) -> Result<Self> {
        let n = analysis.num_vertices();
        check_every_component_pinned(analysis, &pinned)?;

        let factorization = match strategy {
            LinearSolver::Direct => {
                let vertices: Vec<usize> = pinned.iter().map(|&(v, _)| v).collect();
                let augmented = augmented_matrix(analysis.laplacian(), &vertices);
                let lu = augmented.to_dense().lu();
                check_pivots(&lu)?;
                Factorization::Dense(lu)
            }
            LinearSolver::ConjugateGradient {
                max_iterations,
                tolerance,
            } => reduce(analysis, &pinned, max_iterations, tolerance)?,
        };

        Ok(Self {
            num_vertices: n,
            pinned,
            factorization,
        })
    }

    /// Number of pinned vertices.
    pub fn num_pinned(&self) -> usize {
        self.pinned.len()
    }

    /// Solve `A X = B` for the new vertex positions.
    ///
    /// `rhs` holds the first `V` rows of `B`; the constraint rows are the
    /// pinned targets. Returns the first `V` rows of `X`.
    pub fn solve(&self, rhs: &[Vector3<f64>]) -> Result<Vec<Point3<f64>>> {
        debug_assert_eq!(rhs.len(), self.num_vertices);
        let n = self.num_vertices;

        let positions = match &self.factorization {
            Factorization::Dense(lu) => {
                let size = n + self.pinned.len();
                let mut b = DMatrix::<f64>::zeros(size, 3);
                for (i, row) in rhs.iter().enumerate() {
                    b.row_mut(i).copy_from(&row.transpose());
                }
                for (m, (_, target)) in self.pinned.iter().enumerate() {
                    b.row_mut(n + m).copy_from(&target.coords.transpose());
                }

                let x = lu
                    .solve(&b)
                    .ok_or_else(|| MeshError::singular("augmented system is not invertible"))?;
                (0..n)
                    .map(|i| Point3::new(x[(i, 0)], x[(i, 1)], x[(i, 2)]))
                    .collect::<Vec<_>>()
            }
            Factorization::Reduced {
                matrix,
                pinned_coupling,
                free,
                max_iterations,
                tolerance,
            } => {
                let mut positions = vec![Point3::origin(); n];
                for &(v, target) in &self.pinned {
                    positions[v] = target;
                }
                for axis in 0..3 {
                    let b = DVector::from_iterator(
                        free.len(),
                        free.iter()
                            .zip(pinned_coupling)
                            .map(|(&f, coupling)| rhs[f][axis] - coupling[axis]),
                    );
                    let x = conjugate_gradient(matrix, &b, None, *max_iterations, *tolerance)?;
                    for (k, &f) in free.iter().enumerate() {
                        positions[f][axis] = x[k];
                    }
                }
                positions
            }
        };

        if let Some(bad) = positions.iter().position(|p| !p.coords.iter().all(|c| c.is_finite())) {
            log::warn!("global step produced a non-finite position at vertex {}", bad);
            return Err(MeshError::singular(format!(
                "solution is not finite at vertex {}",
                bad
            )));
        }

        Ok(positions)
    }
}

/// Run one global step: assemble the right-hand side and solve.
pub fn global_step(
    analysis: &MeshAnalysis,
    rest: &[Point3<f64>],
    rotations: &[Matrix3<f64>],
    solver: &GlobalSolver,
) -> Result<Vec<Point3<f64>>> {
    solver.solve(&rotation_rhs(analysis, rest, rotations))
}

fn check_every_component_pinned(
    analysis: &MeshAnalysis,
    pinned: &[(usize, Point3<f64>)],
) -> Result<()> {
    let (count, labels) = analysis.connected_components();
    let mut has_pin = vec![false; count];
    for &(v, _) in pinned {
        has_pin[labels[v]] = true;
    }

    match has_pin.iter().position(|&p| !p) {
        Some(component) => {
            let first = labels.iter().position(|&l| l == component).unwrap_or(0);
            log::warn!(
                "component {} of {} (containing vertex {}) has no constraint",
                component,
                count,
                first
            );
            Err(MeshError::singular(format!(
                "connected component containing vertex {} has no constraint",
                first
            )))
        }
        None => Ok(()),
    }
}

fn check_pivots(lu: &LU<f64, Dyn, Dyn>) -> Result<()> {
    let u = lu.u();
    let pivots = u.diagonal().map(f64::abs);
    let largest = pivots.max();
    let smallest = pivots.min();

    if smallest.is_nan() || smallest <= SINGULAR_PIVOT_RATIO * largest {
        return Err(MeshError::singular(format!(
            "pivot {:.3e} is negligible against {:.3e}",
            smallest, largest
        )));
    }
    Ok(())
}

/// Eliminate the pinned unknowns: `L_ff x_f = b_f - L_fc t`.
fn reduce(
    analysis: &MeshAnalysis,
    pinned: &[(usize, Point3<f64>)],
    max_iterations: usize,
    tolerance: f64,
) -> Result<Factorization> {
    let n = analysis.num_vertices();
    let mut target: Vec<Option<Point3<f64>>> = vec![None; n];
    for &(v, t) in pinned {
        target[v] = Some(t);
    }

    let free: Vec<usize> = (0..n).filter(|&v| target[v].is_none()).collect();
    let mut reduced_index = vec![usize::MAX; n];
    for (k, &f) in free.iter().enumerate() {
        reduced_index[f] = k;
    }

    let laplacian = analysis.laplacian();
    let largest = (0..n)
        .map(|i| laplacian.get(i, i).abs())
        .fold(0.0_f64, f64::max);
    if let Some(&bad) = free
        .iter()
        .find(|&&f| {
            let diagonal = laplacian.get(f, f);
            diagonal.is_nan() || diagonal <= SINGULAR_PIVOT_RATIO * largest
        })
    {
        log::warn!("free vertex {} has no usable cotangent weight", bad);
        return Err(MeshError::singular(format!(
            "diagonal {:.3e} at free vertex {} is negligible against {:.3e}",
            laplacian.get(bad, bad),
            bad,
            largest
        )));
    }

    let mut triplets = Vec::new();
    let mut pinned_coupling = Vec::with_capacity(free.len());
    for (k, &f) in free.iter().enumerate() {
        let mut coupling = Vector3::zeros();
        for (j, value) in laplacian.row(f) {
            match target[j] {
                Some(t) => coupling += value * t.coords,
                None => triplets.push((k, reduced_index[j], value)),
            }
        }
        pinned_coupling.push(coupling);
    }

    Ok(Factorization::Reduced {
        matrix: CsrMatrix::from_triplets(free.len(), free.len(), triplets),
        pinned_coupling,
        free,
        max_iterations,
        tolerance,
    })
}

//! Local step: per-vertex best-fit rotations.
//!
//! For every vertex the rotation that best maps its rest-pose 1-ring edges
//! onto the current deformed edges is found by SVD of the weighted edge
//! covariance (the orthogonal Procrustes problem).

use nalgebra::{Matrix3, Point3};
use rayon::prelude::*;

use super::analysis::MeshAnalysis;

/// Fit one rotation per vertex.
///
/// `rest` and `deformed` are indexed by vertex. Each vertex is independent,
/// so with `parallel` the work is spread over the rayon pool; the result is
/// identical either way.
pub fn local_step(
    analysis: &MeshAnalysis,
    rest: &[Point3<f64>],
    deformed: &[Point3<f64>],
    parallel: bool,
) -> Vec<Matrix3<f64>> {
    let n = analysis.num_vertices();
    debug_assert_eq!(rest.len(), n);
    debug_assert_eq!(deformed.len(), n);

    let fit = |i: usize| best_fit_rotation(&edge_covariance(analysis, rest, deformed, i));

    if parallel {
        (0..n).into_par_iter().map(fit).collect()
    } else {
        (0..n).map(fit).collect()
    }
}

/// Weighted covariance `S_i = sum_j w_ij (p_i - p_j)(p'_i - p'_j)^T`.
pub fn edge_covariance(
    analysis: &MeshAnalysis,
    rest: &[Point3<f64>],
    deformed: &[Point3<f64>],
    vertex: usize,
) -> Matrix3<f64> {
    let neighbors = analysis.neighbors(vertex);
    let weights = analysis.neighbor_weights(vertex);

    let mut s = Matrix3::zeros();
    for (&j, &w) in neighbors.iter().zip(weights) {
        let e = rest[vertex] - rest[j];
        let e_prime = deformed[vertex] - deformed[j];
        s += w * e * e_prime.transpose();
    }
    s
}

/// The proper rotation closest to mapping the covariance's rest frame onto
/// its deformed frame.
///
/// With `S = U Σ Vᵀ` the candidate is `R = V Uᵀ`. A reflection (`det R < 0`)
/// is turned into a rotation by negating the column of `U` that belongs to
/// the smallest singular value.
pub fn best_fit_rotation(covariance: &Matrix3<f64>) -> Matrix3<f64> {
    let svd = covariance.svd(true, true);
    let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
        return Matrix3::identity();
    };

    let r = v_t.transpose() * u.transpose();
    if r.determinant() >= 0.0 {
        return r;
    }

    let smallest = svd.singular_values.imin();
    let mut u_fixed = u;
    u_fixed.column_mut(smallest).neg_mut();
    v_t.transpose() * u_fixed.transpose()
}

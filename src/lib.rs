//! # Pliant
//!
//! As-rigid-as-possible (ARAP) deformation of triangle meshes.
//!
//! A caller pins some vertices to target positions; pliant moves the rest of
//! the mesh so that every vertex neighborhood stays as close to a rigid
//! motion of its rest shape as possible. Rest-pose analysis (adjacency,
//! cotangent weights, the cotangent Laplacian) is computed once per mesh and
//! reused by every deformation.
//!
//! ## Features
//!
//! - **Cotangent-weighted ARAP**: alternating SVD rotation fitting and a
//!   constrained Laplacian solve
//! - **Two linear solvers**: dense LU of the augmented system, or conjugate
//!   gradient on the free vertices
//! - **Parallel local step**: per-vertex rotations are fitted with rayon
//! - **Handle registry**: load meshes once, edit pins, deform on demand
//! - **OFF file I/O**
//!
//! ## Quick Start
//!
//! ```
//! use pliant::prelude::*;
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(1.0, 1.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//! ];
//! let faces = vec![[0, 1, 2], [0, 2, 3]];
//!
//! let deformer = ArapDeformer::new(TriMesh::new(vertices, faces).unwrap());
//!
//! let mut constraints = ConstraintSet::new();
//! constraints.set(0, Point3::new(0.0, 0.0, 0.0));
//! constraints.set(2, Point3::new(2.0, 1.0, 0.0));
//!
//! let options = DeformOptions::default().with_iterations(5);
//! let positions = deformer.deform(&constraints, &options).unwrap();
//! assert!((positions[2] - Point3::new(2.0, 1.0, 0.0)).norm() < 1e-9);
//! ```
//!
//! ## Working Through Handles
//!
//! ```
//! use pliant::prelude::*;
//! use nalgebra::Point3;
//!
//! let mut registry = MeshRegistry::new();
//! let handle = registry
//!     .load_mesh(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0], &[0, 1, 2])
//!     .unwrap();
//!
//! // No pins: the rest pose comes back unchanged.
//! assert_eq!(registry.deform_flat(handle).unwrap()[3], 1.0);
//!
//! registry.unload_mesh(handle).unwrap();
//! assert!(registry.deform(handle).is_err());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod error;
pub mod io;
pub mod mesh;
pub mod registry;

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and functions:
///
/// ```
/// use pliant::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::deform::{
        ArapDeformer, ConstraintSet, DeformOptions, Deformation, LinearSolver, MeshAnalysis,
    };
    pub use crate::algo::{CancelToken, Progress};
    pub use crate::error::{MeshError, Result};
    pub use crate::mesh::TriMesh;
    pub use crate::registry::{MeshHandle, MeshRegistry};
}

// Re-export nalgebra types for convenience
pub use nalgebra;

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use nalgebra::Point3;

    #[test]
    fn test_tetrahedron() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, 0.5, 1.0),
        ];

        let faces = vec![
            [0, 2, 1], // bottom
            [0, 1, 3], // front
            [1, 2, 3], // right
            [2, 0, 3], // left
        ];

        let deformer = ArapDeformer::new(TriMesh::new(vertices, faces).unwrap());
        let analysis = deformer.analysis();

        assert_eq!(deformer.mesh().num_vertices(), 4);
        assert_eq!(analysis.num_edges(), 6);
        // Closed mesh: every edge has two incident faces
        assert!(analysis.boundary_edges().is_empty());
        assert_eq!(analysis.connected_components().0, 1);
        for v in 0..4 {
            assert_eq!(analysis.neighbors(v).len(), 3);
        }
    }
}

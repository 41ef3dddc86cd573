//! As-rigid-as-possible (ARAP) surface deformation.
//!
//! Pinned vertices are moved to target positions and the rest of the mesh
//! follows while keeping each vertex's 1-ring as close to a rigid motion of
//! its rest shape as possible. The solver alternates two steps:
//!
//! - **Local**: fit a best rotation per vertex by SVD ([`local_step`])
//! - **Global**: solve a Laplacian system for positions with the rotations
//!   fixed and the pins enforced as hard constraints ([`global_step`])
//!
//! The mesh analysis ([`MeshAnalysis`]) depends only on the rest pose and is
//! computed once by [`ArapDeformer::new`].
//!
//! # Example
//!
//! ```
//! use pliant::algo::deform::{ArapDeformer, ConstraintSet, DeformOptions};
//! use pliant::mesh::TriMesh;
//! use nalgebra::{Point3, Vector3};
//!
//! let mesh = TriMesh::new(
//!     vec![
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(1.0, 0.0, 0.0),
//!         Point3::new(0.5, 1.0, 0.0),
//!         Point3::new(0.5, 0.5, 1.0),
//!     ],
//!     vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]],
//! ).unwrap();
//! let deformer = ArapDeformer::new(mesh);
//!
//! // Translate the whole tetrahedron by pinning two vertices.
//! let shift = Vector3::new(0.0, 0.0, 2.0);
//! let mut constraints = ConstraintSet::new();
//! constraints.set(0, Point3::new(0.0, 0.0, 0.0) + shift);
//! constraints.set(3, Point3::new(0.5, 0.5, 1.0) + shift);
//!
//! let positions = deformer.deform(&constraints, &DeformOptions::default()).unwrap();
//! assert!((positions[1] - Point3::new(1.0, 0.0, 2.0)).norm() < 1e-9);
//! ```
//!
//! # References
//!
//! - Sorkine, O. & Alexa, M. (2007). "As-rigid-as-possible surface
//!   modeling." Symposium on Geometry Processing.

mod analysis;
mod constraints;
mod engine;
mod position;
mod rotation;

pub use analysis::{build_adjacency, cotangent_laplacian, MeshAnalysis};
pub use constraints::ConstraintSet;
pub use engine::{arap_energy, ArapDeformer, DeformOptions, Deformation};
pub use position::{augmented_matrix, global_step, rotation_rhs, GlobalSolver, LinearSolver};
pub use rotation::{best_fit_rotation, edge_covariance, local_step};

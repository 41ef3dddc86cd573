//! Core mesh data structures.
//!
//! The deformation engine works on [`TriMesh`], an indexed triangle mesh that
//! is validated once at construction and immutable afterwards. Its vertex
//! positions are the rest pose every deformation starts from.
//!
//! # Construction
//!
//! ```
//! use pliant::mesh::TriMesh;
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
//! let mesh = TriMesh::new(vertices, faces).unwrap();
//! assert_eq!(mesh.num_faces(), 2);
//! ```

mod trimesh;

pub use trimesh::{canonical_edge, flatten_points, TriMesh};

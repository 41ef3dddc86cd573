//! Indexed triangle mesh.

use std::collections::HashMap;

use nalgebra::Point3;

use crate::error::{MeshError, Result};

/// An immutable, validated triangle mesh in its rest pose.
///
/// Construction checks every face index against the vertex count, rejects
/// triangles that repeat a vertex, and rejects non-finite coordinates. Once
/// built, the topology and rest positions never change; deformation produces
/// new position arrays instead of mutating the mesh.
#[derive(Debug, Clone)]
pub struct TriMesh {
    positions: Vec<Point3<f64>>,
    faces: Vec<[usize; 3]>,
}

impl TriMesh {
    /// Build a mesh from rest positions and triangle indices.
    ///
    /// # Example
    /// ```
    /// use pliant::mesh::TriMesh;
    /// use nalgebra::Point3;
    ///
    /// let vertices = vec![
    ///     Point3::new(0.0, 0.0, 0.0),
    ///     Point3::new(1.0, 0.0, 0.0),
    ///     Point3::new(0.5, 1.0, 0.0),
    /// ];
    /// let mesh = TriMesh::new(vertices, vec![[0, 1, 2]]).unwrap();
    /// assert_eq!(mesh.num_vertices(), 3);
    /// assert_eq!(mesh.num_faces(), 1);
    /// ```
    pub fn new(positions: Vec<Point3<f64>>, faces: Vec<[usize; 3]>) -> Result<Self> {
        if positions.is_empty() || faces.is_empty() {
            return Err(MeshError::EmptyMesh);
        }

        for (vi, p) in positions.iter().enumerate() {
            if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
                return Err(MeshError::NonFinitePosition { vertex: vi });
            }
        }

        for (fi, face) in faces.iter().enumerate() {
            for &vi in face {
                if vi >= positions.len() {
                    return Err(MeshError::InvalidVertexIndex {
                        face: fi,
                        vertex: vi,
                        num_vertices: positions.len(),
                    });
                }
            }
            if face[0] == face[1] || face[1] == face[2] || face[0] == face[2] {
                return Err(MeshError::DegenerateFace { face: fi });
            }
        }

        Ok(Self { positions, faces })
    }

    /// Build a mesh from flat arrays: `x y z` per vertex and `a b c` per face.
    ///
    /// This is the layout rendering layers usually hand over (position
    /// attribute plus index buffer).
    ///
    /// # Example
    /// ```
    /// use pliant::mesh::TriMesh;
    ///
    /// let coords = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
    /// let mesh = TriMesh::from_flat(&coords, &[0, 1, 2]).unwrap();
    /// assert_eq!(mesh.num_vertices(), 3);
    /// ```
    pub fn from_flat(coords: &[f64], indices: &[usize]) -> Result<Self> {
        if coords.len() % 3 != 0 {
            return Err(MeshError::LengthMismatch {
                what: "vertex coordinate",
                len: coords.len(),
            });
        }
        if indices.len() % 3 != 0 {
            return Err(MeshError::LengthMismatch {
                what: "face index",
                len: indices.len(),
            });
        }

        let positions = coords
            .chunks_exact(3)
            .map(|c| Point3::new(c[0], c[1], c[2]))
            .collect();
        let faces = indices
            .chunks_exact(3)
            .map(|f| [f[0], f[1], f[2]])
            .collect();

        Self::new(positions, faces)
    }

    /// Number of vertices.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.positions.len()
    }

    /// Number of triangles.
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Rest-pose positions.
    #[inline]
    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    /// Rest-pose position of one vertex.
    #[inline]
    pub fn position(&self, vertex: usize) -> &Point3<f64> {
        &self.positions[vertex]
    }

    /// Triangle index triples.
    #[inline]
    pub fn faces(&self) -> &[[usize; 3]] {
        &self.faces
    }

    /// Rest positions flattened to `x y z` triples.
    pub fn flat_positions(&self) -> Vec<f64> {
        flatten_points(&self.positions)
    }

    /// Area of a triangle in the rest pose.
    pub fn face_area(&self, face: usize) -> f64 {
        let [a, b, c] = self.faces[face];
        let p0 = &self.positions[a];
        let p1 = &self.positions[b];
        let p2 = &self.positions[c];
        0.5 * (p1 - p0).cross(&(p2 - p0)).norm()
    }

    /// Number of triangles incident to each undirected edge, keyed `(min, max)`.
    pub fn edge_face_counts(&self) -> HashMap<(usize, usize), usize> {
        let mut counts: HashMap<(usize, usize), usize> = HashMap::new();
        for face in &self.faces {
            for i in 0..3 {
                let edge = canonical_edge(face[i], face[(i + 1) % 3]);
                *counts.entry(edge).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Axis-aligned bounding box of the rest pose.
    pub fn bounding_box(&self) -> (Point3<f64>, Point3<f64>) {
        let mut min = self.positions[0];
        let mut max = self.positions[0];
        for p in &self.positions[1..] {
            min = min.inf(p);
            max = max.sup(p);
        }
        (min, max)
    }
}

/// Get canonical edge representation (smaller index first).
#[inline]
pub fn canonical_edge(v0: usize, v1: usize) -> (usize, usize) {
    if v0 < v1 {
        (v0, v1)
    } else {
        (v1, v0)
    }
}

/// Flatten points into `x y z` triples.
pub fn flatten_points(points: &[Point3<f64>]) -> Vec<f64> {
    points.iter().flat_map(|p| [p.x, p.y, p.z]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tetrahedron() -> TriMesh {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, 0.5, 1.0),
        ];
        let faces = vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]];
        TriMesh::new(vertices, faces).unwrap()
    }

    #[test]
    fn test_rejects_out_of_range_index() {
        let vertices = vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)];
        let err = TriMesh::new(vertices, vec![[0, 1, 3]]).unwrap_err();
        match err {
            MeshError::InvalidVertexIndex { face, vertex, num_vertices } => {
                assert_eq!((face, vertex, num_vertices), (0, 3, 3));
            }
            e => panic!("Expected InvalidVertexIndex, got {:?}", e),
        }
        assert!(err_is_invalid_mesh(&[0.0; 9], &[0, 1, 5]));
    }

    fn err_is_invalid_mesh(coords: &[f64], indices: &[usize]) -> bool {
        TriMesh::from_flat(coords, indices)
            .map(|_| false)
            .unwrap_or_else(|e| e.is_invalid_mesh())
    }

    #[test]
    fn test_rejects_repeated_vertex() {
        let vertices = vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)];
        assert!(matches!(
            TriMesh::new(vertices, vec![[0, 1, 1]]),
            Err(MeshError::DegenerateFace { face: 0 })
        ));
    }

    #[test]
    fn test_rejects_empty_and_non_finite() {
        assert!(matches!(TriMesh::new(Vec::new(), Vec::new()), Err(MeshError::EmptyMesh)));

        let vertices = vec![Point3::origin(), Point3::new(f64::NAN, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)];
        assert!(matches!(
            TriMesh::new(vertices, vec![[0, 1, 2]]),
            Err(MeshError::NonFinitePosition { vertex: 1 })
        ));
    }

    #[test]
    fn test_from_flat_length_mismatch() {
        assert!(matches!(
            TriMesh::from_flat(&[0.0; 8], &[0, 1, 2]),
            Err(MeshError::LengthMismatch { len: 8, .. })
        ));
        assert!(matches!(
            TriMesh::from_flat(&[0.0; 9], &[0, 1]),
            Err(MeshError::LengthMismatch { len: 2, .. })
        ));
    }

    #[test]
    fn test_flat_round_trip() {
        let coords = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.5];
        let mesh = TriMesh::from_flat(&coords, &[0, 1, 2]).unwrap();
        assert_eq!(mesh.flat_positions(), coords.to_vec());
        assert_eq!(mesh.faces(), &[[0, 1, 2]]);
    }

    #[test]
    fn test_closed_mesh_edges() {
        let mesh = tetrahedron();
        let counts = mesh.edge_face_counts();
        assert_eq!(counts.len(), 6);
        assert!(counts.values().all(|&c| c == 2));

        let (min, max) = mesh.bounding_box();
        assert_eq!(min, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(max, Point3::new(1.0, 1.0, 1.0));
        assert!((mesh.face_area(0) - 0.5).abs() < 1e-12);
    }
}

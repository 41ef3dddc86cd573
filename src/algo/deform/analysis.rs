//! Mesh analysis: adjacency, cotangent weights and the cotangent Laplacian.
//!
//! Everything here depends only on the rest pose and topology, so it is
//! computed once when a mesh is loaded and shared by every deformation.

use std::collections::{BTreeMap, VecDeque};

use nalgebra::Point3;

use crate::algo::sparse::CsrMatrix;
use crate::mesh::{canonical_edge, TriMesh};

/// Below this `|u x v| / (|u| |v|)` an angle is treated as degenerate.
const DEGENERATE_SINE: f64 = 1e-12;

/// Per-edge data accumulated over incident triangles.
#[derive(Debug, Clone, Copy, Default)]
struct EdgeInfo {
    /// Cotangent weight `0.5 * sum cot(opposite angle)`.
    weight: f64,
    /// Number of triangles containing the edge.
    faces: usize,
}

/// Precomputed connectivity and weights of a rest-pose mesh.
///
/// Weights are stored once per undirected edge and read through the same
/// entry from both endpoints, so `weight(i, j) == weight(j, i)` holds exactly.
#[derive(Debug, Clone)]
pub struct MeshAnalysis {
    adjacency: Vec<Vec<usize>>,
    /// Aligned with `adjacency`: `neighbor_weights[i][k]` is `w(i, adjacency[i][k])`.
    neighbor_weights: Vec<Vec<f64>>,
    edges: BTreeMap<(usize, usize), EdgeInfo>,
    laplacian: CsrMatrix,
    degenerate_contributions: usize,
}

impl MeshAnalysis {
    /// Analyze a mesh.
    ///
    /// Zero-area corners contribute nothing to their edge's weight and are
    /// counted in [`degenerate_contributions`](Self::degenerate_contributions).
    ///
    /// # Example
    ///
    /// ```
    /// use pliant::algo::deform::MeshAnalysis;
    /// use pliant::mesh::TriMesh;
    /// use nalgebra::Point3;
    ///
    /// let mesh = TriMesh::new(
    ///     vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)],
    ///     vec![[0, 1, 2]],
    /// ).unwrap();
    /// let analysis = MeshAnalysis::new(&mesh);
    ///
    /// assert_eq!(analysis.neighbors(0), &[1, 2]);
    /// assert!((analysis.weight(1, 2).unwrap()).abs() < 1e-12); // right angle at vertex 0
    /// ```
    pub fn new(mesh: &TriMesh) -> Self {
        let n = mesh.num_vertices();
        let adjacency = build_adjacency(n, mesh.faces());
        let (edges, degenerate_contributions) = accumulate_edges(mesh.positions(), mesh.faces());

        let neighbor_weights: Vec<Vec<f64>> = adjacency
            .iter()
            .enumerate()
            .map(|(i, neighbors)| {
                neighbors
                    .iter()
                    .map(|&j| {
                        edges
                            .get(&canonical_edge(i, j))
                            .map(|e| e.weight)
                            .unwrap_or(0.0)
                    })
                    .collect()
            })
            .collect();

        let laplacian = cotangent_laplacian(&adjacency, &neighbor_weights);

        let boundary = edges.values().filter(|e| e.faces == 1).count();
        let non_manifold = edges.values().filter(|e| e.faces > 2).count();
        log::debug!(
            "analyzed mesh: {} vertices, {} faces, {} edges ({} boundary)",
            n,
            mesh.num_faces(),
            edges.len(),
            boundary
        );
        if degenerate_contributions > 0 {
            log::warn!(
                "{} degenerate triangle corners contributed zero cotangent weight",
                degenerate_contributions
            );
        }
        if non_manifold > 0 {
            log::warn!("{} edges are shared by more than two triangles", non_manifold);
        }

        Self {
            adjacency,
            neighbor_weights,
            edges,
            laplacian,
            degenerate_contributions,
        }
    }

    /// Number of vertices.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.adjacency.len()
    }

    /// Sorted 1-ring neighbors of a vertex.
    #[inline]
    pub fn neighbors(&self, vertex: usize) -> &[usize] {
        &self.adjacency[vertex]
    }

    /// Weights aligned with [`neighbors`](Self::neighbors).
    #[inline]
    pub fn neighbor_weights(&self, vertex: usize) -> &[f64] {
        &self.neighbor_weights[vertex]
    }

    /// Cotangent weight of edge `(i, j)`, if it is a mesh edge.
    pub fn weight(&self, i: usize, j: usize) -> Option<f64> {
        self.edges.get(&canonical_edge(i, j)).map(|e| e.weight)
    }

    /// Iterate undirected edges `(i, j)` with `i < j` and their weights.
    pub fn edges(&self) -> impl Iterator<Item = ((usize, usize), f64)> + '_ {
        self.edges.iter().map(|(&edge, info)| (edge, info.weight))
    }

    /// Number of undirected edges.
    #[inline]
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Edges with exactly one incident triangle.
    pub fn boundary_edges(&self) -> Vec<(usize, usize)> {
        self.edges
            .iter()
            .filter(|(_, info)| info.faces == 1)
            .map(|(&edge, _)| edge)
            .collect()
    }

    /// The cotangent Laplacian `L`.
    #[inline]
    pub fn laplacian(&self) -> &CsrMatrix {
        &self.laplacian
    }

    /// Number of triangle corners whose cotangent was clamped to zero.
    #[inline]
    pub fn degenerate_contributions(&self) -> usize {
        self.degenerate_contributions
    }

    /// Label each vertex with its connected component in the edge graph.
    ///
    /// Returns the number of components and a label per vertex. Labels are
    /// assigned in order of each component's smallest vertex.
    pub fn connected_components(&self) -> (usize, Vec<usize>) {
        let n = self.num_vertices();
        let mut labels = vec![usize::MAX; n];
        let mut count = 0;
        let mut queue = VecDeque::new();

        for start in 0..n {
            if labels[start] != usize::MAX {
                continue;
            }
            labels[start] = count;
            queue.push_back(start);
            while let Some(v) = queue.pop_front() {
                for &u in &self.adjacency[v] {
                    if labels[u] == usize::MAX {
                        labels[u] = count;
                        queue.push_back(u);
                    }
                }
            }
            count += 1;
        }

        (count, labels)
    }
}

/// Build sorted, deduplicated 1-ring neighbor lists.
///
/// Every vertex sharing a triangle with `v` is a neighbor of `v`. Vertices
/// referenced by no triangle get an empty list.
pub fn build_adjacency(num_vertices: usize, faces: &[[usize; 3]]) -> Vec<Vec<usize>> {
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); num_vertices];
    for &[a, b, c] in faces {
        adjacency[a].extend([b, c]);
        adjacency[b].extend([a, c]);
        adjacency[c].extend([a, b]);
    }
    for neighbors in &mut adjacency {
        neighbors.sort_unstable();
        neighbors.dedup();
    }
    adjacency
}

/// Assemble `L` with `L(i, j) = -w(i, j)` and `L(i, i) = sum_j w(i, j)`.
pub fn cotangent_laplacian(adjacency: &[Vec<usize>], neighbor_weights: &[Vec<f64>]) -> CsrMatrix {
    let n = adjacency.len();
    let nnz: usize = adjacency.iter().map(|a| a.len() + 1).sum();
    let mut triplets: Vec<(usize, usize, f64)> = Vec::with_capacity(nnz);

    for i in 0..n {
        let mut diagonal = 0.0;
        for (&j, &w) in adjacency[i].iter().zip(&neighbor_weights[i]) {
            triplets.push((i, j, -w));
            diagonal += w;
        }
        triplets.push((i, i, diagonal));
    }

    CsrMatrix::from_triplets(n, n, triplets)
}

/// Accumulate cotangent weights and incidence counts per undirected edge.
///
/// Returns the edge table and the number of degenerate corners.
fn accumulate_edges(
    positions: &[Point3<f64>],
    faces: &[[usize; 3]],
) -> (BTreeMap<(usize, usize), EdgeInfo>, usize) {
    let mut edges: BTreeMap<(usize, usize), EdgeInfo> = BTreeMap::new();
    let mut degenerate = 0;

    for face in faces {
        for k in 0..3 {
            let i = face[k];
            let j = face[(k + 1) % 3];
            let opposite = face[(k + 2) % 3];

            let entry = edges.entry(canonical_edge(i, j)).or_default();
            entry.faces += 1;
            match cotangent_angle(&positions[opposite], &positions[i], &positions[j]) {
                Some(cot) => entry.weight += 0.5 * cot,
                None => degenerate += 1,
            }
        }
    }

    (edges, degenerate)
}

/// Cotangent of the angle at `apex` in triangle `(apex, a, b)`.
///
/// Returns `None` when the angle is undefined (zero-length side or collinear
/// corner).
fn cotangent_angle(apex: &Point3<f64>, a: &Point3<f64>, b: &Point3<f64>) -> Option<f64> {
    let u = a - apex;
    let v = b - apex;

    let cross_len = u.cross(&v).norm();
    let scale = u.norm() * v.norm();
    if cross_len.is_nan() || cross_len <= DEGENERATE_SINE * scale {
        return None;
    }

    let cot = u.dot(&v) / cross_len;
    cot.is_finite().then_some(cot)
}

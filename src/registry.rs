//! Handle-based registry of prepared meshes.
//!
//! A host (a viewer, an editor, a scripting layer) loads a mesh once, keeps
//! the returned [`MeshHandle`], and then edits constraints and requests
//! deformations through it. Each record owns the mesh analysis, so repeated
//! deformations never re-analyze the mesh.
//!
//! # Example
//!
//! ```
//! use pliant::registry::MeshRegistry;
//! use nalgebra::Point3;
//!
//! let mut registry = MeshRegistry::new();
//! let handle = registry
//!     .load_mesh(
//!         &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0],
//!         &[0, 1, 2, 0, 2, 3],
//!     )
//!     .unwrap();
//!
//! registry.set_constraint(handle, 0, Point3::new(0.0, 0.0, 0.0)).unwrap();
//! registry.set_constraint(handle, 2, Point3::new(2.0, 1.0, 0.0)).unwrap();
//!
//! let positions = registry.deform(handle).unwrap();
//! assert_eq!(positions.len(), 4);
//! assert!((positions[2] - Point3::new(2.0, 1.0, 0.0)).norm() < 1e-9);
//! ```

use std::collections::HashMap;
use std::fmt;

use nalgebra::{Point3, Similarity3};

use crate::algo::deform::{ArapDeformer, ConstraintSet, DeformOptions, MeshAnalysis};
use crate::error::{MeshError, Result};
use crate::mesh::{flatten_points, TriMesh};

/// Opaque identifier of a mesh loaded into a [`MeshRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(u64);

impl MeshHandle {
    /// The raw handle value.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MeshHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mesh#{}", self.0)
    }
}

/// Everything kept for one loaded mesh.
#[derive(Debug, Clone)]
struct MeshRecord {
    deformer: ArapDeformer,
    /// Targets in world space.
    constraints: ConstraintSet,
    /// Model-to-world transform of the mesh.
    transform: Similarity3<f64>,
}

/// A collection of prepared meshes addressed by [`MeshHandle`].
///
/// Handles are issued from a counter and never reused, so a stale handle
/// always fails with [`MeshError::UnknownHandle`] instead of reaching a
/// different mesh.
#[derive(Debug, Default)]
pub struct MeshRegistry {
    records: HashMap<MeshHandle, MeshRecord>,
    next_handle: u64,
    options: DeformOptions,
}

impl MeshRegistry {
    /// Create an empty registry with default deformation options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry with the given deformation options.
    pub fn with_options(options: DeformOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Load a mesh from flat arrays and analyze it.
    ///
    /// `vertices` holds `x y z` per vertex and `faces` holds three indices
    /// per triangle. An invalid mesh creates no record.
    pub fn load_mesh(&mut self, vertices: &[f64], faces: &[usize]) -> Result<MeshHandle> {
        let mesh = TriMesh::from_flat(vertices, faces)?;
        Ok(self.load_trimesh(mesh))
    }

    /// Register an already validated mesh.
    pub fn load_trimesh(&mut self, mesh: TriMesh) -> MeshHandle {
        let handle = MeshHandle(self.next_handle);
        self.next_handle += 1;

        log::debug!(
            "loading {} ({} vertices, {} faces)",
            handle,
            mesh.num_vertices(),
            mesh.num_faces()
        );
        self.records.insert(
            handle,
            MeshRecord {
                deformer: ArapDeformer::new(mesh),
                constraints: ConstraintSet::new(),
                transform: Similarity3::identity(),
            },
        );
        handle
    }

    /// Drop a mesh and everything cached for it.
    pub fn unload_mesh(&mut self, handle: MeshHandle) -> Result<()> {
        if self.records.remove(&handle).is_none() {
            return Err(MeshError::UnknownHandle { handle: handle.raw() });
        }
        log::debug!("unloaded {}", handle);
        Ok(())
    }

    /// Pin `vertex` to a world-space position, returning its previous target.
    pub fn set_constraint(
        &mut self,
        handle: MeshHandle,
        vertex: usize,
        world_position: Point3<f64>,
    ) -> Result<Option<Point3<f64>>> {
        let record = self.record_mut(handle)?;
        let num_vertices = record.deformer.mesh().num_vertices();
        if vertex >= num_vertices {
            return Err(MeshError::ConstraintOutOfRange {
                vertex,
                num_vertices,
            });
        }
        Ok(record.constraints.set(vertex, world_position))
    }

    /// Unpin `vertex`. Returns `None` if it was not pinned.
    pub fn remove_constraint(
        &mut self,
        handle: MeshHandle,
        vertex: usize,
    ) -> Result<Option<Point3<f64>>> {
        Ok(self.record_mut(handle)?.constraints.remove(vertex))
    }

    /// Unpin every vertex of a mesh.
    pub fn clear_constraints(&mut self, handle: MeshHandle) -> Result<()> {
        self.record_mut(handle)?.constraints.clear();
        Ok(())
    }

    /// The current world-space constraints of a mesh.
    pub fn constraints(&self, handle: MeshHandle) -> Result<&ConstraintSet> {
        Ok(&self.record(handle)?.constraints)
    }

    /// Set the model-to-world transform used to interpret constraint targets.
    pub fn set_transform(&mut self, handle: MeshHandle, transform: Similarity3<f64>) -> Result<()> {
        self.record_mut(handle)?.transform = transform;
        Ok(())
    }

    /// The model-to-world transform of a mesh.
    pub fn transform(&self, handle: MeshHandle) -> Result<&Similarity3<f64>> {
        Ok(&self.record(handle)?.transform)
    }

    /// Deform a mesh under its current constraints.
    ///
    /// Targets are mapped into the mesh's local frame first; the returned
    /// positions are in that local frame, like the rest pose.
    pub fn deform(&self, handle: MeshHandle) -> Result<Vec<Point3<f64>>> {
        let record = self.record(handle)?;
        let local = record
            .constraints
            .map_targets(|p| record.transform.inverse_transform_point(p));
        record.deformer.deform(&local, &self.options)
    }

    /// Deform a mesh and return the positions as a flat `x y z` array.
    pub fn deform_flat(&self, handle: MeshHandle) -> Result<Vec<f64>> {
        self.deform(handle).map(|p| flatten_points(&p))
    }

    /// Rest-pose positions of a mesh.
    pub fn rest_positions(&self, handle: MeshHandle) -> Result<&[Point3<f64>]> {
        Ok(self.record(handle)?.deformer.mesh().positions())
    }

    /// The rest-pose mesh.
    pub fn mesh(&self, handle: MeshHandle) -> Result<&TriMesh> {
        Ok(self.record(handle)?.deformer.mesh())
    }

    /// The cached analysis of a mesh.
    pub fn analysis(&self, handle: MeshHandle) -> Result<&MeshAnalysis> {
        Ok(self.record(handle)?.deformer.analysis())
    }

    /// Deformation options used by [`deform`](Self::deform).
    pub fn options(&self) -> &DeformOptions {
        &self.options
    }

    /// Replace the deformation options.
    pub fn set_options(&mut self, options: DeformOptions) {
        self.options = options;
    }

    /// Number of loaded meshes.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no mesh is loaded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether `handle` names a loaded mesh.
    pub fn contains(&self, handle: MeshHandle) -> bool {
        self.records.contains_key(&handle)
    }

    fn record(&self, handle: MeshHandle) -> Result<&MeshRecord> {
        self.records
            .get(&handle)
            .ok_or(MeshError::UnknownHandle { handle: handle.raw() })
    }

    fn record_mut(&mut self, handle: MeshHandle) -> Result<&mut MeshRecord> {
        self.records
            .get_mut(&handle)
            .ok_or(MeshError::UnknownHandle { handle: handle.raw() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Translation3, UnitQuaternion, Vector3};

    const QUAD_VERTICES: [f64; 12] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0];
    const QUAD_FACES: [usize; 6] = [0, 1, 2, 0, 2, 3];

    fn registry_with_quad() -> (MeshRegistry, MeshHandle) {
        let mut registry = MeshRegistry::new();
        let handle = registry.load_mesh(&QUAD_VERTICES, &QUAD_FACES).unwrap();
        (registry, handle)
    }

    #[test]
    fn test_load_invalid_creates_no_record() {
        let mut registry = MeshRegistry::new();
        let err = registry.load_mesh(&QUAD_VERTICES, &[0, 1, 7]).unwrap_err();
        assert!(err.is_invalid_mesh());
        let err = registry.load_mesh(&QUAD_VERTICES[..10], &QUAD_FACES).unwrap_err();
        assert!(matches!(err, MeshError::LengthMismatch { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_handles_not_reused() {
        let (mut registry, first) = registry_with_quad();
        registry.unload_mesh(first).unwrap();
        let second = registry.load_mesh(&QUAD_VERTICES, &QUAD_FACES).unwrap();

        assert_ne!(first, second);
        assert!(!registry.contains(first));
        assert!(registry.contains(second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_handle() {
        let (mut registry, handle) = registry_with_quad();
        registry.unload_mesh(handle).unwrap();

        assert!(matches!(
            registry.unload_mesh(handle),
            Err(MeshError::UnknownHandle { .. })
        ));
        assert!(matches!(registry.deform(handle), Err(MeshError::UnknownHandle { .. })));
        assert!(matches!(
            registry.set_constraint(handle, 0, Point3::origin()),
            Err(MeshError::UnknownHandle { .. })
        ));
    }

    #[test]
    fn test_constraint_editing() {
        let (mut registry, handle) = registry_with_quad();

        assert_eq!(registry.set_constraint(handle, 1, Point3::new(1.0, 0.0, 0.0)).unwrap(), None);
        assert_eq!(
            registry.set_constraint(handle, 1, Point3::new(2.0, 0.0, 0.0)).unwrap(),
            Some(Point3::new(1.0, 0.0, 0.0))
        );
        assert_eq!(registry.remove_constraint(handle, 3).unwrap(), None);
        assert_eq!(registry.constraints(handle).unwrap().len(), 1);

        assert!(matches!(
            registry.set_constraint(handle, 4, Point3::origin()),
            Err(MeshError::ConstraintOutOfRange { vertex: 4, num_vertices: 4 })
        ));

        registry.clear_constraints(handle).unwrap();
        assert!(registry.constraints(handle).unwrap().is_empty());
    }

    #[test]
    fn test_deform_without_constraints_is_rest_pose() {
        let (registry, handle) = registry_with_quad();
        assert_eq!(registry.deform_flat(handle).unwrap(), QUAD_VERTICES.to_vec());
    }

    #[test]
    fn test_deform_golden_quad() {
        let (mut registry, handle) = registry_with_quad();
        registry.set_constraint(handle, 0, Point3::new(0.0, 0.0, 0.0)).unwrap();
        registry.set_constraint(handle, 2, Point3::new(2.0, 1.0, 0.0)).unwrap();

        let p = registry.deform(handle).unwrap();
        assert!((p[1] - Point3::new(1.320791166172465, -0.130153177970015, 0.0)).norm() < 1e-6);
        assert!((p[3] - Point3::new(0.679208833827535, 1.130153177970016, 0.0)).norm() < 1e-6);
    }

    #[test]
    fn test_world_targets_use_transform() {
        let (mut registry, handle) = registry_with_quad();
        let transform = Similarity3::from_parts(
            Translation3::new(5.0, -1.0, 2.0),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.4),
            2.0,
        );
        registry.set_transform(handle, transform).unwrap();

        let local_targets = [(0, Point3::new(0.0, 0.0, 0.0)), (2, Point3::new(2.0, 1.0, 0.0))];
        for (v, local) in local_targets {
            registry.set_constraint(handle, v, transform * local).unwrap();
        }
        let via_world = registry.deform(handle).unwrap();

        let mut plain = MeshRegistry::new();
        let reference = plain.load_mesh(&QUAD_VERTICES, &QUAD_FACES).unwrap();
        for (v, local) in local_targets {
            plain.set_constraint(reference, v, local).unwrap();
        }
        let expected = plain.deform(reference).unwrap();

        for (a, b) in via_world.iter().zip(&expected) {
            assert!((a - b).norm() < 1e-9);
        }
    }

    #[test]
    fn test_records_independent() {
        let mut registry = MeshRegistry::new();
        let a = registry.load_mesh(&QUAD_VERTICES, &QUAD_FACES).unwrap();
        let b = registry.load_mesh(&QUAD_VERTICES, &QUAD_FACES).unwrap();

        registry.set_constraint(a, 0, Point3::new(0.0, 0.0, 1.0)).unwrap();
        assert!(registry.constraints(b).unwrap().is_empty());
        assert_eq!(registry.rest_positions(b).unwrap(), registry.rest_positions(a).unwrap());
        assert_eq!(registry.analysis(a).unwrap().num_edges(), 5);
    }

    #[test]
    fn test_registry_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MeshRegistry>();
        assert_send_sync::<ArapDeformer>();
    }
}

//! Positional constraints: pinned vertices and their targets.

use std::collections::BTreeMap;

use nalgebra::Point3;

use crate::error::{MeshError, Result};

/// A mapping from vertex index to target position.
///
/// Each vertex is pinned at most once; pinning it again replaces its target.
/// Iteration is in ascending vertex order, which fixes the row order of the
/// constraint equations and keeps deformation deterministic.
///
/// # Example
///
/// ```
/// use pliant::algo::deform::ConstraintSet;
/// use nalgebra::Point3;
///
/// let mut constraints = ConstraintSet::new();
/// constraints.set(7, Point3::new(0.0, 1.0, 0.0));
/// constraints.set(2, Point3::new(1.0, 0.0, 0.0));
/// constraints.set(7, Point3::new(0.0, 2.0, 0.0)); // re-pin overwrites
///
/// assert_eq!(constraints.len(), 2);
/// assert_eq!(constraints.vertices().collect::<Vec<_>>(), vec![2, 7]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintSet {
    targets: BTreeMap<usize, Point3<f64>>,
}

impl ConstraintSet {
    /// Create an empty constraint set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin `vertex` to `target`, returning the previous target if any.
    pub fn set(&mut self, vertex: usize, target: Point3<f64>) -> Option<Point3<f64>> {
        self.targets.insert(vertex, target)
    }

    /// Unpin `vertex`. Does nothing if it was not pinned.
    pub fn remove(&mut self, vertex: usize) -> Option<Point3<f64>> {
        self.targets.remove(&vertex)
    }

    /// Target of `vertex`, if pinned.
    pub fn get(&self, vertex: usize) -> Option<&Point3<f64>> {
        self.targets.get(&vertex)
    }

    /// Whether `vertex` is pinned.
    pub fn contains(&self, vertex: usize) -> bool {
        self.targets.contains_key(&vertex)
    }

    /// Remove all pins.
    pub fn clear(&mut self) {
        self.targets.clear();
    }

    /// Number of pinned vertices.
    #[inline]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether no vertex is pinned.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Pinned vertices in ascending order.
    pub fn vertices(&self) -> impl Iterator<Item = usize> + '_ {
        self.targets.keys().copied()
    }

    /// `(vertex, target)` pairs in ascending vertex order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Point3<f64>)> + '_ {
        self.targets.iter().map(|(&v, p)| (v, p))
    }

    /// Check that every pinned vertex exists in a mesh of `num_vertices`.
    pub fn validate(&self, num_vertices: usize) -> Result<()> {
        match self.targets.keys().find(|&&v| v >= num_vertices) {
            Some(&vertex) => Err(MeshError::ConstraintOutOfRange {
                vertex,
                num_vertices,
            }),
            None => Ok(()),
        }
    }

    /// Apply `f` to every target.
    pub fn map_targets<F>(&self, mut f: F) -> ConstraintSet
    where
        F: FnMut(&Point3<f64>) -> Point3<f64>,
    {
        ConstraintSet {
            targets: self.targets.iter().map(|(&v, p)| (v, f(p))).collect(),
        }
    }

    pub(crate) fn to_pins(&self) -> Vec<(usize, Point3<f64>)> {
        self.targets.iter().map(|(&v, &p)| (v, p)).collect()
    }
}

impl FromIterator<(usize, Point3<f64>)> for ConstraintSet {
    fn from_iter<T: IntoIterator<Item = (usize, Point3<f64>)>>(iter: T) -> Self {
        Self {
            targets: iter.into_iter().collect(),
        }
    }
}

impl Extend<(usize, Point3<f64>)> for ConstraintSet {
    fn extend<T: IntoIterator<Item = (usize, Point3<f64>)>>(&mut self, iter: T) {
        self.targets.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_overwrites() {
        let mut c = ConstraintSet::new();
        assert_eq!(c.set(3, Point3::new(1.0, 0.0, 0.0)), None);
        assert_eq!(c.set(3, Point3::new(2.0, 0.0, 0.0)), Some(Point3::new(1.0, 0.0, 0.0)));
        assert_eq!(c.len(), 1);
        assert_eq!(c.get(3), Some(&Point3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut c: ConstraintSet = [(1, Point3::origin())].into_iter().collect();
        assert_eq!(c.remove(5), None);
        assert_eq!(c.len(), 1);
        assert_eq!(c.remove(1), Some(Point3::origin()));
        assert!(c.is_empty());
    }

    #[test]
    fn test_ordered_iteration() {
        let mut c = ConstraintSet::new();
        c.extend([(9, Point3::origin()), (0, Point3::origin()), (4, Point3::origin())]);
        assert_eq!(c.vertices().collect::<Vec<_>>(), vec![0, 4, 9]);
        assert_eq!(c.to_pins().iter().map(|p| p.0).collect::<Vec<_>>(), vec![0, 4, 9]);
    }

    #[test]
    fn test_validate_range() {
        let c: ConstraintSet = [(0, Point3::origin()), (4, Point3::origin())].into_iter().collect();
        assert!(c.validate(5).is_ok());
        assert!(matches!(
            c.validate(4),
            Err(MeshError::ConstraintOutOfRange { vertex: 4, num_vertices: 4 })
        ));
    }

    #[test]
    fn test_map_targets() {
        let c: ConstraintSet = [(2, Point3::new(1.0, 2.0, 3.0))].into_iter().collect();
        let shifted = c.map_targets(|p| p + nalgebra::Vector3::new(0.0, 0.0, -3.0));
        assert_eq!(shifted.get(2), Some(&Point3::new(1.0, 2.0, 0.0)));
        assert!(!shifted.contains(0));
    }
}

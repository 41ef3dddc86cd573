//! Mesh file I/O.
//!
//! # Supported Formats
//!
//! | Format | Extension | Load | Save | Notes |
//! |--------|-----------|------|------|-------|
//! | OFF | `.off` | ✓ | ✓ | Polygons are fan-triangulated on load |
//!
//! # Usage
//!
//! ```no_run
//! use pliant::io::{load, save};
//!
//! let mesh = load("model.off").unwrap();
//! save(&mesh, "copy.off").unwrap();
//! ```

pub mod off;

use std::path::Path;

use crate::error::{MeshError, Result};
use crate::mesh::TriMesh;

/// Supported mesh file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Object File Format.
    Off,
}

impl Format {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Format> {
        match ext.to_lowercase().as_str() {
            "off" => Some(Format::Off),
            _ => None,
        }
    }

    /// Detect format from file path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Format> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Format::from_extension)
    }
}

/// Load a mesh from a file, choosing the format by extension.
pub fn load<P: AsRef<Path>>(path: P) -> Result<TriMesh> {
    let path = path.as_ref();
    match detect(path)? {
        Format::Off => off::load(path),
    }
}

/// Save a mesh to a file, choosing the format by extension.
pub fn save<P: AsRef<Path>>(mesh: &TriMesh, path: P) -> Result<()> {
    let path = path.as_ref();
    match detect(path)? {
        Format::Off => off::save(mesh, path),
    }
}

fn detect(path: &Path) -> Result<Format> {
    Format::from_path(path).ok_or_else(|| MeshError::UnsupportedFormat {
        extension: path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("(none)")
            .to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(Format::from_path("a/b/mesh.OFF"), Some(Format::Off));
        assert_eq!(Format::from_path("mesh.obj"), None);
        assert_eq!(Format::from_path("mesh"), None);
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(matches!(
            load("model.stl"),
            Err(MeshError::UnsupportedFormat { extension }) if extension == "stl"
        ));
    }
}

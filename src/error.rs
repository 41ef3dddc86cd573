//! Error types for pliant.
//!
//! This module defines all error types used throughout the library.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`MeshError`].
pub type Result<T> = std::result::Result<T, MeshError>;

/// Errors that can occur while loading, analyzing, or deforming a mesh.
#[derive(Error, Debug)]
pub enum MeshError {
    /// The mesh has no vertices or no faces.
    #[error("mesh has no faces")]
    EmptyMesh,

    /// A face references an invalid vertex index.
    #[error("face {face} references vertex {vertex}, but the mesh has {num_vertices} vertices")]
    InvalidVertexIndex {
        /// The face index.
        face: usize,
        /// The invalid vertex index.
        vertex: usize,
        /// Number of vertices in the mesh.
        num_vertices: usize,
    },

    /// A face repeats a vertex index.
    #[error("face {face} is degenerate (has duplicate vertices)")]
    DegenerateFace {
        /// The face index.
        face: usize,
    },

    /// A flat coordinate or index array is not a whole number of triples.
    #[error("{what} array has length {len}, which is not a multiple of 3")]
    LengthMismatch {
        /// Which array was malformed.
        what: &'static str,
        /// Its length.
        len: usize,
    },

    /// A rest-pose position contains NaN or infinity.
    #[error("vertex {vertex} has a non-finite position")]
    NonFinitePosition {
        /// The vertex index.
        vertex: usize,
    },

    /// The handle does not name a loaded mesh.
    #[error("no mesh is loaded under handle {handle}")]
    UnknownHandle {
        /// The raw handle value.
        handle: u64,
    },

    /// A constraint pins a vertex that does not exist.
    #[error("constraint on vertex {vertex}, but the mesh has {num_vertices} vertices")]
    ConstraintOutOfRange {
        /// The pinned vertex index.
        vertex: usize,
        /// Number of vertices in the mesh.
        num_vertices: usize,
    },

    /// The constrained linear system has no unique finite solution.
    #[error("singular system: {reason}")]
    SingularSystem {
        /// What made the system singular.
        reason: String,
    },

    /// An iterative linear solver failed to converge.
    #[error("linear solver failed to converge after {iterations} iterations")]
    ConvergenceFailed {
        /// Number of iterations attempted.
        iterations: usize,
    },

    /// The deformation was cancelled between iterations.
    #[error("deformation cancelled after {completed} iterations")]
    Cancelled {
        /// Number of iterations that had completed.
        completed: usize,
    },

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed mesh file contents.
    #[error("parse error at line {line}: {message}")]
    ParseError {
        /// 1-based line number.
        line: usize,
        /// What was wrong.
        message: String,
    },

    /// Error loading mesh from file.
    #[error("failed to load mesh from {path}: {message}")]
    LoadError {
        /// The file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Error saving mesh to file.
    #[error("failed to save mesh to {path}: {message}")]
    SaveError {
        /// The file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Unsupported file format.
    #[error("unsupported file format: {extension}")]
    UnsupportedFormat {
        /// The file extension.
        extension: String,
    },

    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },
}

impl MeshError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        MeshError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }

    /// Create a singular system error.
    pub fn singular(reason: impl Into<String>) -> Self {
        MeshError::SingularSystem {
            reason: reason.into(),
        }
    }

    /// Whether this error rejects the mesh data itself.
    ///
    /// These are raised before any preprocessing result is cached.
    pub fn is_invalid_mesh(&self) -> bool {
        matches!(
            self,
            MeshError::EmptyMesh
                | MeshError::InvalidVertexIndex { .. }
                | MeshError::DegenerateFace { .. }
                | MeshError::LengthMismatch { .. }
                | MeshError::NonFinitePosition { .. }
        )
    }
}

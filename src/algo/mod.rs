//! Deformation algorithms and their numerical support.
//!
//! - [`deform`]: as-rigid-as-possible deformation with positional constraints
//! - [`sparse`]: compressed sparse row matrices and a conjugate gradient solver
//!
//! Long-running operations report through [`Progress`] and can be stopped
//! with a [`CancelToken`].

pub mod deform;
mod progress;
pub mod sparse;

pub use progress::{CancelToken, Progress};

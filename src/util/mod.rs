//! Utility types shared across the converter.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - Math type re-exports from glam plus [`BBox3d`] and [`Transform`]

mod error;
mod math;

pub use error::*;
pub use math::*;

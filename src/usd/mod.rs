//! In-memory scene description.
//!
//! A minimal layer/prim/property model with the pieces a layered asset
//! needs:
//! - [`Layer`] - one document with stage metadata and root prims
//! - [`Prim`] - a def/over/class spec with schemas, arcs and properties
//! - [`Value`] - typed attribute values
//! - [`writer`] - deterministic `.usda` text output
//! - [`compose`] - layer-stack and arc composition into a single layer

mod path;
mod value;
mod metadata;
mod prim;
mod layer;
pub mod writer;
pub mod compose;

pub use path::*;
pub use value::{format_f32, format_f64, Value};
pub use metadata::*;
pub use prim::*;
pub use layer::*;
pub use writer::{save_layer, write_layer};
pub use compose::flatten;

//! # mjcf-usd
//!
//! Converts MuJoCo MJCF models into layered OpenUSD assets.
//!
//! The output is a component asset: a thin interface layer whose payload
//! stacks separate Geometry, Materials and Physics layers, with meshes and
//! materials in shared libraries. Physics data only ever lives in the
//! Physics layer, authored as overrides on the geometry hierarchy.
//!
//! ## Modules
//!
//! - [`util`] - Errors, math types
//! - [`usd`] - In-memory layers, text output and composition
//! - [`mjcf`] - MJCF reader
//! - [`mesh`] - OBJ / STL decoding
//! - [`config`] - Conversion options
//! - [`convert`] - The conversion passes
//!
//! ## Example
//!
//! ```ignore
//! use mjcf_usd::prelude::*;
//!
//! let path = Converter::new(ConvertOptions::default()).convert("robot.xml", "out")?;
//! println!("{}", path.display());
//! ```

pub mod util;
pub mod usd;
pub mod mjcf;
pub mod mesh;
pub mod config;
pub mod convert;

/// Crate version, stamped into every written layer.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export commonly used types
pub use config::ConvertOptions;
pub use convert::{convert, Asset, Converter, Warning};
pub use util::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::ConvertOptions;
    pub use crate::convert::{convert, Asset, Converter, LayerToken, Warning};
    pub use crate::mjcf::{load, parse_str, Model};
    pub use crate::usd::{flatten, write_layer, Layer, Prim, PrimPath, Value};
    pub use crate::util::{Error, Result};
}

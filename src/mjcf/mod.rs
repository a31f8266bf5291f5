//! MuJoCo MJCF reader.
//!
//! [`load`] reads a file into a [`Model`] with default classes, frames and
//! actuator shortcuts already resolved.

mod model;
mod parser;
mod xml;

pub use model::*;
pub use parser::{load, parse_str};

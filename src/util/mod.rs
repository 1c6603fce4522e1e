//! Basic types shared across the crate.

pub mod error;
pub mod math;

pub use error::{Error, Result};
pub use math::{barycentric, bary_inside, BBox3f};

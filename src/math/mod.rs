//! Transform math
//!
//! Built on top of glam

mod transform;

pub use transform::TransformQvvs;

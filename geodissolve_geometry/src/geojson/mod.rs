//! GeoJSON reading and writing for the pipeline boundary.
//!
//! Only Polygon and MultiPolygon members are meaningful to the dissolve
//! core; everything else is logged and skipped. A feature without a usable
//! geometry is an ordinary skip branch, not an error.

mod read;
mod write;

pub use read::*;
pub use write::*;

mod geo;
pub mod crs;
pub mod geojson;
pub mod stats;

pub use crs::Crs;
pub use geo::*;
pub use stats::{StatsSummary, report};

mod dissolve;
mod index;
mod merge;
mod repair;

pub use dissolve::{DissolveConfig, DissolvePipeline};
pub use index::SpatialIndex;
pub use merge::{AdjacencyMerger, MergeGroup};
pub use repair::{GeometryRepairer, GeometryValidationError, ValidationStage};

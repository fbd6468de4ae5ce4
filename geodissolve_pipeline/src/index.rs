//! Ephemeral spatial index over feature bounding boxes.
//!
//! Built once per dissolve pass and discarded with it; never shared across
//! calls or threads.

use geo::{BoundingRect, Rect};
use geodissolve_geometry::FeatureCollection;
use rstar::{AABB, RTree, RTreeObject};

/// One feature's bounding box in the R-tree, tagged with its index in the
/// source collection.
#[derive(Clone, Debug)]
struct IndexedBBox {
	index: usize,
	lower: [f64; 2],
	upper: [f64; 2],
}

impl RTreeObject for IndexedBBox {
	type Envelope = AABB<[f64; 2]>;

	fn envelope(&self) -> Self::Envelope {
		AABB::from_corners(self.lower, self.upper)
	}
}

pub struct SpatialIndex {
	tree: RTree<IndexedBBox>,
}

impl SpatialIndex {
	/// Build the index over every feature with a non-empty geometry;
	/// features without a bounding box are simply absent from the tree.
	pub fn build(collection: &FeatureCollection) -> Self {
		let boxes = collection
			.features
			.iter()
			.enumerate()
			.filter_map(|(index, feature)| {
				let bounds = feature.geometry.bounding_rect()?;
				Some(IndexedBBox {
					index,
					lower: [bounds.min().x, bounds.min().y],
					upper: [bounds.max().x, bounds.max().y],
				})
			})
			.collect();
		Self {
			tree: RTree::bulk_load(boxes),
		}
	}

	/// Indices of all features whose bounding box intersects `bounds`,
	/// ascending. Sorting makes the query order independent of tree
	/// internals, which keeps the dissolve pass deterministic.
	pub fn query(&self, bounds: &Rect<f64>) -> Vec<usize> {
		let envelope = AABB::from_corners(
			[bounds.min().x, bounds.min().y],
			[bounds.max().x, bounds.max().y],
		);
		let mut indices: Vec<usize> = self
			.tree
			.locate_in_envelope_intersecting(&envelope)
			.map(|entry| entry.index)
			.collect();
		indices.sort_unstable();
		indices
	}

	pub fn len(&self) -> usize {
		self.tree.size()
	}

	pub fn is_empty(&self) -> bool {
		self.tree.size() == 0
	}
}

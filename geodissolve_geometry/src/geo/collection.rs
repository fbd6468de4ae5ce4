use super::{GeoFeature, GeoValue};
use crate::crs::{Crs, transform_coord};
use geo::MapCoords;

/// An ordered sequence of features sharing one coordinate reference system.
///
/// Order is significant: the dissolve pass iterates features in collection
/// order, so the same input always yields the same groups and ids.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureCollection {
	pub crs: Crs,
	pub features: Vec<GeoFeature>,
}

impl FeatureCollection {
	pub fn new(crs: Crs) -> Self {
		Self {
			crs,
			features: Vec::new(),
		}
	}

	pub fn from_features(crs: Crs, features: Vec<GeoFeature>) -> Self {
		Self { crs, features }
	}

	pub fn len(&self) -> usize {
		self.features.len()
	}

	pub fn is_empty(&self) -> bool {
		self.features.is_empty()
	}

	pub fn push(&mut self, feature: GeoFeature) {
		self.features.push(feature);
	}

	/// Reproject every geometry into `target`, returning a new collection.
	///
	/// A no-op clone when the collection is already expressed in `target`.
	pub fn reproject(&self, target: Crs) -> FeatureCollection {
		if self.crs == target {
			return self.clone();
		}
		let from = self.crs;
		let features = self
			.features
			.iter()
			.map(|feature| {
				let mut feature = feature.clone();
				feature.geometry = feature.geometry.map_coords(|c| transform_coord(c, from, target));
				feature
			})
			.collect();
		FeatureCollection { crs: target, features }
	}

	/// Split into homogeneous sub-collections by a grouping attribute, in
	/// order of first appearance; feature order is preserved within each
	/// part. Features missing the key end up under `GeoValue::Null`.
	pub fn partition_by(&self, key: &str) -> Vec<(GeoValue, FeatureCollection)> {
		let mut parts: Vec<(GeoValue, FeatureCollection)> = Vec::new();
		for feature in &self.features {
			let value = feature.properties.get(key).cloned().unwrap_or(GeoValue::Null);
			match parts.iter_mut().find(|(v, _)| *v == value) {
				Some((_, part)) => part.push(feature.clone()),
				None => {
					let mut part = FeatureCollection::new(self.crs);
					part.push(feature.clone());
					parts.push((value, part));
				}
			}
		}
		parts
	}
}

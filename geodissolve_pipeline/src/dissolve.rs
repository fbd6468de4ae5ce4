//! The dissolve pipeline: reproject, merge adjacent features, renumber,
//! validate.

use crate::merge::AdjacencyMerger;
use crate::repair::GeometryRepairer;
use anyhow::Result;
use geodissolve_geometry::{Crs, FeatureCollection, GeoFeature, GeoProperties, stats};

#[derive(Clone, Debug, PartialEq)]
pub struct DissolveConfig {
	/// Metric CRS in which adjacency and repair are computed.
	pub working_crs: Crs,
	/// CRS of the returned collection.
	pub output_crs: Crs,
	/// Minimum shared-boundary length for two features to merge, in
	/// working-CRS units.
	pub edge_share_threshold: f64,
	/// Property receiving the sequential 1-based id of each output feature.
	pub id_field: String,
}

impl Default for DissolveConfig {
	fn default() -> Self {
		Self {
			working_crs: Crs::Utm32N,
			output_crs: Crs::Wgs84,
			edge_share_threshold: 10.0,
			id_field: "feature_id".to_string(),
		}
	}
}

pub struct DissolvePipeline {
	config: DissolveConfig,
}

impl DissolvePipeline {
	pub fn new(config: DissolveConfig) -> Self {
		Self { config }
	}

	/// Dissolve `raw` into merged, renumbered, validated output geometries.
	///
	/// Returns `None` when the input is empty or contains no usable polygon
	/// geometry; there is nothing to dissolve and an empty output file would
	/// be misleading. Attributes identical
	/// across all members of a merge group are carried over, everything else
	/// is dropped.
	pub fn dissolve(&self, raw: &FeatureCollection, dataset: &str) -> Result<Option<FeatureCollection>> {
		if raw.is_empty() {
			log::info!("{dataset}: no features, nothing to dissolve");
			return Ok(None);
		}

		let working = raw.reproject(self.config.working_crs);
		stats::report(&working, dataset);

		let merger = AdjacencyMerger::new(self.config.edge_share_threshold);
		let groups = merger.merge_adjacent(&working, dataset);
		if groups.is_empty() {
			log::info!("{dataset}: no usable polygon geometry, nothing to dissolve");
			return Ok(None);
		}

		let mut dissolved = FeatureCollection::new(self.config.working_crs);
		for (position, group) in groups.into_iter().enumerate() {
			let id = position as u64 + 1;
			let mut feature = GeoFeature::new(group.geometry);
			feature.set_properties(self.shared_properties(&working, &group.members));
			feature.set_id(id);
			feature.set_property(self.config.id_field.clone(), id);
			dissolved.push(feature);
		}
		stats::report(&dissolved, dataset);

		let repairer = GeometryRepairer::new(self.config.working_crs);
		let output = repairer.repair(&dissolved, self.config.output_crs, dataset)?;
		Ok(Some(output))
	}

	/// Attributes identical across every group member. The id field is
	/// always discarded; stale input ids must not survive renumbering.
	fn shared_properties(&self, collection: &FeatureCollection, members: &[usize]) -> GeoProperties {
		let mut shared = match members.first() {
			Some(&first) => collection.features[first].properties.clone(),
			None => GeoProperties::new(),
		};
		for &member in &members[1..] {
			shared.retain_shared(&collection.features[member].properties);
		}
		shared.remove(&self.config.id_field);
		shared
	}
}

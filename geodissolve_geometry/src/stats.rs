//! Descriptive statistics over a feature collection, for data-quality
//! observability.
//!
//! Reporting must never abort a pipeline: a geometry that cannot be
//! analyzed is logged and skipped, and contributes nothing to the
//! aggregates.

use crate::geo::FeatureCollection;
use geo::{BoundingRect, MultiPolygon};
use itertools::Itertools;
use std::cmp::Reverse;
use std::fmt::{Display, Formatter};

/// Distance within which a coordinate counts as sitting on the 10-unit grid.
const GRID_TOLERANCE: f64 = 0.01;
/// Grid cell size of snapped-to-grid source data, in CRS units.
const GRID_SIZE: f64 = 10.0;

#[derive(Clone, Copy, Debug, PartialEq)]
struct GeometryMetrics {
	width: f64,
	height: f64,
	/// Bounding-box area (width × height), a cheap proxy for areal
	/// comparison, not the true polygon area.
	area: f64,
	grid_aligned: bool,
	vertices: usize,
}

/// Aggregated metrics for one collection.
#[derive(Clone, Debug, PartialEq)]
pub struct StatsSummary {
	pub feature_count: usize,
	/// Distinct bounding-box dimensions `(width, height, frequency)`, most
	/// common first.
	pub dimension_counts: Vec<(f64, f64, usize)>,
	pub non_grid_aligned: usize,
	pub mean_vertices: f64,
	/// Sum of bounding-box areas in km².
	pub total_area_km2: f64,
	/// Geometries that could not be analyzed and were excluded.
	pub skipped: usize,
}

impl Display for StatsSummary {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		writeln!(f, "total features: {}", self.feature_count)?;
		writeln!(f, "unique dimensions (width x height, count):")?;
		for (width, height, count) in &self.dimension_counts {
			writeln!(f, "  {width:.1} x {height:.1}: {count} features")?;
		}
		writeln!(f, "non-grid-aligned features: {}", self.non_grid_aligned)?;
		writeln!(f, "average vertices per feature: {:.1}", self.mean_vertices)?;
		write!(f, "total area covered: {:.2} km²", self.total_area_km2)
	}
}

/// Analyze every geometry in `collection` and log a human-readable summary.
///
/// Pure with respect to its return value; the log lines are the side
/// effect.
pub fn report(collection: &FeatureCollection, dataset: &str) -> StatsSummary {
	let mut metrics = Vec::with_capacity(collection.len());
	let mut skipped = 0;

	for (index, feature) in collection.features.iter().enumerate() {
		match analyze_geometry(&feature.geometry) {
			Some(m) => metrics.push(m),
			None => {
				log::warn!("{dataset}: skipping unanalyzable geometry at index {index}");
				skipped += 1;
			}
		}
	}

	let dimension_counts: Vec<(f64, f64, usize)> = metrics
		.iter()
		.map(|m| (m.width.to_bits(), m.height.to_bits()))
		.counts()
		.into_iter()
		.sorted_by_key(|&((w, h), count)| (Reverse(count), w, h))
		.map(|((w, h), count)| (f64::from_bits(w), f64::from_bits(h), count))
		.collect();

	let vertex_total: usize = metrics.iter().map(|m| m.vertices).sum();
	let mean_vertices = if metrics.is_empty() {
		0.0
	} else {
		vertex_total as f64 / metrics.len() as f64
	};

	let summary = StatsSummary {
		feature_count: metrics.len(),
		dimension_counts,
		non_grid_aligned: metrics.iter().filter(|m| !m.grid_aligned).count(),
		mean_vertices,
		total_area_km2: metrics.iter().map(|m| m.area).sum::<f64>() / 1_000_000.0,
		skipped,
	};

	log::info!("{dataset}: geometry statistics ({})", collection.crs);
	for line in summary.to_string().lines() {
		log::info!("{dataset}: {line}");
	}
	if skipped > 0 {
		log::warn!("{dataset}: {skipped} geometries skipped during analysis");
	}

	summary
}

fn analyze_geometry(geometry: &MultiPolygon<f64>) -> Option<GeometryMetrics> {
	let bounds = geometry.bounding_rect()?;
	let width = bounds.max().x - bounds.min().x;
	let height = bounds.max().y - bounds.min().y;

	let mut vertices = 0;
	let mut grid_aligned = true;
	for polygon in geometry {
		let exterior = polygon.exterior();
		vertices += exterior.0.len();
		grid_aligned &= exterior
			.0
			.iter()
			.all(|c| on_grid(c.x) && on_grid(c.y));
	}

	Some(GeometryMetrics {
		width,
		height,
		area: width * height,
		grid_aligned,
		vertices,
	})
}

fn on_grid(coord: f64) -> bool {
	((coord / GRID_SIZE).round() * GRID_SIZE - coord).abs() < GRID_TOLERANCE
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::crs::Crs;
	use crate::geo::GeoFeature;
	use approx::assert_relative_eq;
	use geo::{MultiPolygon, polygon};

	fn square(x: f64, y: f64, size: f64) -> GeoFeature {
		GeoFeature::from(polygon![
			(x: x, y: y),
			(x: x + size, y: y),
			(x: x + size, y: y + size),
			(x: x, y: y + size),
		])
	}

	#[test]
	fn grid_aligned_square_is_detected() {
		let mut collection = FeatureCollection::new(Crs::Utm32N);
		collection.push(square(0.0, 0.0, 10.0));
		let summary = report(&collection, "test");
		assert_eq!(summary.non_grid_aligned, 0);
	}

	#[test]
	fn offset_square_is_not_grid_aligned() {
		let mut collection = FeatureCollection::new(Crs::Utm32N);
		collection.push(square(0.5, 0.5, 10.0));
		let summary = report(&collection, "test");
		assert_eq!(summary.non_grid_aligned, 1);
	}

	#[test]
	fn dimension_histogram_is_most_common_first() {
		let mut collection = FeatureCollection::new(Crs::Utm32N);
		collection.push(square(0.0, 0.0, 10.0));
		collection.push(square(100.0, 0.0, 10.0));
		collection.push(square(200.0, 0.0, 20.0));
		let summary = report(&collection, "test");
		assert_eq!(
			summary.dimension_counts,
			vec![(10.0, 10.0, 2), (20.0, 20.0, 1)]
		);
	}

	#[test]
	fn aggregates_over_simple_squares() {
		let mut collection = FeatureCollection::new(Crs::Utm32N);
		collection.push(square(0.0, 0.0, 1000.0));
		collection.push(square(5000.0, 0.0, 1000.0));
		let summary = report(&collection, "test");
		assert_eq!(summary.feature_count, 2);
		// Two 1 km × 1 km boxes
		assert_relative_eq!(summary.total_area_km2, 2.0);
		// A closed square ring has 5 stored vertices
		assert_relative_eq!(summary.mean_vertices, 5.0);
		assert_eq!(summary.skipped, 0);
	}

	#[test]
	fn empty_geometry_is_skipped_not_fatal() {
		let mut collection = FeatureCollection::new(Crs::Utm32N);
		collection.push(square(0.0, 0.0, 10.0));
		collection.push(GeoFeature::from(MultiPolygon::<f64>::new(vec![])));
		let summary = report(&collection, "test");
		assert_eq!(summary.feature_count, 1);
		assert_eq!(summary.skipped, 1);
	}
}

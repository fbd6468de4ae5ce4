//! Geometry repair and fail-hard validation.
//!
//! Every geometry is cleaned and checked twice, once in the metric working
//! CRS and once more after reprojection to the output CRS, because the
//! coordinate transform can itself introduce defects. Any geometry that is
//! still invalid after repair aborts the run; silently shipping broken
//! polygons downstream is worse than failing.

use anyhow::Result;
use geo::algorithm::line_intersection::{LineIntersection, line_intersection};
use geo::{BooleanOps, HasDimensions, Line, LineString, MultiPolygon, Validation};
use geodissolve_geometry::{Crs, FeatureCollection, GeoFeature};

/// Which validation pass a collection failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationStage {
	/// Repair and validity check in the metric working CRS.
	WorkingClean,
	/// Repair and validity check after reprojection to the output CRS.
	OutputClean,
	/// Ring self-intersection check on the final geometries.
	Simplicity,
}

impl std::fmt::Display for ValidationStage {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.write_str(match self {
			ValidationStage::WorkingClean => "cleanup in the working CRS",
			ValidationStage::OutputClean => "cleanup in the output CRS",
			ValidationStage::Simplicity => "the simplicity check",
		})
	}
}

/// Raised when geometries remain invalid after repair. Distinguishable from
/// I/O and parsing failures so callers can tell "broken data" apart from
/// "broken run".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeometryValidationError {
	pub dataset: String,
	pub stage: ValidationStage,
	pub invalid_count: usize,
}

impl std::fmt::Display for GeometryValidationError {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(
			f,
			"{}: {} geometries failed {}",
			self.dataset, self.invalid_count, self.stage
		)
	}
}

impl std::error::Error for GeometryValidationError {}

pub struct GeometryRepairer {
	working_crs: Crs,
}

impl GeometryRepairer {
	pub fn new(working_crs: Crs) -> Self {
		Self { working_crs }
	}

	/// Repair `collection`, reproject it to `target` and validate the
	/// result. Features whose geometry ends up empty are dropped; features
	/// whose geometry stays invalid abort with [`GeometryValidationError`].
	pub fn repair(
		&self,
		collection: &FeatureCollection,
		target: Crs,
		dataset: &str,
	) -> Result<FeatureCollection> {
		let initial = collection.len();
		log::info!(
			"{dataset}: validating {initial} geometries ({} -> {target})",
			self.working_crs
		);

		let mut working = collection.reproject(self.working_crs);
		check(clean_pass(&mut working.features), ValidationStage::WorkingClean, dataset)?;

		let mut output = working.reproject(target);
		check(clean_pass(&mut output.features), ValidationStage::OutputClean, dataset)?;

		let non_simple = output
			.features
			.iter()
			.filter(|feature| !is_simple(&feature.geometry))
			.count();
		check(non_simple, ValidationStage::Simplicity, dataset)?;

		output.features.retain(|feature| !feature.geometry.is_empty());
		let removed = initial - output.len();
		if removed > 0 {
			log::info!("{dataset}: dropped {removed} empty geometries");
		}
		log::info!("{dataset}: {} geometries valid in {target}", output.len());

		Ok(output)
	}
}

fn check(invalid_count: usize, stage: ValidationStage, dataset: &str) -> Result<()> {
	if invalid_count == 0 {
		return Ok(());
	}
	log::error!("{dataset}: {invalid_count} geometries failed {stage}");
	Err(GeometryValidationError {
		dataset: dataset.to_string(),
		stage,
		invalid_count,
	}
	.into())
}

/// Repair every geometry in place and count those still invalid afterwards.
///
/// Repair is a union with the empty multipolygon, which re-nodes rings and
/// discards degenerate parts. A non-empty geometry that comes back empty
/// was unrepairable and counts as invalid.
fn clean_pass(features: &mut [GeoFeature]) -> usize {
	let mut invalid = 0;
	for feature in features.iter_mut() {
		let was_empty = feature.geometry.is_empty();
		feature.geometry = repair_geometry(&feature.geometry);
		let is_unrepairable = !was_empty && feature.geometry.is_empty();
		if is_unrepairable || !feature.geometry.is_valid() {
			invalid += 1;
		}
	}
	invalid
}

fn repair_geometry(geometry: &MultiPolygon<f64>) -> MultiPolygon<f64> {
	geometry.union(&MultiPolygon::<f64>::new(vec![]))
}

fn is_simple(geometry: &MultiPolygon<f64>) -> bool {
	geometry.iter().all(|polygon| {
		ring_is_simple(polygon.exterior()) && polygon.interiors().iter().all(ring_is_simple)
	})
}

/// A closed ring is simple when no two segments intersect except adjacent
/// segments at their shared endpoint.
fn ring_is_simple(ring: &LineString<f64>) -> bool {
	let segments: Vec<Line<f64>> = ring.lines().collect();
	let count = segments.len();
	for i in 0..count {
		for j in (i + 1)..count {
			let adjacent = j == i + 1 || (i == 0 && j == count - 1);
			match line_intersection(segments[i], segments[j]) {
				None => {}
				Some(LineIntersection::Collinear { .. }) => return false,
				Some(LineIntersection::SinglePoint { is_proper, .. }) => {
					if is_proper || !adjacent {
						return false;
					}
				}
			}
		}
	}
	true
}

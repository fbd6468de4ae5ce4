//! Adjacency merging: union polygons that share a sufficiently long
//! boundary into one output geometry.
//!
//! The pass is greedy and single-pass, by deliberate design: features are
//! visited in collection order, each unvisited feature opens a group and
//! pulls in every index-candidate that shares an edge with it. Groups are
//! not re-expanded afterwards, so chains longer than one candidate sweep
//! stay separate. Same input order, same groups, same ids.

use crate::index::SpatialIndex;
use geo::algorithm::line_intersection::{LineIntersection, line_intersection};
use geo::{Area, BooleanOps, BoundingRect, Coord, Line, MultiPolygon, unary_union};
use geodissolve_geometry::FeatureCollection;

/// Distance within which two coordinates are treated as the same point.
const POINT_TOLERANCE: f64 = 1e-6;
/// Overlap area below which two polygons are considered interior-disjoint.
const AREA_TOLERANCE: f64 = 1e-6;

/// A set of mutually adjacent feature indices and their merged geometry.
///
/// `geometry` is the union of the members' geometries; a singleton group
/// keeps the original geometry untouched.
#[derive(Clone, Debug, PartialEq)]
pub struct MergeGroup {
	pub members: Vec<usize>,
	pub geometry: MultiPolygon<f64>,
}

pub struct AdjacencyMerger {
	/// Minimum shared-boundary length, in collection CRS units, for two
	/// features to merge. Matches the source data's grid cell size.
	threshold: f64,
}

impl AdjacencyMerger {
	pub fn new(threshold: f64) -> Self {
		Self { threshold }
	}

	/// Partition `collection` into merge groups, in emission order.
	///
	/// Every feature with a usable geometry lands in exactly one group;
	/// features with an empty geometry are logged and excluded.
	pub fn merge_adjacent(&self, collection: &FeatureCollection, dataset: &str) -> Vec<MergeGroup> {
		let features = &collection.features;
		log::info!("{dataset}: merging {} features", features.len());

		let index = SpatialIndex::build(collection);
		let mut merged = vec![false; features.len()];
		let mut groups = Vec::new();

		for i in 0..features.len() {
			if merged[i] {
				continue;
			}
			let geometry = &features[i].geometry;
			let Some(bounds) = geometry.bounding_rect() else {
				log::warn!("{dataset}: skipping feature {i} with empty geometry");
				merged[i] = true;
				continue;
			};
			merged[i] = true;

			let mut members = vec![i];
			let mut geometries = vec![geometry];

			for j in index.query(&bounds) {
				if j == i || merged[j] {
					continue;
				}
				if self.shares_edge(geometry, &features[j].geometry) {
					merged[j] = true;
					members.push(j);
					geometries.push(&features[j].geometry);
				}
			}

			let geometry = if geometries.len() == 1 {
				geometry.clone()
			} else {
				unary_union(geometries)
			};
			groups.push(MergeGroup { members, geometry });

			if groups.len() % 10_000 == 0 {
				log::debug!("{dataset}: processed {} groups", groups.len());
			}
		}

		log::info!("{dataset}: merged {} features into {} groups", features.len(), groups.len());
		groups
	}

	/// Two geometries share an edge when their common boundary is a single
	/// connected line at least `threshold` long and their interiors do not
	/// overlap. A corner touch has zero shared length; a two-part shared
	/// boundary is not a single line; a point contact away from the shared
	/// line makes the boundary a line-plus-point collection; an areal
	/// overlap is not a line at all. None of these merge.
	pub fn shares_edge(&self, a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> bool {
		let overlaps = boundary_overlaps(a, b);
		let length: f64 = overlaps.iter().map(line_length).sum();
		if length < self.threshold {
			return false;
		}
		if connected_components(&overlaps) != 1 {
			return false;
		}
		if has_isolated_point_contact(a, b, &overlaps) {
			return false;
		}
		a.intersection(b).unsigned_area() <= AREA_TOLERANCE
	}
}

fn line_length(line: &Line<f64>) -> f64 {
	(line.end.x - line.start.x).hypot(line.end.y - line.start.y)
}

fn rings(geometry: &MultiPolygon<f64>) -> impl Iterator<Item = &geo::LineString<f64>> {
	geometry
		.iter()
		.flat_map(|polygon| std::iter::once(polygon.exterior()).chain(polygon.interiors()))
}

/// Collinear overlap segments between the boundaries of `a` and `b`,
/// deduplicated.
fn boundary_overlaps(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> Vec<Line<f64>> {
	let mut overlaps = Vec::new();
	for ring_a in rings(a) {
		for segment_a in ring_a.lines() {
			for ring_b in rings(b) {
				for segment_b in ring_b.lines() {
					if let Some(overlap) = segment_overlap(segment_a, segment_b) {
						overlaps.push(overlap);
					}
				}
			}
		}
	}
	dedupe_lines(&mut overlaps);
	overlaps
}

/// The collinear overlap of two segments, if it has positive length.
fn segment_overlap(a: Line<f64>, b: Line<f64>) -> Option<Line<f64>> {
	let da = Coord {
		x: a.end.x - a.start.x,
		y: a.end.y - a.start.y,
	};
	let db = Coord {
		x: b.end.x - b.start.x,
		y: b.end.y - b.start.y,
	};
	let len_a = da.x.hypot(da.y);
	let len_b = db.x.hypot(db.y);
	if len_a < POINT_TOLERANCE || len_b < POINT_TOLERANCE {
		return None;
	}

	// Parallel?
	if (da.x * db.y - da.y * db.x).abs() > POINT_TOLERANCE * len_a * len_b {
		return None;
	}
	// Collinear? Perpendicular distance of b.start from the line through a.
	let offset = Coord {
		x: b.start.x - a.start.x,
		y: b.start.y - a.start.y,
	};
	if (da.x * offset.y - da.y * offset.x).abs() / len_a > POINT_TOLERANCE {
		return None;
	}

	// Parameters of b's endpoints along a.
	let project = |p: Coord<f64>| ((p.x - a.start.x) * da.x + (p.y - a.start.y) * da.y) / (len_a * len_a);
	let (t0, t1) = (project(b.start), project(b.end));
	let lo = t0.min(t1).max(0.0);
	let hi = t0.max(t1).min(1.0);
	if (hi - lo) * len_a < POINT_TOLERANCE {
		return None;
	}

	Some(Line::new(
		Coord {
			x: a.start.x + lo * da.x,
			y: a.start.y + lo * da.y,
		},
		Coord {
			x: a.start.x + hi * da.x,
			y: a.start.y + hi * da.y,
		},
	))
}

/// True when the boundaries of `a` and `b` touch at a point lying on none
/// of the overlap segments. The shared boundary is then a line plus a
/// separate point, not a single line.
fn has_isolated_point_contact(
	a: &MultiPolygon<f64>,
	b: &MultiPolygon<f64>,
	overlaps: &[Line<f64>],
) -> bool {
	for ring_a in rings(a) {
		for segment_a in ring_a.lines() {
			for ring_b in rings(b) {
				for segment_b in ring_b.lines() {
					if let Some(LineIntersection::SinglePoint { intersection, .. }) =
						line_intersection(segment_a, segment_b)
					{
						if !overlaps.iter().any(|overlap| point_on_line(intersection, overlap)) {
							return true;
						}
					}
				}
			}
		}
	}
	false
}

fn point_on_line(p: Coord<f64>, line: &Line<f64>) -> bool {
	let d = Coord {
		x: line.end.x - line.start.x,
		y: line.end.y - line.start.y,
	};
	let len2 = d.x * d.x + d.y * d.y;
	if len2 == 0.0 {
		return same_point(p, line.start);
	}
	let t = (((p.x - line.start.x) * d.x + (p.y - line.start.y) * d.y) / len2).clamp(0.0, 1.0);
	let proj = Coord {
		x: line.start.x + t * d.x,
		y: line.start.y + t * d.y,
	};
	(p.x - proj.x).hypot(p.y - proj.y) <= POINT_TOLERANCE
}

fn same_point(a: Coord<f64>, b: Coord<f64>) -> bool {
	(a.x - b.x).abs() <= POINT_TOLERANCE && (a.y - b.y).abs() <= POINT_TOLERANCE
}

/// Remove duplicate overlap segments (coincident ring edges produce the
/// same overlap from several segment pairs).
fn dedupe_lines(lines: &mut Vec<Line<f64>>) {
	// Orient each segment so duplicates compare equal
	for line in lines.iter_mut() {
		if (line.end.x, line.end.y) < (line.start.x, line.start.y) {
			std::mem::swap(&mut line.start, &mut line.end);
		}
	}
	lines.sort_by(|a, b| {
		(a.start.x, a.start.y, a.end.x, a.end.y)
			.partial_cmp(&(b.start.x, b.start.y, b.end.x, b.end.y))
			.unwrap_or(std::cmp::Ordering::Equal)
	});
	lines.dedup_by(|a, b| same_point(a.start, b.start) && same_point(a.end, b.end));
}

/// Number of connected components among the overlap segments, chaining
/// segments that share an endpoint.
fn connected_components(lines: &[Line<f64>]) -> usize {
	if lines.is_empty() {
		return 0;
	}
	let mut component: Vec<usize> = (0..lines.len()).collect();

	fn root(component: &mut [usize], mut i: usize) -> usize {
		while component[i] != i {
			component[i] = component[component[i]];
			i = component[i];
		}
		i
	}

	for i in 0..lines.len() {
		for j in (i + 1)..lines.len() {
			let touches = same_point(lines[i].start, lines[j].start)
				|| same_point(lines[i].start, lines[j].end)
				|| same_point(lines[i].end, lines[j].start)
				|| same_point(lines[i].end, lines[j].end);
			if touches {
				let (ri, rj) = (root(&mut component, i), root(&mut component, j));
				component[ri] = rj;
			}
		}
	}

	(0..lines.len())
		.filter(|&i| root(&mut component, i) == i)
		.count()
}

#[cfg(test)]
mod tests {
	use super::*;
	use geo::polygon;
	use geodissolve_geometry::{Crs, GeoFeature};
	use rstest::rstest;

	fn square(x: f64, y: f64, size: f64) -> GeoFeature {
		GeoFeature::from(polygon![
			(x: x, y: y),
			(x: x + size, y: y),
			(x: x + size, y: y + size),
			(x: x, y: y + size),
		])
	}

	fn collection(features: Vec<GeoFeature>) -> FeatureCollection {
		FeatureCollection::from_features(Crs::Utm32N, features)
	}

	#[test]
	fn full_shared_edge_merges() {
		let merger = AdjacencyMerger::new(10.0);
		let groups = merger.merge_adjacent(
			&collection(vec![square(0.0, 0.0, 10.0), square(10.0, 0.0, 10.0)]),
			"test",
		);
		assert_eq!(groups.len(), 1);
		assert_eq!(groups[0].members, vec![0, 1]);
	}

	#[test]
	fn partial_edge_below_threshold_does_not_merge() {
		// Only half the edge touches: 5 units of shared boundary
		let merger = AdjacencyMerger::new(10.0);
		let groups = merger.merge_adjacent(
			&collection(vec![square(0.0, 0.0, 10.0), square(10.0, 5.0, 10.0)]),
			"test",
		);
		assert_eq!(groups.len(), 2);
		assert_eq!(groups[0].members, vec![0]);
		assert_eq!(groups[1].members, vec![1]);
	}

	#[rstest]
	#[case(5.0, 1)] // threshold at the shared length: merges
	#[case(5.1, 2)] // threshold just above: does not
	fn threshold_is_inclusive(#[case] threshold: f64, #[case] expected_groups: usize) {
		let merger = AdjacencyMerger::new(threshold);
		let groups = merger.merge_adjacent(
			&collection(vec![square(0.0, 0.0, 10.0), square(10.0, 5.0, 10.0)]),
			"test",
		);
		assert_eq!(groups.len(), expected_groups);
	}

	#[test]
	fn corner_touch_never_merges() {
		let merger = AdjacencyMerger::new(0.1);
		let groups = merger.merge_adjacent(
			&collection(vec![square(0.0, 0.0, 10.0), square(10.0, 10.0, 10.0)]),
			"test",
		);
		assert_eq!(groups.len(), 2);
	}

	#[test]
	fn shares_edge_is_symmetric() {
		let merger = AdjacencyMerger::new(10.0);
		let cases = [
			(square(0.0, 0.0, 10.0), square(10.0, 0.0, 10.0)),
			(square(0.0, 0.0, 10.0), square(10.0, 5.0, 10.0)),
			(square(0.0, 0.0, 10.0), square(10.0, 10.0, 10.0)),
			(square(0.0, 0.0, 10.0), square(5.0, 0.0, 10.0)),
		];
		for (a, b) in &cases {
			assert_eq!(
				merger.shares_edge(&a.geometry, &b.geometry),
				merger.shares_edge(&b.geometry, &a.geometry),
			);
		}
	}

	#[test]
	fn every_feature_lands_in_exactly_one_group() {
		// A 3x3 grid of touching squares
		let mut features = Vec::new();
		for row in 0..3 {
			for col in 0..3 {
				features.push(square(f64::from(col) * 10.0, f64::from(row) * 10.0, 10.0));
			}
		}
		let merger = AdjacencyMerger::new(10.0);
		let groups = merger.merge_adjacent(&collection(features), "test");

		let mut seen = vec![0; 9];
		for group in &groups {
			for &member in &group.members {
				seen[member] += 1;
			}
		}
		assert_eq!(seen, vec![1; 9]);
	}

	#[test]
	fn singleton_group_keeps_geometry_untouched() {
		let lonely = square(0.0, 0.0, 10.0);
		let merger = AdjacencyMerger::new(10.0);
		let groups = merger.merge_adjacent(&collection(vec![lonely.clone()]), "test");
		assert_eq!(groups.len(), 1);
		assert_eq!(groups[0].geometry, lonely.geometry);
	}

	#[test]
	fn chain_is_merged_single_pass_only() {
		// Three squares in a row: the first square's bbox only reaches its
		// direct neighbor, so the chain is not transitively closed.
		let merger = AdjacencyMerger::new(10.0);
		let groups = merger.merge_adjacent(
			&collection(vec![
				square(0.0, 0.0, 10.0),
				square(10.0, 0.0, 10.0),
				square(20.0, 0.0, 10.0),
			]),
			"test",
		);
		assert_eq!(groups.len(), 2);
		assert_eq!(groups[0].members, vec![0, 1]);
		assert_eq!(groups[1].members, vec![2]);
	}

	#[test]
	fn two_part_shared_boundary_does_not_merge() {
		// A U-shaped polygon whose two prongs both touch the same rectangle:
		// the shared boundary is two separate 10-unit lines, not one line.
		let u_shape = GeoFeature::from(polygon![
			(x: 0.0, y: 0.0),
			(x: 30.0, y: 0.0),
			(x: 30.0, y: 30.0),
			(x: 20.0, y: 30.0),
			(x: 20.0, y: 10.0),
			(x: 10.0, y: 10.0),
			(x: 10.0, y: 30.0),
			(x: 0.0, y: 30.0),
		]);
		let lid = GeoFeature::from(polygon![
			(x: 0.0, y: 30.0),
			(x: 30.0, y: 30.0),
			(x: 30.0, y: 40.0),
			(x: 0.0, y: 40.0),
		]);
		let merger = AdjacencyMerger::new(10.0);
		assert!(!merger.shares_edge(&u_shape.geometry, &lid.geometry));
		let groups = merger.merge_adjacent(&collection(vec![u_shape, lid]), "test");
		assert_eq!(groups.len(), 2);
	}

	#[test]
	fn shared_edge_with_distant_corner_touch_does_not_merge() {
		// The neighbor shares the full x=10 edge and also reaches over the
		// top to touch the square's far corner at (0, 10): the common
		// boundary is a line plus an isolated point, not a single line.
		let a = square(0.0, 0.0, 10.0);
		let b = GeoFeature::from(polygon![
			(x: 10.0, y: 0.0),
			(x: 20.0, y: 0.0),
			(x: 20.0, y: 15.0),
			(x: 1.0, y: 15.0),
			(x: 0.0, y: 10.0),
			(x: 10.0, y: 11.0),
		]);
		let merger = AdjacencyMerger::new(10.0);
		assert!(!merger.shares_edge(&a.geometry, &b.geometry));
		let groups = merger.merge_adjacent(&collection(vec![a, b]), "test");
		assert_eq!(groups.len(), 2);
	}

	#[test]
	fn overlapping_polygons_do_not_merge() {
		let merger = AdjacencyMerger::new(1.0);
		let groups = merger.merge_adjacent(
			&collection(vec![square(0.0, 0.0, 10.0), square(5.0, 0.0, 10.0)]),
			"test",
		);
		assert_eq!(groups.len(), 2);
	}

	#[test]
	fn merged_group_union_covers_both_squares() {
		let merger = AdjacencyMerger::new(10.0);
		let groups = merger.merge_adjacent(
			&collection(vec![square(0.0, 0.0, 10.0), square(10.0, 0.0, 10.0)]),
			"test",
		);
		assert_eq!(groups.len(), 1);
		assert!((groups[0].geometry.unsigned_area() - 200.0).abs() < 1e-6);
		// The union dissolves the internal edge into one polygon
		assert_eq!(groups[0].geometry.0.len(), 1);
	}

	#[test]
	fn empty_geometry_is_skipped() {
		let merger = AdjacencyMerger::new(10.0);
		let groups = merger.merge_adjacent(
			&collection(vec![
				GeoFeature::from(MultiPolygon::<f64>::new(vec![])),
				square(0.0, 0.0, 10.0),
			]),
			"test",
		);
		assert_eq!(groups.len(), 1);
		assert_eq!(groups[0].members, vec![1]);
	}
}

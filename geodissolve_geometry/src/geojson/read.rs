use crate::crs::Crs;
use crate::geo::{FeatureCollection, GeoFeature, GeoProperties, GeoValue};
use anyhow::{Context, Result, bail, ensure};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde_json::Value;
use std::io::Read;

/// Read a GeoJSON FeatureCollection.
///
/// `default_crs` applies when the document carries no `crs` member (plain
/// RFC 7946 documents); a named `crs` member overrides it.
pub fn read_geojson(mut reader: impl Read, default_crs: Crs) -> Result<FeatureCollection> {
	let mut json = String::new();
	reader.read_to_string(&mut json).context("reading GeoJSON input")?;
	parse_geojson(&json, default_crs)
}

pub fn parse_geojson(json: &str, default_crs: Crs) -> Result<FeatureCollection> {
	let root: Value = serde_json::from_str(json).context("parsing GeoJSON document")?;

	ensure!(
		root.get("type").and_then(Value::as_str) == Some("FeatureCollection"),
		"type must be 'FeatureCollection'"
	);

	let crs = match root.get("crs") {
		Some(member) => parse_crs_member(member)?,
		None => default_crs,
	};

	let mut collection = FeatureCollection::new(crs);
	let members = root
		.get("features")
		.and_then(Value::as_array)
		.context("FeatureCollection must have a 'features' array")?;

	for (index, member) in members.iter().enumerate() {
		match parse_feature(member).with_context(|| format!("parsing feature {index}"))? {
			Some(feature) => collection.push(feature),
			None => log::warn!("skipping feature {index}: no polygon geometry"),
		}
	}

	Ok(collection)
}

/// Accepts the legacy named-CRS member, e.g.
/// `{"type":"name","properties":{"name":"urn:ogc:def:crs:EPSG::25832"}}`.
fn parse_crs_member(member: &Value) -> Result<Crs> {
	let name = member
		.pointer("/properties/name")
		.and_then(Value::as_str)
		.context("crs member must carry properties.name")?;
	let code = name
		.rsplit(':')
		.find(|part| !part.is_empty())
		.and_then(|part| part.parse::<u32>().ok())
		.with_context(|| format!("cannot extract an EPSG code from '{name}'"))?;
	Crs::from_epsg(code)
}

/// Returns `Ok(None)` when the member has no polygonal geometry.
fn parse_feature(member: &Value) -> Result<Option<GeoFeature>> {
	ensure!(
		member.get("type").and_then(Value::as_str) == Some("Feature"),
		"feature member must have type 'Feature'"
	);

	let Some(geometry) = parse_geometry(member.get("geometry"))? else {
		return Ok(None);
	};

	let mut feature = GeoFeature::from(geometry);
	if let Some(id) = member.get("id").and_then(Value::as_u64) {
		feature.set_id(id);
	}
	if let Some(properties) = member.get("properties").and_then(Value::as_object) {
		feature.set_properties(
			properties
				.iter()
				.map(|(key, value)| (key.clone(), value_from_json(value)))
				.collect::<GeoProperties>(),
		);
	}
	Ok(Some(feature))
}

fn parse_geometry(member: Option<&Value>) -> Result<Option<MultiPolygon<f64>>> {
	let Some(member) = member else { return Ok(None) };
	if member.is_null() {
		return Ok(None);
	}

	let geometry_type = member
		.get("type")
		.and_then(Value::as_str)
		.context("geometry must have a type")?;
	let coordinates = member.get("coordinates").context("geometry must have coordinates")?;

	match geometry_type {
		"Polygon" => Ok(Some(MultiPolygon::new(vec![parse_polygon(coordinates)?]))),
		"MultiPolygon" => {
			let rings = coordinates
				.as_array()
				.context("MultiPolygon coordinates must be an array")?;
			let polygons = rings.iter().map(parse_polygon).collect::<Result<Vec<_>>>()?;
			Ok(Some(MultiPolygon::new(polygons)))
		}
		other => {
			log::warn!("unsupported geometry type '{other}'");
			Ok(None)
		}
	}
}

fn parse_polygon(coordinates: &Value) -> Result<Polygon<f64>> {
	let rings = coordinates
		.as_array()
		.context("Polygon coordinates must be an array of rings")?;
	ensure!(!rings.is_empty(), "Polygon must have at least one ring");

	let exterior = parse_ring(&rings[0])?;
	let interiors = rings[1..].iter().map(parse_ring).collect::<Result<Vec<_>>>()?;
	Ok(Polygon::new(exterior, interiors))
}

fn parse_ring(ring: &Value) -> Result<LineString<f64>> {
	let positions = ring.as_array().context("ring must be an array of positions")?;
	let coords = positions
		.iter()
		.map(|position| {
			let position = position.as_array().context("position must be an array")?;
			ensure!(position.len() >= 2, "position must have at least two ordinates");
			match (position[0].as_f64(), position[1].as_f64()) {
				(Some(x), Some(y)) => Ok(Coord { x, y }),
				_ => bail!("position ordinates must be numbers"),
			}
		})
		.collect::<Result<Vec<_>>>()?;
	Ok(LineString::new(coords))
}

fn value_from_json(value: &Value) -> GeoValue {
	match value {
		Value::Null => GeoValue::Null,
		Value::Bool(v) => GeoValue::Bool(*v),
		Value::Number(number) => {
			if let Some(v) = number.as_u64() {
				GeoValue::UInt(v)
			} else if let Some(v) = number.as_i64() {
				GeoValue::Int(v)
			} else {
				GeoValue::Double(number.as_f64().unwrap_or(f64::NAN))
			}
		}
		// Strings stay strings, except for ISO dates
		Value::String(v) => match GeoValue::parse_str(v) {
			GeoValue::Date(date) => GeoValue::Date(date),
			_ => GeoValue::String(v.clone()),
		},
		other => GeoValue::String(other.to_string()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const TWO_SQUARES: &str = r#"{
		"type": "FeatureCollection",
		"crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::25832"}},
		"features": [
			{
				"type": "Feature",
				"id": 1,
				"geometry": {"type": "Polygon", "coordinates": [[[0,0],[10,0],[10,10],[0,10],[0,0]]]},
				"properties": {"gridcode": 12, "registered": "2023-11-05", "name": "a"}
			},
			{
				"type": "Feature",
				"geometry": {"type": "MultiPolygon", "coordinates": [[[[20,0],[30,0],[30,10],[20,10],[20,0]]]]},
				"properties": {"gridcode": 12}
			}
		]
	}"#;

	#[test]
	fn parses_collection_with_crs_member() {
		let collection = parse_geojson(TWO_SQUARES, Crs::Wgs84).unwrap();
		assert_eq!(collection.crs, Crs::Utm32N);
		assert_eq!(collection.len(), 2);
		assert_eq!(collection.features[0].id, Some(1));
		assert_eq!(
			collection.features[0].properties.get("gridcode"),
			Some(&GeoValue::UInt(12))
		);
		assert!(matches!(
			collection.features[0].properties.get("registered"),
			Some(GeoValue::Date(_))
		));
		assert_eq!(collection.features[1].geometry.0.len(), 1);
	}

	#[test]
	fn missing_crs_member_falls_back_to_default() {
		let json = r#"{"type": "FeatureCollection", "features": []}"#;
		let collection = parse_geojson(json, Crs::Utm32N).unwrap();
		assert_eq!(collection.crs, Crs::Utm32N);
		assert!(collection.is_empty());
	}

	#[test]
	fn non_polygon_members_are_skipped() {
		let json = r#"{
			"type": "FeatureCollection",
			"features": [
				{"type": "Feature", "geometry": {"type": "Point", "coordinates": [1, 2]}, "properties": {}},
				{"type": "Feature", "geometry": null, "properties": {}},
				{"type": "Feature", "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]}, "properties": {}}
			]
		}"#;
		let collection = parse_geojson(json, Crs::Utm32N).unwrap();
		assert_eq!(collection.len(), 1);
	}

	#[test]
	fn rejects_non_feature_collection() {
		let json = r#"{"type": "Feature"}"#;
		assert!(parse_geojson(json, Crs::Utm32N).is_err());
	}
}

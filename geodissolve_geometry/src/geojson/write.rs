use crate::geo::{FeatureCollection, GeoFeature, GeoValue};
use anyhow::{Context, Result};
use geo::{LineString, Polygon};
use serde_json::{Map, Number, Value, json};
use std::io::Write;

/// Write a collection as a GeoJSON FeatureCollection, including a named
/// `crs` member so downstream consumers know which system the coordinates
/// are expressed in.
pub fn write_geojson(collection: &FeatureCollection, writer: impl Write) -> Result<()> {
	serde_json::to_writer(writer, &to_geojson_value(collection)).context("writing GeoJSON output")
}

pub fn to_geojson_value(collection: &FeatureCollection) -> Value {
	json!({
		"type": "FeatureCollection",
		"crs": {
			"type": "name",
			"properties": { "name": format!("urn:ogc:def:crs:EPSG::{}", collection.crs.epsg()) }
		},
		"features": collection.features.iter().map(feature_to_value).collect::<Vec<_>>(),
	})
}

fn feature_to_value(feature: &GeoFeature) -> Value {
	let mut member = Map::new();
	member.insert("type".to_string(), Value::from("Feature"));
	if let Some(id) = feature.id {
		member.insert("id".to_string(), Value::from(id));
	}
	member.insert(
		"geometry".to_string(),
		json!({
			"type": "MultiPolygon",
			"coordinates": feature.geometry.iter().map(polygon_to_value).collect::<Vec<_>>(),
		}),
	);
	member.insert(
		"properties".to_string(),
		Value::Object(
			feature
				.properties
				.iter()
				.map(|(key, value)| (key.clone(), value_to_json(value)))
				.collect(),
		),
	);
	Value::Object(member)
}

fn polygon_to_value(polygon: &Polygon<f64>) -> Value {
	let mut rings = vec![ring_to_value(polygon.exterior())];
	rings.extend(polygon.interiors().iter().map(ring_to_value));
	Value::Array(rings)
}

fn ring_to_value(ring: &LineString<f64>) -> Value {
	Value::Array(ring.0.iter().map(|c| json!([c.x, c.y])).collect())
}

fn value_to_json(value: &GeoValue) -> Value {
	match value {
		GeoValue::Null => Value::Null,
		GeoValue::Bool(v) => Value::from(*v),
		GeoValue::Int(v) => Value::from(*v),
		GeoValue::UInt(v) => Value::from(*v),
		GeoValue::Double(v) => Number::from_f64(*v).map_or(Value::Null, Value::Number),
		GeoValue::String(v) => Value::from(v.clone()),
		GeoValue::Date(v) => Value::from(v.to_string()),
	}
}

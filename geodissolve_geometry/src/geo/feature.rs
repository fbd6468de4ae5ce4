use super::{GeoProperties, GeoValue};
use geo::{Area, MultiPolygon, Polygon};
use std::fmt::Debug;

/// One raw spatial record: a polygon or multipolygon plus its attributes.
///
/// Single polygons are normalized into one-element multipolygons so every
/// downstream operation works on a uniform shape. A feature never carries a
/// null geometry; "no geometry found" upstream is an ordinary `None` branch
/// before a feature is constructed.
#[derive(Clone, Debug, PartialEq)]
pub struct GeoFeature {
	pub id: Option<u64>,
	pub geometry: MultiPolygon<f64>,
	pub properties: GeoProperties,
}

impl GeoFeature {
	pub fn new(geometry: MultiPolygon<f64>) -> Self {
		Self {
			id: None,
			geometry,
			properties: GeoProperties::new(),
		}
	}

	pub fn set_id(&mut self, id: u64) {
		self.id = Some(id);
	}

	pub fn set_properties(&mut self, properties: GeoProperties) {
		self.properties = properties;
	}

	pub fn set_property<T>(&mut self, key: String, value: T)
	where
		GeoValue: From<T>,
	{
		self.properties.insert(key, GeoValue::from(value));
	}

	/// True polygon area in squared units of the feature's CRS.
	pub fn area(&self) -> f64 {
		self.geometry.unsigned_area()
	}
}

impl From<Polygon<f64>> for GeoFeature {
	fn from(polygon: Polygon<f64>) -> Self {
		Self::new(MultiPolygon::new(vec![polygon]))
	}
}

impl From<MultiPolygon<f64>> for GeoFeature {
	fn from(geometry: MultiPolygon<f64>) -> Self {
		Self::new(geometry)
	}
}

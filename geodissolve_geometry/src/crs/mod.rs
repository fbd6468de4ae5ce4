//! Coordinate reference systems used by the pipeline.
//!
//! Exactly two systems are in play: the metric working CRS (UTM zone 32N,
//! EPSG:25832) in which all area and adjacency math happens, and the
//! geographic output CRS (WGS84, EPSG:4326) required by downstream storage.
//! Conversion uses the Krüger series for the transverse Mercator projection
//! on the WGS84 ellipsoid, accurate to well below a millimeter over the
//! zone's extent.

use anyhow::{Result, bail};
use geo::Coord;
use std::fmt::{Display, Formatter};

/// WGS84 semi-major axis in meters.
const A: f64 = 6_378_137.0;
/// WGS84 flattening.
const F: f64 = 1.0 / 298.257_223_563;
/// UTM scale factor on the central meridian.
const K0: f64 = 0.9996;
/// UTM false easting in meters.
const E0: f64 = 500_000.0;
/// Central meridian of UTM zone 32 in radians (9°E).
const LON0: f64 = 9.0 * std::f64::consts::PI / 180.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Crs {
	/// ETRS89 / UTM zone 32N (EPSG:25832), meters.
	Utm32N,
	/// WGS84 geographic (EPSG:4326), degrees.
	Wgs84,
}

impl Crs {
	pub fn epsg(self) -> u32 {
		match self {
			Crs::Utm32N => 25832,
			Crs::Wgs84 => 4326,
		}
	}

	pub fn from_epsg(code: u32) -> Result<Self> {
		match code {
			25832 => Ok(Crs::Utm32N),
			4326 => Ok(Crs::Wgs84),
			_ => bail!("unsupported EPSG code: {code}"),
		}
	}

	/// True for systems in which coordinates are meters and lengths/areas
	/// are directly meaningful.
	pub fn is_metric(self) -> bool {
		matches!(self, Crs::Utm32N)
	}
}

impl Display for Crs {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "EPSG:{}", self.epsg())
	}
}

/// Transform a single coordinate between the two supported systems.
pub fn transform_coord(c: Coord<f64>, from: Crs, to: Crs) -> Coord<f64> {
	match (from, to) {
		(Crs::Utm32N, Crs::Wgs84) => utm32n_to_wgs84(c),
		(Crs::Wgs84, Crs::Utm32N) => wgs84_to_utm32n(c),
		_ => c,
	}
}

// Krüger series coefficients on the third flattening n, to n^4. The n^4
// terms contribute below 1e-9 degrees for n ≈ 1.68e-3.
fn flattening_series() -> (f64, [f64; 4], [f64; 4], [f64; 4]) {
	let n = F / (2.0 - F);
	let n2 = n * n;
	let n3 = n2 * n;
	let n4 = n3 * n;

	// Rectifying radius.
	let a_bar = A / (1.0 + n) * (1.0 + n2 / 4.0 + n4 / 64.0);

	let alpha = [
		n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0 + 41.0 * n4 / 180.0,
		13.0 * n2 / 48.0 - 3.0 * n3 / 5.0 + 557.0 * n4 / 1440.0,
		61.0 * n3 / 240.0 - 103.0 * n4 / 140.0,
		49561.0 * n4 / 161280.0,
	];
	let beta = [
		n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0 - n4 / 360.0,
		n2 / 48.0 + n3 / 15.0 - 437.0 * n4 / 1440.0,
		17.0 * n3 / 480.0 - 37.0 * n4 / 840.0,
		4397.0 * n4 / 161280.0,
	];
	let delta = [
		2.0 * n - 2.0 * n2 / 3.0 - 2.0 * n3 + 116.0 * n4 / 45.0,
		7.0 * n2 / 3.0 - 8.0 * n3 / 5.0 - 227.0 * n4 / 45.0,
		56.0 * n3 / 15.0 - 136.0 * n4 / 35.0,
		4279.0 * n4 / 630.0,
	];

	(a_bar, alpha, beta, delta)
}

/// Forward projection: `c` is (longitude, latitude) in degrees, result is
/// (easting, northing) in meters.
fn wgs84_to_utm32n(c: Coord<f64>) -> Coord<f64> {
	let (a_bar, alpha, _, _) = flattening_series();
	let e = (F * (2.0 - F)).sqrt();

	let lat = c.y.to_radians();
	let dl = c.x.to_radians() - LON0;

	// Conformal latitude, expressed through its tangent.
	let t = (lat.sin().atanh() - e * (e * lat.sin()).atanh()).sinh();

	let xi_p = t.atan2(dl.cos());
	let eta_p = (dl.sin() / (t * t + dl.cos() * dl.cos()).sqrt()).asinh();

	let mut xi = xi_p;
	let mut eta = eta_p;
	for (j, a_j) in alpha.iter().enumerate() {
		let k = 2.0 * (j + 1) as f64;
		xi += a_j * (k * xi_p).sin() * (k * eta_p).cosh();
		eta += a_j * (k * xi_p).cos() * (k * eta_p).sinh();
	}

	Coord {
		x: E0 + K0 * a_bar * eta,
		y: K0 * a_bar * xi,
	}
}

/// Inverse projection: `c` is (easting, northing) in meters, result is
/// (longitude, latitude) in degrees.
fn utm32n_to_wgs84(c: Coord<f64>) -> Coord<f64> {
	let (a_bar, _, beta, delta) = flattening_series();

	let xi = c.y / (K0 * a_bar);
	let eta = (c.x - E0) / (K0 * a_bar);

	let mut xi_p = xi;
	let mut eta_p = eta;
	for (j, b_j) in beta.iter().enumerate() {
		let k = 2.0 * (j + 1) as f64;
		xi_p -= b_j * (k * xi).sin() * (k * eta).cosh();
		eta_p -= b_j * (k * xi).cos() * (k * eta).sinh();
	}

	// Conformal latitude back to geodetic latitude.
	let chi = (xi_p.sin() / eta_p.cosh()).asin();
	let mut lat = chi;
	for (j, d_j) in delta.iter().enumerate() {
		let k = 2.0 * (j + 1) as f64;
		lat += d_j * (k * chi).sin();
	}

	let lon = LON0 + eta_p.sinh().atan2(xi_p.cos());

	Coord {
		x: lon.to_degrees(),
		y: lat.to_degrees(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use approx::assert_relative_eq;

	#[test]
	fn epsg_codes_round_trip() {
		assert_eq!(Crs::from_epsg(25832).unwrap(), Crs::Utm32N);
		assert_eq!(Crs::from_epsg(4326).unwrap(), Crs::Wgs84);
		assert!(Crs::from_epsg(3857).is_err());
		assert_eq!(Crs::Utm32N.to_string(), "EPSG:25832");
		assert_eq!(Crs::Wgs84.to_string(), "EPSG:4326");
	}

	#[test]
	fn central_meridian_maps_to_false_easting() {
		let utm = transform_coord(Coord { x: 9.0, y: 56.0 }, Crs::Wgs84, Crs::Utm32N);
		assert_relative_eq!(utm.x, 500_000.0, epsilon = 1e-6);
		assert!(utm.y > 6_000_000.0 && utm.y < 6_400_000.0);
	}

	#[test]
	fn easting_grows_eastwards() {
		let west = transform_coord(Coord { x: 8.0, y: 56.0 }, Crs::Wgs84, Crs::Utm32N);
		let east = transform_coord(Coord { x: 10.0, y: 56.0 }, Crs::Wgs84, Crs::Utm32N);
		assert!(west.x < 500_000.0);
		assert!(east.x > 500_000.0);
	}

	#[test]
	fn degree_round_trip_is_tight() {
		// Points across Denmark's extent in zone 32
		for (lon, lat) in [(8.2, 55.0), (9.0, 56.0), (10.5, 57.5), (12.5, 55.7)] {
			let geo = Coord { x: lon, y: lat };
			let utm = transform_coord(geo, Crs::Wgs84, Crs::Utm32N);
			let back = transform_coord(utm, Crs::Utm32N, Crs::Wgs84);
			assert_relative_eq!(back.x, geo.x, epsilon = 1e-6);
			assert_relative_eq!(back.y, geo.y, epsilon = 1e-6);
		}
	}

	#[test]
	fn meter_round_trip_is_tight() {
		let utm = Coord { x: 530_000.0, y: 6_320_000.0 };
		let geo = transform_coord(utm, Crs::Utm32N, Crs::Wgs84);
		let back = transform_coord(geo, Crs::Wgs84, Crs::Utm32N);
		assert_relative_eq!(back.x, utm.x, epsilon = 1e-3);
		assert_relative_eq!(back.y, utm.y, epsilon = 1e-3);
	}

	#[test]
	fn identity_transform_returns_input() {
		let c = Coord { x: 1.0, y: 2.0 };
		assert_eq!(transform_coord(c, Crs::Wgs84, Crs::Wgs84), c);
	}
}

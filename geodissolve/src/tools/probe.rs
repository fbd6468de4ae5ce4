use anyhow::{Context, Result};
use clap::Args;
use geodissolve_geometry::{Crs, geojson, stats};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

#[derive(Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	/// GeoJSON file you want to probe
	#[arg(required = true)]
	input: PathBuf,

	/// EPSG code assumed when the input file carries no crs member
	#[arg(long, default_value_t = 25832)]
	source_epsg: u32,
}

pub fn run(arguments: &Subcommand) -> Result<()> {
	let default_crs = Crs::from_epsg(arguments.source_epsg)?;
	let file = File::open(&arguments.input)
		.with_context(|| format!("opening {}", arguments.input.display()))?;
	let collection = geojson::read_geojson(BufReader::new(file), default_crs)?;

	let label = arguments.input.display().to_string();
	let summary = stats::report(&collection, &label);
	println!("{label} ({}):", collection.crs);
	println!("{summary}");
	Ok(())
}

#[cfg(test)]
mod tests {
	use crate::tests::run_command;
	use std::fs;

	#[test]
	fn probes_a_geojson_file() {
		let dir = tempfile::tempdir().unwrap();
		let input = dir.path().join("input.geojson");
		fs::write(
			&input,
			r#"{"type":"FeatureCollection","features":[
				{"type":"Feature","geometry":{"type":"Polygon","coordinates":
					[[[0,0],[10,0],[10,10],[0,10],[0,0]]]},"properties":{}}
			]}"#,
		)
		.unwrap();

		run_command(vec!["geodissolve", "probe", "-q", input.to_str().unwrap()]).unwrap();
	}

	#[test]
	fn missing_file_fails() {
		let result = run_command(vec!["geodissolve", "probe", "-q", "/no/such/file.geojson"]);
		assert!(result.is_err());
	}
}

use anyhow::{Context, Result};
use clap::Args;
use geodissolve_geometry::{Crs, geojson};
use geodissolve_pipeline::{DissolveConfig, DissolvePipeline};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

#[derive(Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	/// GeoJSON file with the raw polygons
	#[arg(required = true)]
	input: PathBuf,

	/// GeoJSON file the dissolved polygons are written to
	#[arg(long, short = 'o', required = true)]
	output: PathBuf,

	/// dataset label used in logs and error messages
	#[arg(long, default_value = "dataset")]
	dataset: String,

	/// minimum shared-edge length in meters for two polygons to merge
	#[arg(long, default_value_t = 10.0)]
	threshold: f64,

	/// EPSG code assumed when the input file carries no crs member
	#[arg(long, default_value_t = 25832)]
	source_epsg: u32,

	/// property receiving the sequential id of each output feature
	#[arg(long, default_value = "feature_id")]
	id_field: String,
}

pub fn run(arguments: &Subcommand) -> Result<()> {
	let default_crs = Crs::from_epsg(arguments.source_epsg)?;
	let file = File::open(&arguments.input)
		.with_context(|| format!("opening {}", arguments.input.display()))?;
	let raw = geojson::read_geojson(BufReader::new(file), default_crs)?;

	let pipeline = DissolvePipeline::new(DissolveConfig {
		edge_share_threshold: arguments.threshold,
		id_field: arguments.id_field.clone(),
		..DissolveConfig::default()
	});

	match pipeline.dissolve(&raw, &arguments.dataset)? {
		Some(dissolved) => {
			let file = File::create(&arguments.output)
				.with_context(|| format!("creating {}", arguments.output.display()))?;
			geojson::write_geojson(&dissolved, BufWriter::new(file))?;
			log::info!(
				"{}: wrote {} features to {}",
				arguments.dataset,
				dissolved.len(),
				arguments.output.display()
			);
		}
		None => log::warn!("{}: empty input, no output written", arguments.dataset),
	}
	Ok(())
}

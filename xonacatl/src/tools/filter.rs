use anyhow::{Context, Result};
use std::{
	fs::File,
	io::{self, BufReader, BufWriter, Read, Write},
	path::PathBuf,
};
use xonacatl_layers::{LayerCopier, LayerSet, TileCopier};

#[derive(clap::Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	/// Tile format: json, topojson, mvt or mvtb. Other formats are copied unchanged.
	#[arg(short, long)]
	pub format: String,

	/// Comma separated list of layers to keep, or "all".
	#[arg(short, long)]
	pub layers: String,

	/// Tile to read. Reads stdin if missing.
	pub input: Option<PathBuf>,

	/// File to write. Writes stdout if missing.
	#[arg(short, long)]
	pub output: Option<PathBuf>,
}

pub fn run(arguments: &Subcommand) -> Result<()> {
	let copier = TileCopier::for_request(&arguments.format, LayerSet::from_param(&arguments.layers));
	log::debug!("filter with {copier:?}");

	let mut source: Box<dyn Read> = match &arguments.input {
		Some(path) => Box::new(BufReader::new(
			File::open(path).with_context(|| format!("failed to open {path:?}"))?,
		)),
		None => Box::new(io::stdin().lock()),
	};
	let mut sink: Box<dyn Write> = match &arguments.output {
		Some(path) => Box::new(BufWriter::new(
			File::create(path).with_context(|| format!("failed to create {path:?}"))?,
		)),
		None => Box::new(io::stdout().lock()),
	};

	copier
		.copy_layers(&mut source, &mut sink)
		.with_context(|| format!("failed to filter {} tile", arguments.format))
}

//! rgk-bmdl - inspect and rewrite 3D MovieMaker BRender models

use anyhow::{
	Context,
	Result
};

use clap::{
	Parser,
	Subcommand
};

use std::path::PathBuf;

use ultraviolet::vec::Vec3;

use rgk_models_3dmm::{
	export_model,
	ExportCfg,
	import_model,
	import_models
};

#[derive(Parser)]
#[command(name = "rgk-bmdl")]
#[command(about = "3D MovieMaker BRender model tool")]
#[command(version)]
struct Cli {
	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Print the contents summary of a BMDL file
	Info {
		input: PathBuf,
	},

	/// Read BMDL files and write them back out, merged or one per input
	Convert {
		/// Input .bmdl files
		#[arg(required = true)]
		inputs: Vec<PathBuf>,

		/// Output .bmdl file; with --separate only its directory is used
		#[arg(short, long)]
		output: PathBuf,

		/// Write each input to its own file, named after the input
		#[arg(short, long)]
		separate: bool,
	},
}

fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::from_default_env()
				.add_directive(tracing::Level::INFO.into()),
		)
		.init();

	let cli = Cli::parse();

	match cli.command {
		Commands::Info { input } => {
			let node = import_model(&input).with_context(|| format!("Failed to read {:?}", input))?;
			let mesh = node.mesh().context("Model holds no geometry")?;

			let mut min = Vec3::broadcast(f32::INFINITY);
			let mut max = Vec3::broadcast(f32::NEG_INFINITY);
			for v in mesh.vertices.iter() {
				min = min.min_by_component(*v);
				max = max.max_by_component(*v);
			}

			println!("name:     {}", node.name);
			println!("vertices: {}", mesh.vertices.len());
			println!("faces:    {}", mesh.faces.len());
			if !mesh.vertices.is_empty() {
				println!("bounds:   ({}, {}, {}) - ({}, {}, {})", min.x, min.y, min.z, max.x, max.y, max.z);
			}
		},
		Commands::Convert { inputs, output, separate } => {
			let nodes = import_models(&inputs).context("Import failed")?;

			let cfg = if separate {
				ExportCfg::separate()
			} else {
				ExportCfg::default()
			};

			let written = export_model(&output, &nodes, &cfg)
				.with_context(|| format!("Failed to export to {:?}", output))?;
			tracing::info!("Done! {} file(s) written", written.len());
		},
	}

	Ok(())
}

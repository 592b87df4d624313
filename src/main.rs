use std::{path::PathBuf, sync::Arc, time::Duration};

use breakout_fixtures::{Catalog, GenerateOptions, RootMarker, generate, tree};
use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, bail};
pub mod config;
use config::{LiveSettings, SettingsFlags};

#[derive(Parser, Default)]
#[command(author, version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")"), about, long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,
	#[command(flatten)]
	settings: SettingsFlags,
}

#[derive(Subcommand)]
enum Commands {
	/// Build the default scenario set (the default when no command is given)
	Generate(GenerateArgs),
	/// Print the trees and escape checks of a generated output root
	Inspect {
		/// Output root to describe
		dir: PathBuf,
	},
}

#[derive(Args, Default)]
struct GenerateArgs {
	/// Output root [default: configured `output_root`]
	#[arg(short, long)]
	output: Option<PathBuf>,
	/// Keep building the remaining scenarios after an I/O failure
	#[arg(long)]
	keep_going: bool,
	/// Mark scenario roots with a real `git init`
	#[arg(long)]
	git_init: bool,
}

fn main() -> Result<()> {
	v_utils::clientside!();
	let cli = Cli::parse();
	let live_settings = match LiveSettings::new(cli.settings, Duration::from_secs(5)) {
		Ok(ls) => Arc::new(ls),
		Err(e) => {
			eprintln!("Error reading config: {e}");
			for cause in e.chain().skip(1) {
				eprintln!("  Caused by: {cause}");
			}
			std::process::exit(2);
		}
	};

	match cli.command {
		Some(Commands::Inspect { dir }) => {
			print!("{}", tree::describe(&dir)?);
			Ok(())
		}
		Some(Commands::Generate(args)) => run_generate(live_settings, args),
		None => run_generate(live_settings, GenerateArgs::default()),
	}
}

fn run_generate(settings: Arc<LiveSettings>, args: GenerateArgs) -> Result<()> {
	let config = settings.config();
	let output_root = match args.output {
		Some(dir) => dir,
		None => PathBuf::from(&config.output_root),
	};
	let marker = if args.git_init || config.use_git_init { RootMarker::GitInit } else { RootMarker::GitSkeleton };

	let catalog = Catalog::default_set().with_marker(marker);
	let report = generate(&output_root, &catalog, &GenerateOptions { keep_going: args.keep_going })?;
	print!("{report}");

	if !report.is_success() {
		let failed = report.failures().map(|o| o.name.as_str()).collect::<Vec<_>>().join(", ");
		bail!("failed to build under '{}': {failed}", output_root.display());
	}
	Ok(())
}

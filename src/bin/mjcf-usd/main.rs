//! mjcf-usd - convert a MuJoCo MJCF file into a layered USD asset.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{error, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mjcf_usd::{ConvertOptions, Converter};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("MJCF_USD_BUILD_TARGET"),
    ", built ",
    env!("MJCF_USD_BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(author, version, long_version = LONG_VERSION, about, long_about = None)]
struct Args {
    /// MJCF file to convert
    input: PathBuf,

    /// Directory the asset is written into
    output_dir: PathBuf,

    /// Write one flattened file instead of the layered payload structure
    #[arg(long)]
    no_layer_structure: bool,

    /// Skip the physics scene
    #[arg(long)]
    no_physics_scene: bool,

    /// Comment stored as the layer doc string
    #[arg(long)]
    comment: Option<String>,

    /// JSON options file; flags given on the command line win
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Warnings and errors only
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn options(&self) -> anyhow::Result<ConvertOptions> {
        let mut options = match &self.config {
            Some(path) => ConvertOptions::load(path)
                .with_context(|| format!("Failed to load options from {}", path.display()))?,
            None => ConvertOptions::default(),
        };
        if self.no_layer_structure {
            options.layer_structure = false;
        }
        if self.no_physics_scene {
            options.scene = false;
        }
        if let Some(comment) = &self.comment {
            options.comment = comment.clone();
        }
        Ok(options)
    }

    fn log_level(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn run(args: &Args) -> anyhow::Result<PathBuf> {
    let options = args.options()?;
    let converter = Converter::new(options);
    let model = mjcf_usd::mjcf::load(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let asset = converter.convert_model(&model)?;
    let path = asset
        .write(&args.output_dir)
        .with_context(|| format!("Failed to write {}", args.output_dir.display()))?;
    if !asset.warnings.is_empty() {
        warn!("{} warning(s), see above", asset.warnings.len());
    }
    Ok(path)
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_level());
    match run(&args) {
        Ok(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_version_names_target() {
        assert!(LONG_VERSION.starts_with(env!("CARGO_PKG_VERSION")));
        assert!(LONG_VERSION.contains(env!("MJCF_USD_BUILD_TARGET")));
    }

    #[test]
    fn test_flags_override_options() {
        let args = Args::parse_from(["mjcf-usd", "in.xml", "out", "--no-layer-structure", "--comment", "hi", "-q"]);
        let options = args.options().unwrap();
        assert!(!options.layer_structure);
        assert!(options.scene);
        assert_eq!(options.comment, "hi");
        assert_eq!(args.log_level(), "warn");
    }
}

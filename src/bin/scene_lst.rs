//! Generate the Land Surface Temperature product of one Landsat scene

use anyhow::Context;
use clap::Parser;
use scene_lst::io::RasterDataType;
use scene_lst::{LstPipeline, ProcessingConfig, SceneFiles};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Scene-based Land Surface Temperature")]
struct Args {
    /// ESPA metadata XML of the scene
    #[arg(long)]
    xml: PathBuf,

    /// DEM co-registered to the thermal band (meters)
    #[arg(long)]
    dem: PathBuf,

    /// Sample type of the DEM file
    #[arg(long, default_value = "int16")]
    dem_type: RasterDataType,

    /// Emissivity co-registered to the thermal band
    #[arg(long)]
    emissivity: PathBuf,

    /// Sample type of the emissivity file
    #[arg(long, default_value = "float32")]
    emissivity_type: RasterDataType,

    /// Processing configuration (YAML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output directory, defaults to the XML directory
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Keep case directories and the atmospheric parameter table
    #[arg(long, default_value_t = false)]
    keep_intermediate_products: bool,

    /// Debug logging
    #[arg(long, default_value_t = false)]
    debug: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut config = ProcessingConfig::load(args.config.as_deref()).context("Loading processing configuration")?;
    if args.keep_intermediate_products {
        config.keep_intermediate = true;
    }

    let files = SceneFiles {
        xml: args.xml.clone(),
        dem: args.dem,
        dem_type: args.dem_type,
        emissivity: args.emissivity,
        emissivity_type: args.emissivity_type,
        output_dir: args.output_dir,
    };

    let outputs = LstPipeline::new(config)
        .run_files(&files)
        .with_context(|| format!("Processing scene {}", args.xml.display()))?;

    log::info!(
        "Land surface temperature written to {} (quality {})",
        outputs.temperature.display(),
        outputs.quality.display()
    );
    Ok(())
}

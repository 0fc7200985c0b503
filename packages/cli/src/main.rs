#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `line_risk`: scores overhead power line segments for vegetation
//! conflict risk and summarizes the result per neighborhood.
//!
//! Reads four pre-projected `GeoJSON` layers, runs the scoring pipeline
//! and writes CSV tables plus a TOML run summary to an output directory.

mod report;

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};
use line_risk_cli_utils::StageProgress;
use line_risk_config::RunConfig;
use line_risk_io::InputPaths;
use line_risk_scoring::Pipeline;
use line_risk_scoring::risk::top_priority_segments;

#[derive(Parser)]
#[command(name = "line_risk", about = "Power line vegetation conflict risk scoring")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score every overhead segment and write the result tables
    Run {
        /// TOML run configuration (defaults apply when omitted)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Power line `GeoJSON` layer
        #[arg(long)]
        lines: PathBuf,

        /// Tree canopy `GeoJSON` layer
        #[arg(long)]
        canopy: PathBuf,

        /// Fire station and hospital `GeoJSON` layer
        #[arg(long)]
        facilities: PathBuf,

        /// Neighborhood boundary `GeoJSON` layer
        #[arg(long)]
        neighborhoods: PathBuf,

        /// Directory for the output tables
        #[arg(long, default_value = "outputs")]
        output_dir: PathBuf,
    },
    /// Validate a configuration and print the effective values
    CheckConfig {
        /// TOML run configuration
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = line_risk_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            lines,
            canopy,
            facilities,
            neighborhoods,
            output_dir,
        } => {
            let config = load_config(config.as_deref())?;
            let paths = InputPaths {
                lines,
                canopy,
                facilities,
                neighborhoods,
            };
            run(config, &paths, &output_dir, &multi)?;
        }
        Commands::CheckConfig { config } => {
            let config = load_config(config.as_deref())?;
            print!("{}", config.to_toml_string()?);
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<RunConfig, line_risk_config::ConfigError> {
    match path {
        Some(path) => RunConfig::load(path),
        None => {
            log::info!("No config file given; using defaults");
            let config = RunConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

fn run(
    config: RunConfig,
    paths: &InputPaths,
    output_dir: &Path,
    multi: &line_risk_cli_utils::MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();

    let inputs = line_risk_io::load_inputs(paths, &config.input)?;
    let top_n = config.top_n_segments;

    let pipeline = Pipeline::new(config)?.with_progress(StageProgress::stage_bar(multi));
    let output = pipeline.run(inputs)?;

    std::fs::create_dir_all(output_dir)?;

    let scored_path = output_dir.join("scored_segments.csv");
    line_risk_io::write_scored_segments(
        BufWriter::new(File::create(&scored_path)?),
        &output.segments,
        &output.assignments,
    )?;
    log::info!("Saved: {}", scored_path.display());

    let summary_path = output_dir.join("neighborhood_summary.csv");
    line_risk_io::write_neighborhood_summary(
        BufWriter::new(File::create(&summary_path)?),
        &output.neighborhoods,
    )?;
    log::info!("Saved: {}", summary_path.display());

    let top = top_priority_segments(&output.segments, top_n);
    let priority_path = output_dir.join("priority_segments.csv");
    line_risk_io::write_priority_segments(BufWriter::new(File::create(&priority_path)?), &top)?;
    log::info!("Saved: {} ({} segments)", priority_path.display(), top.len());

    let run_summary_path = output_dir.join("run_summary.toml");
    std::fs::write(&run_summary_path, toml::to_string_pretty(&output.summary)?)?;
    log::info!("Saved: {}", run_summary_path.display());

    report::log_summary(&output, &top);
    log::info!("Finished in {:.1}s", start.elapsed().as_secs_f64());

    Ok(())
}

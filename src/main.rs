//! Command-line front end of the routing pipeline.
//!
//! # Usage
//!
//! ```bash
//! plantroute [--config PATH] <IMAGE> [--out DIR] [--force species|disease] \
//!     [--skip-morph] [--batch] [--save-preview]
//! ```
//!
//! Single-image mode writes `<out>/<stem>.json` and prints its path. Batch
//! mode walks a directory, writes one JSON per image plus
//! `batch_summary.json`, and prints a summary.
//!
//! Exit codes: 0 on success, 1 on configuration or pipeline errors, 2 on
//! usage errors.

use clap::Parser;
use plantroute::core::{init_tracing, ConfigLoader, BATCH_SUMMARY_FILE};
use plantroute::domain::RouteDecision;
use plantroute::pipeline::{BatchRunner, RouteOptions, Router};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

/// Command-line arguments
#[derive(Parser)]
#[command(name = "plantroute")]
#[command(about = "Route plant photos to species or disease classification")]
struct Args {
    /// Configuration file (TOML or JSON); searched in the working directory
    /// when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Image file, or a directory with --batch
    image: PathBuf,

    /// Output directory (default: io.outputs_dir)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Route to use regardless of the file name
    #[arg(long)]
    force: Option<RouteDecision>,

    /// Skip leaf segmentation on the disease path
    #[arg(long)]
    skip_morph: bool,

    /// Treat IMAGE as a directory and process every matching file
    #[arg(long)]
    batch: bool,

    /// Save the resized image fed to the model next to the result
    #[arg(long)]
    save_preview: bool,
}

fn usage_error(message: String) -> ExitCode {
    eprintln!("error: {message}");
    ExitCode::from(2)
}

fn main() -> ExitCode {
    let args = Args::parse();

    if !args.image.exists() {
        return usage_error(format!("input not found: {}", args.image.display()));
    }
    if args.batch && !args.image.is_dir() {
        return usage_error(format!(
            "--batch expects a directory, got {}",
            args.image.display()
        ));
    }
    if !args.batch && args.image.is_dir() {
        return usage_error(format!(
            "{} is a directory; pass --batch to process it",
            args.image.display()
        ));
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            ExitCode::from(1)
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = ConfigLoader::discover(args.config.as_deref())?;
    let config = ConfigLoader::load_from_file(&config_path)?;
    init_tracing(&config.logging.level, config.logging.format);
    info!("config loaded from {}", config_path.display());

    let out_dir = args
        .out
        .clone()
        .unwrap_or_else(|| config.io.outputs_dir.clone());
    let save_preview = args.save_preview || config.io.save_preview;

    let mut options = RouteOptions::new();
    if args.skip_morph {
        options = options.skip_morph(true);
    }
    if let Some(route) = args.force {
        options = options.force(route);
    }

    let router = Router::new(config)?;

    if args.batch {
        let summary = BatchRunner::new(router)
            .with_options(options)
            .run(&args.image, &out_dir)?;
        println!("Batch summary");
        println!("  total:   {}", summary.total);
        println!("  success: {}", summary.success);
        println!("  failed:  {}", summary.failed);
        if let (Some(accuracy), Some(correct), Some(incorrect)) =
            (summary.accuracy, summary.correct, summary.incorrect)
        {
            println!(
                "  accuracy: {:.2}% ({correct} correct, {incorrect} incorrect)",
                accuracy * 100.0
            );
        }
        println!("  summary: {}", out_dir.join(BATCH_SUMMARY_FILE).display());
        return Ok(());
    }

    let stem = file_stem(&args.image);
    if save_preview {
        options = options.preview_path(out_dir.join(format!("{stem}_preprocessed.png")));
    }
    let result = router.route(&args.image, &options)?;
    let json_path = out_dir.join(format!("{stem}.json"));
    result.write_json(&json_path)?;
    println!("{}", json_path.display());
    Ok(())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
}

//! qtc - Quadtree image codec command line tool.
//!
//! Compresses square power-of-two PGM images into QTC streams and back,
//! with an optional lossy pass and an optional segmentation-grid rendering.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Parser};

const DEFAULT_COMPRESS_OUTPUT: &str = "default_compress_output.qtc";
const DEFAULT_DECOMPRESS_OUTPUT: &str = "default_compress_input.pgm";

/// Quadtree image codec
#[derive(Parser, Debug)]
#[command(name = "qtc")]
#[command(version)]
#[command(about = "Compress PGM images into QTC quadtree streams and back", long_about = None)]
#[command(group(ArgGroup::new("mode").required(true).args(["compress", "decompress"])))]
struct Cli {
    /// Compress the input PGM file
    #[arg(short = 'c')]
    compress: bool,

    /// Decompress the input QTC file
    #[arg(short = 'u')]
    decompress: bool,

    /// Input file path
    #[arg(short = 'i', value_name = "FILE")]
    input: PathBuf,

    /// Output file path
    #[arg(short = 'o', value_name = "FILE")]
    output: Option<PathBuf>,

    /// Lossy filter strength; values above 1 enable the lossy pass
    #[arg(short = 'a', value_name = "ALPHA", default_value_t = 1.0)]
    alpha: f32,

    /// Also write a segmentation-grid PGM to this path
    #[arg(short = 'g', value_name = "FILE")]
    grid: Option<PathBuf>,

    /// Verbose output
    #[arg(short = 'v')]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .target(env_logger::Target::Stderr)
        .init();

    if !(cli.alpha > 0.0) {
        bail!("alpha must be strictly positive, got {}", cli.alpha);
    }

    let start = Instant::now();
    let result = if cli.compress {
        run_compress(&cli)
    } else {
        run_decompress(&cli)
    };

    let elapsed = start.elapsed().as_secs_f64();
    match &result {
        Ok(()) => log::info!("operation completed in {elapsed:.3} seconds"),
        Err(_) => log::error!("operation failed after {elapsed:.3} seconds"),
    }
    result
}

fn run_compress(cli: &Cli) -> Result<()> {
    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_COMPRESS_OUTPUT));
    log::info!(
        "compressing '{}' -> '{}'",
        cli.input.display(),
        output_path.display()
    );

    let input = File::open(&cli.input)
        .with_context(|| format!("failed to open '{}'", cli.input.display()))?;
    let raster = qtc::read_pgm(input)
        .with_context(|| format!("failed to read PGM '{}'", cli.input.display()))?;
    log::info!(
        "input: {}x{} pixels, {} tree levels",
        raster.side(),
        raster.side(),
        raster.levels()
    );

    let mut tree = qtc::QuadTree::build(&raster);
    if cli.alpha > 1.0 {
        qtc::apply_lossy(&mut tree, cli.alpha).context("lossy filtering failed")?;
        log::info!("lossy pass done: {} nodes retained", tree.node_count());
    }

    let output = File::create(&output_path)
        .with_context(|| format!("failed to create '{}'", output_path.display()))?;
    let mut writer = BufWriter::new(output);
    let info = qtc::compress(&tree, &mut writer).context("compression failed")?;
    writer
        .flush()
        .with_context(|| format!("failed to write '{}'", output_path.display()))?;
    log::info!(
        "wrote {} payload bytes ({} nodes, {:.2}% of the original size)",
        info.payload_bytes,
        info.nodes_written,
        info.ratio
    );

    if let Some(grid_path) = &cli.grid {
        write_grid(&tree, grid_path)?;
    }
    Ok(())
}

fn run_decompress(cli: &Cli) -> Result<()> {
    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DECOMPRESS_OUTPUT));
    log::info!(
        "decompressing '{}' -> '{}'",
        cli.input.display(),
        output_path.display()
    );

    let input = File::open(&cli.input)
        .with_context(|| format!("failed to open '{}'", cli.input.display()))?;
    let tree = qtc::decompress(input)
        .with_context(|| format!("failed to decode QTC '{}'", cli.input.display()))?;
    log::info!(
        "decoded tree: {} levels, {} nodes",
        tree.levels(),
        tree.node_count()
    );

    let raster = tree.to_raster().context("raster reconstruction failed")?;
    let output = File::create(&output_path)
        .with_context(|| format!("failed to create '{}'", output_path.display()))?;
    let mut writer = BufWriter::new(output);
    qtc::write_pgm(&raster, &mut writer)
        .with_context(|| format!("failed to write PGM '{}'", output_path.display()))?;
    writer
        .flush()
        .with_context(|| format!("failed to write '{}'", output_path.display()))?;

    if let Some(grid_path) = &cli.grid {
        write_grid(&tree, grid_path)?;
    }
    Ok(())
}

fn write_grid(tree: &qtc::QuadTree, path: &Path) -> Result<()> {
    let grid = qtc::render_grid(tree).context("grid rendering failed")?;
    let file = File::create(path)
        .with_context(|| format!("failed to create '{}'", path.display()))?;
    let mut writer = BufWriter::new(file);
    qtc::write_pgm(&grid, &mut writer)
        .with_context(|| format!("failed to write grid PGM '{}'", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("failed to write '{}'", path.display()))?;
    log::info!("wrote segmentation grid to '{}'", path.display());
    Ok(())
}

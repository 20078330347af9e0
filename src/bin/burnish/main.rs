//! Burnish CLI - mesh smoothing and print preparation.
//!
//! Usage: burnish <COMMAND> [OPTIONS] <INPUT> [OUTPUT]
//!
//! Run `burnish --help` for available commands.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};

use burnish::algo::repair::{make_print_ready, mesh_status, RepairOptions};
use burnish::algo::smooth::{taubin_smooth_with_progress, SmoothOptions};
use burnish::algo::Progress;
use burnish::io;
use burnish::pipeline::{Pipeline, PipelineConfig};

#[derive(Parser)]
#[command(name = "burnish")]
#[command(author, version, about = "Mesh smoothing and print preparation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Smooth, optionally reconstruct, and repair a mesh for printing
    Process {
        /// Input mesh file
        input: PathBuf,

        /// Output mesh file (default: <input>_processed.glb)
        output: Option<PathBuf>,

        /// Number of smoothing iterations
        #[arg(short, long)]
        iterations: Option<usize>,

        /// Skip resampling and reconstruction
        #[arg(long)]
        keep_bumps: bool,

        /// Pipeline configuration file (TOML); flags override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Seed for surface sampling
        #[arg(long)]
        seed: Option<u64>,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply Taubin smoothing only
    Smooth {
        /// Input mesh file
        input: PathBuf,

        /// Output mesh file
        output: PathBuf,

        /// Number of iterations
        #[arg(short, long, default_value = "5")]
        iterations: usize,

        /// Smoothing factor (0.0 to 1.0)
        #[arg(short, long, default_value = "0.5")]
        lambda: f64,

        /// Keep boundary vertices fixed
        #[arg(long)]
        preserve_boundary: bool,

        /// Use single-threaded execution (for benchmarking)
        #[arg(long)]
        sequential: bool,
    },

    /// Clean up a mesh and report whether it is printable
    Repair {
        /// Input mesh file
        input: PathBuf,

        /// Output mesh file
        output: PathBuf,

        /// Leave inside-out components as they are
        #[arg(long)]
        keep_orientation: bool,
    },

    /// Display mesh information
    Info {
        /// Input mesh file
        input: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Process {
            input,
            output,
            iterations,
            keep_bumps,
            config,
            seed,
            json,
        } => {
            let output = output.unwrap_or_else(|| default_output(&input));
            cmd_process(&input, &output, iterations, keep_bumps, config.as_deref(), seed, json)?;
        }

        Commands::Smooth {
            input,
            output,
            iterations,
            lambda,
            preserve_boundary,
            sequential,
        } => {
            cmd_smooth(&input, &output, iterations, lambda, preserve_boundary, sequential)?;
        }

        Commands::Repair {
            input,
            output,
            keep_orientation,
        } => {
            cmd_repair(&input, &output, keep_orientation)?;
        }

        Commands::Info { input } => {
            cmd_info(&input)?;
        }
    }

    Ok(())
}

/// `scan.glb` -> `scan_processed.glb`, next to the input.
fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("mesh");
    input.with_file_name(format!("{stem}_processed.glb"))
}

/// Create a progress reporter that displays a progress bar on the terminal.
fn create_progress() -> Progress {
    let max_percent = Arc::new(AtomicUsize::new(0));

    Progress::new(move |current, total, message| {
        if total == 0 {
            return;
        }

        let raw_percent = if current >= total {
            100
        } else {
            ((current * 100) + (total / 2)) / total
        };

        // Monotonic: stage transitions may report a lower fraction.
        let previous = max_percent.fetch_max(raw_percent, Ordering::Relaxed);
        if raw_percent <= previous && raw_percent != 100 {
            return;
        }
        let percent = raw_percent.max(previous);

        let bar_width = 30;
        let filled = (percent * bar_width) / 100;
        let bar = "=".repeat(filled);
        let space = " ".repeat(bar_width - filled);

        eprint!("\r[{}{}] {:3}% {:<24}", bar, space, percent, message);
        let _ = std::io::stderr().flush();

        if current >= total {
            eprintln!();
        }
    })
}

fn cmd_process(
    input: &Path,
    output: &Path,
    iterations: Option<usize>,
    keep_bumps: bool,
    config_path: Option<&Path>,
    seed: Option<u64>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match config_path {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(iterations) = iterations {
        config.iterations = iterations;
    }
    if keep_bumps {
        config.remove_bumps = false;
    }
    if let Some(seed) = seed {
        config.seed = Some(seed);
    }
    config.validate()?;

    let mesh = io::load(input)?;
    println!("Loaded: {} vertices, {} triangles", mesh.num_vertices(), mesh.num_triangles());
    println!(
        "Processing ({} iterations, remove bumps: {})...",
        config.iterations, config.remove_bumps
    );

    let mut pipeline = Pipeline::new(config).with_progress(create_progress());
    let start = Instant::now();
    let result = pipeline.run(&mesh)?;
    let elapsed = start.elapsed();

    io::save(&result.mesh, output)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result.summary)?);
    } else {
        println!("{}", result.summary);
    }
    println!("Input:  {}", input.display());
    println!("Saved:  {} ({:.2?})", output.display(), elapsed);

    Ok(())
}

fn cmd_smooth(
    input: &Path,
    output: &Path,
    iterations: usize,
    lambda: f64,
    preserve_boundary: bool,
    sequential: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mesh = io::load(input)?;

    println!("Loaded: {} vertices, {} triangles", mesh.num_vertices(), mesh.num_triangles());

    let options = SmoothOptions::default()
        .with_iterations(iterations)
        .with_lambda(lambda)
        .with_preserve_boundary(preserve_boundary)
        .with_parallel(!sequential);

    let mode = if sequential { "sequential" } else { "parallel" };
    println!(
        "Applying Taubin smoothing ({} iterations, lambda={}, mu={:.3}, {})...",
        iterations,
        lambda,
        options.mu(),
        mode
    );

    let start = Instant::now();
    let smoothed = taubin_smooth_with_progress(&mesh, &options, &create_progress())?;
    let elapsed = start.elapsed();

    io::save(&smoothed, output)?;
    println!("Saved: {} ({:.2?})", output.display(), elapsed);

    Ok(())
}

fn cmd_repair(input: &Path, output: &Path, keep_orientation: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mesh = io::load(input)?;

    println!("Loaded: {} vertices, {} triangles", mesh.num_vertices(), mesh.num_triangles());

    let options = RepairOptions::default().with_orient_outward(!keep_orientation);
    let (repaired, report) = make_print_ready(&mesh, &options)?;

    println!("{}", report);
    io::save(&repaired, output)?;
    println!("Saved: {}", output.display());

    Ok(())
}

fn cmd_info(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mesh = io::load(input)?;

    println!("File: {}", input.display());
    println!("Vertices: {}", mesh.num_vertices());
    println!("Triangles: {}", mesh.num_triangles());

    let areas: Vec<f64> = (0..mesh.num_triangles()).map(|t| mesh.face_area(t)).collect();
    let min_area = areas.iter().copied().fold(f64::INFINITY, f64::min);
    let max_area = areas.iter().copied().fold(0.0_f64, f64::max);
    println!("Surface area: {:.6}", areas.iter().sum::<f64>());
    println!("Triangle area range: [{:.6}, {:.6}]", min_area, max_area);

    if let Some((min, max)) = mesh.bounding_box() {
        println!(
            "Bounding box: ({:.3}, {:.3}, {:.3}) to ({:.3}, {:.3}, {:.3})",
            min.x, min.y, min.z, max.x, max.y, max.z
        );
        let size = max - min;
        println!("Dimensions: {:.3} x {:.3} x {:.3}", size.x, size.y, size.z);
    }

    let attributes: Vec<&str> = [
        (mesh.has_triangle_uvs(), "texture coordinates"),
        (mesh.has_vertex_colors(), "vertex colors"),
        (mesh.has_vertex_normals(), "vertex normals"),
    ]
    .iter()
    .filter(|(present, _)| *present)
    .map(|&(_, name)| name)
    .collect();
    if attributes.is_empty() {
        println!("Attributes: none");
    } else {
        println!("Attributes: {}", attributes.join(", "));
    }

    let status = mesh_status(&mesh);
    println!("Status: {}", status);
    if status.is_watertight {
        println!("Volume: {:.6}", mesh.signed_volume());
    }

    Ok(())
}

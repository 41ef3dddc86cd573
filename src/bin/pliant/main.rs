//! Pliant CLI - as-rigid-as-possible mesh deformation from the shell.
//!
//! Usage: pliant <COMMAND> [OPTIONS] <INPUT> [OUTPUT]
//!
//! Run `pliant --help` for available commands. Set `RUST_LOG=pliant=debug`
//! for solver diagnostics.

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};
use nalgebra::{Point3, Vector3};

use pliant::algo::deform::{ArapDeformer, ConstraintSet, DeformOptions, LinearSolver};
use pliant::algo::Progress;
use pliant::io;
use pliant::mesh::TriMesh;

#[derive(Parser)]
#[command(name = "pliant")]
#[command(author, version, about = "As-rigid-as-possible mesh deformation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display mesh and analysis information
    Info {
        /// Input mesh file
        input: PathBuf,
    },

    /// Deform a mesh by moving pinned vertices
    Deform {
        /// Input mesh file
        input: PathBuf,

        /// Output mesh file
        output: PathBuf,

        /// Pin a vertex to an absolute position, as V:X,Y,Z
        #[arg(long, value_parser = parse_pin)]
        pin: Vec<(usize, Vector3<f64>)>,

        /// Pin a vertex at an offset from its rest position, as V:DX,DY,DZ
        #[arg(long, value_parser = parse_pin)]
        offset: Vec<(usize, Vector3<f64>)>,

        /// Number of local/global iterations
        #[arg(short, long, default_value = "5")]
        iterations: usize,

        /// Linear solver for the global step
        #[arg(short, long, value_enum, default_value = "direct")]
        solver: SolverKind,

        /// Use single-threaded execution (for benchmarking)
        #[arg(long)]
        sequential: bool,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum SolverKind {
    /// Dense LU factorization
    Direct,
    /// Conjugate gradient on the free vertices
    Cg,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Info { input } => {
            cmd_info(&input)?;
        }

        Commands::Deform {
            input,
            output,
            pin,
            offset,
            iterations,
            solver,
            sequential,
        } => {
            cmd_deform(&input, &output, &pin, &offset, iterations, solver, sequential)?;
        }
    }

    Ok(())
}

/// Parse `V:X,Y,Z`.
fn parse_pin(s: &str) -> Result<(usize, Vector3<f64>), String> {
    let (vertex, coords) = s
        .split_once(':')
        .ok_or_else(|| format!("expected V:X,Y,Z, got '{}'", s))?;
    let vertex = vertex
        .trim()
        .parse::<usize>()
        .map_err(|e| format!("invalid vertex index '{}': {}", vertex, e))?;

    let values = coords
        .split(',')
        .map(|c| c.trim().parse::<f64>().map_err(|e| format!("invalid coordinate '{}': {}", c, e)))
        .collect::<Result<Vec<_>, _>>()?;
    match values.as_slice() {
        [x, y, z] => Ok((vertex, Vector3::new(*x, *y, *z))),
        _ => Err(format!("expected three coordinates, got {}", values.len())),
    }
}

/// Terminal progress bar; only ever moves forward.
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

        let previous = max_percent.fetch_max(raw_percent, Ordering::Relaxed);
        if raw_percent <= previous && raw_percent != 100 {
            return;
        }
        let percent = raw_percent.max(previous);

        let bar_width = 30;
        let filled = (percent * bar_width) / 100;
        let bar = "=".repeat(filled);
        let space = " ".repeat(bar_width - filled);

        eprint!("\r[{}{}] {:3}% {} {}/{}", bar, space, percent, message, current, total);
        let _ = std::io::stderr().flush();

        if current >= total {
            eprintln!();
        }
    })
}

fn cmd_info(input: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let mesh = io::load(input)?;
    let deformer = ArapDeformer::new(mesh);
    let mesh = deformer.mesh();
    let analysis = deformer.analysis();

    println!("File: {}", input.display());
    println!("Vertices: {}", mesh.num_vertices());
    println!("Faces: {}", mesh.num_faces());
    println!("Edges: {}", analysis.num_edges());

    let areas: Vec<f64> = (0..mesh.num_faces()).map(|f| mesh.face_area(f)).collect();
    let total_area: f64 = areas.iter().sum();
    let min_area = areas.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_area = areas.iter().cloned().fold(0.0_f64, f64::max);
    println!("Surface area: {:.6}", total_area);
    println!("Face area range: [{:.6}, {:.6}]", min_area, max_area);

    let (min, max) = mesh.bounding_box();
    println!(
        "Bounding box: ({:.3}, {:.3}, {:.3}) to ({:.3}, {:.3}, {:.3})",
        min.x, min.y, min.z, max.x, max.y, max.z
    );

    let boundary = analysis.boundary_edges();
    if boundary.is_empty() {
        println!("Topology: Closed (no boundary)");
    } else {
        println!("Topology: Open ({} boundary edges)", boundary.len());
    }
    let (components, _) = analysis.connected_components();
    println!("Connected components: {}", components);

    let weights: Vec<f64> = analysis.edges().map(|(_, w)| w).collect();
    let negative = weights.iter().filter(|&&w| w < 0.0).count();
    let w_min = weights.iter().cloned().fold(f64::INFINITY, f64::min);
    let w_max = weights.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    println!("\nCotangent weights:");
    println!("  range: [{:.4}, {:.4}]", w_min, w_max);
    println!("  negative (obtuse): {}", negative);
    println!("  degenerate corners: {}", analysis.degenerate_contributions());
    println!("  Laplacian non-zeros: {}", analysis.laplacian().nnz());

    Ok(())
}

fn cmd_deform(
    input: &PathBuf,
    output: &PathBuf,
    pins: &[(usize, Vector3<f64>)],
    offsets: &[(usize, Vector3<f64>)],
    iterations: usize,
    solver: SolverKind,
    sequential: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mesh = io::load(input)?;
    println!("Loaded: {} vertices, {} faces", mesh.num_vertices(), mesh.num_faces());

    let start = Instant::now();
    let deformer = ArapDeformer::new(mesh);
    println!("Analyzed in {:.2?}", start.elapsed());

    let mut constraints = ConstraintSet::new();
    constraints.extend(pins.iter().map(|&(v, p)| (v, Point3::from(p))));
    constraints.validate(deformer.mesh().num_vertices())?;
    for &(v, delta) in offsets {
        let num_vertices = deformer.mesh().num_vertices();
        if v >= num_vertices {
            return Err(format!("offset vertex {} out of range ({} vertices)", v, num_vertices).into());
        }
        constraints.set(v, deformer.mesh().position(v) + delta);
    }
    if constraints.is_empty() {
        println!("No constraints given; writing the rest pose");
    }

    let solver = match solver {
        SolverKind::Direct => LinearSolver::Direct,
        SolverKind::Cg => LinearSolver::conjugate_gradient(),
    };
    let options = DeformOptions::default()
        .with_iterations(iterations)
        .with_parallel(!sequential)
        .with_solver(solver);

    let mode = if sequential { "sequential" } else { "parallel" };
    println!(
        "Deforming ({} pins, {} iterations, {})...",
        constraints.len(),
        iterations,
        mode
    );

    let progress = create_progress();
    let start = Instant::now();
    let result = deformer.deform_with_progress(&constraints, &options, &progress)?;
    let elapsed = start.elapsed();

    if let Some(energy) = result.energies.last() {
        println!("Final ARAP energy: {:.6e}", energy);
    }

    let deformed = TriMesh::new(result.positions, deformer.mesh().faces().to_vec())?;
    io::save(&deformed, output)?;
    println!("Saved: {} ({:.2?})", output.display(), elapsed);

    Ok(())
}

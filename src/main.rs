//! Cube Solver
//!
//! Command-line front end for the cube library: scramble cubes from move
//! notation, check and convert stored cubes, print them as nets, and search
//! for solving sequences either inline or on the background worker.

use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{debug, info};

use cubesolve::cube::{CubeState, Encoding, SlotIssue};
use cubesolve::filter::FilterCache;
use cubesolve::geometry::layer_count;
use cubesolve::moves::{inverse_sequence, move_text, MoveError, MoveSet};
use cubesolve::solver::{self, CancelHandle, SolveCallbacks, SolveOutcome, SolverConfig, CANCELLED_NOTICE};
use cubesolve::worker::{SolveWorker, WorkerEvent};
use cubesolve::{grid, persistence};

type CliResult<T = ()> = Result<T, Box<dyn Error>>;

/// Scrambles, checks and solves N×N×N cubes.
#[derive(Parser)]
#[command(name = "cubesolve")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search for a sequence that solves each cube.
    Solve {
        /// A `CBDTA:` cube string or a cube file.
        cube: String,
        /// Only this cube of a multi-cube file.
        #[arg(long)]
        index: Option<usize>,
        /// Run the searches on the background worker.
        #[arg(long)]
        worker: bool,
        #[command(flatten)]
        search: SearchArgs,
    },
    /// Check that each cube could be reached from a solved one.
    Verify {
        cube: String,
        #[arg(long)]
        index: Option<usize>,
    },
    /// Turn a solved cube through a move sequence.
    Scramble {
        /// Edge length.
        #[arg(long, default_value_t = 3)]
        size: usize,
        /// Moves such as "R U R' U'".
        moves: String,
        #[arg(long, value_enum, default_value_t = Format::Surface)]
        encoding: Format,
        /// Write to a cube file instead of printing.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Re-encode cubes.
    Convert {
        cube: String,
        #[arg(long, value_enum)]
        to: Format,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print cubes as unfolded nets.
    Show {
        cube: String,
        #[arg(long)]
        index: Option<usize>,
    },
    /// List every move of a cube size, or parse a sequence and print its inverse.
    Moves {
        #[arg(long, default_value_t = 3)]
        size: usize,
        sequence: Option<String>,
    },
}

/// Search tuning flags.
#[derive(Args)]
struct SearchArgs {
    /// Most nodes held at once.
    #[arg(long, default_value_t = solver::DEFAULT_CAPACITY)]
    capacity: usize,
    /// Expansions between progress reports.
    #[arg(long, default_value_t = solver::DEFAULT_CYCLES_PER_SLICE)]
    cycles: usize,
    /// Points charged per move made.
    #[arg(long, default_value_t = solver::DEFAULT_MOVE_WEIGHT)]
    move_weight: u32,
    /// Children kept per expansion.
    #[arg(long, default_value_t = solver::DEFAULT_KEEP_TOP)]
    keep_top: usize,
    /// Children scoring below this are dropped.
    #[arg(long, default_value_t = 0)]
    min_score: u32,
}

impl SearchArgs {
    fn config(&self) -> SolverConfig {
        SolverConfig::default()
            .with_capacity(self.capacity)
            .with_cycles_per_slice(self.cycles)
            .with_move_weight(self.move_weight)
            .with_keep_top(self.keep_top)
            .with_min_viable_score(self.min_score)
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Surface,
    Fast,
    Piece,
    Compact,
}

impl From<Format> for Encoding {
    fn from(format: Format) -> Self {
        match format {
            Format::Surface => Encoding::Surface,
            Format::Fast => Encoding::Fast,
            Format::Piece => Encoding::Piece,
            Format::Compact => Encoding::Compact,
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Solve {
            cube,
            index,
            worker,
            search,
        } => {
            if worker {
                run_solve_worker(&cube, index, search.config())
            } else {
                run_solve(&cube, index, search.config())
            }
        }
        Command::Verify { cube, index } => run_verify(&cube, index),
        Command::Scramble {
            size,
            moves,
            encoding,
            output,
        } => run_scramble(size, &moves, encoding.into(), output.as_deref()),
        Command::Convert { cube, to, output } => run_convert(&cube, to.into(), output.as_deref()),
        Command::Show { cube, index } => run_show(&cube, index),
        Command::Moves { size, sequence } => run_moves(size, sequence.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Reads a literal cube string or a cube file.
fn load_cube(arg: &str) -> CliResult<CubeState> {
    if arg.trim_start().starts_with("CBDTA:") {
        return Ok(CubeState::from_cube_string(arg)?);
    }
    Ok(persistence::load(Path::new(arg))?)
}

/// Cube indices selected by `--index`, or all of them.
fn selected(state: &CubeState, index: Option<usize>) -> CliResult<Vec<usize>> {
    match index {
        Some(i) if i >= state.count() => Err(format!("cube {i} requested but only {} stored", state.count()).into()),
        Some(i) => Ok(vec![i]),
        None => Ok((0..state.count()).collect()),
    }
}

/// Prints solve events as they arrive.
struct Console {
    cube: usize,
    size: usize,
}

impl SolveCallbacks for Console {
    fn on_start(&mut self, _cancel: CancelHandle) {
        info!("solving cube {} ({}x{})", self.cube, self.size, self.size);
    }

    fn on_progress(&mut self, status: &str) {
        debug!("cube {}: {status}", self.cube);
    }

    fn on_success(&mut self, solution: &MoveSet, elapsed: Duration, visited: u64) {
        let text = solution.moves_as_text(0).unwrap_or_default();
        println!(
            "cube {}: {} move(s) in {:.2?}, {} nodes: {}",
            self.cube,
            solution.length(),
            elapsed,
            visited,
            text
        );
    }

    fn on_failure(&mut self, errors: &[SlotIssue]) {
        print_issues(self.cube, errors);
    }
}

fn print_issues(cube: usize, errors: &[SlotIssue]) {
    println!("cube {cube}: cannot be solved");
    for issue in errors {
        println!("  {issue}");
    }
}

fn run_solve(arg: &str, index: Option<usize>, config: SolverConfig) -> CliResult {
    let state = load_cube(arg)?;
    let mut cache = FilterCache::new();
    let mut unsolved = 0;
    for cube in selected(&state, index)? {
        let mut console = Console {
            cube,
            size: state.size(),
        };
        match solver::solve(&state, cube, config.clone(), &mut cache, &mut console)? {
            SolveOutcome::Solved(_) => {}
            SolveOutcome::Failed(_) | SolveOutcome::Cancelled => unsolved += 1,
        }
    }
    if unsolved > 0 {
        return Err(format!("{unsolved} cube(s) not solved").into());
    }
    Ok(())
}

/// Solves on the worker thread, one request per cube.
fn run_solve_worker(arg: &str, index: Option<usize>, config: SolverConfig) -> CliResult {
    let state = load_cube(arg)?;
    let worker = SolveWorker::spawn(config)?;
    let mut keys = Vec::new();
    for cube in selected(&state, index)? {
        keys.push((cube, worker.submit_state(&state, cube)?));
    }

    let cube_of = |key: &str| keys.iter().find(|(_, k)| k == key).map_or(0, |(cube, _)| *cube);
    let mut remaining = keys.len();
    let mut unsolved = 0;
    while remaining > 0 {
        let event = worker.events().recv()?;
        let cube = cube_of(event.key());
        match event {
            WorkerEvent::Started { .. } => info!("solving cube {cube} on the worker"),
            WorkerEvent::Progress { status, .. } if status == CANCELLED_NOTICE => {
                remaining -= 1;
                unsolved += 1;
            }
            WorkerEvent::Progress { status, .. } => debug!("cube {cube}: {status}"),
            WorkerEvent::Succeeded { solution, .. } => {
                remaining -= 1;
                println!(
                    "cube {cube}: {} move(s) in {:.2?}, {} nodes: {}",
                    solution.moves.length(),
                    solution.elapsed,
                    solution.visited,
                    solution.moves.moves_as_text(0)?
                );
            }
            WorkerEvent::Failed { errors, .. } => {
                remaining -= 1;
                unsolved += 1;
                print_issues(cube, &errors);
            }
            WorkerEvent::Rejected { reason, .. } => {
                remaining -= 1;
                unsolved += 1;
                println!("cube {cube}: rejected: {reason}");
            }
        }
    }
    worker.shutdown()?;
    if unsolved > 0 {
        return Err(format!("{unsolved} cube(s) not solved").into());
    }
    Ok(())
}

fn run_verify(arg: &str, index: Option<usize>) -> CliResult {
    let state = load_cube(arg)?;
    let mut failed = 0;
    for cube in selected(&state, index)? {
        let result = state.verify(cube)?;
        if result.passed {
            println!("cube {cube}: ok");
        } else {
            failed += 1;
            print_issues(cube, &result.errors);
        }
    }
    if failed > 0 {
        return Err(format!("{failed} cube(s) failed verification").into());
    }
    Ok(())
}

/// A solved cube of `size` turned through `moves`.
fn scrambled(size: usize, moves: &str, encoding: Encoding) -> CliResult<CubeState> {
    let sequence = MoveSet::parse_text(size, moves)?;
    let mut state = CubeState::solved(size, Encoding::Surface)?;
    let mut cache = FilterCache::new();
    let filter = cache.filter_for(&sequence, 0, Encoding::Surface)?;
    filter.apply(&mut state, 0, 0)?;
    Ok(state.convert(encoding)?)
}

fn run_scramble(size: usize, moves: &str, encoding: Encoding, output: Option<&Path>) -> CliResult {
    let state = scrambled(size, moves, encoding)?;
    write_state(&state, output)
}

fn run_convert(arg: &str, to: Encoding, output: Option<&Path>) -> CliResult {
    let state = load_cube(arg)?.convert(to)?;
    write_state(&state, output)
}

fn write_state(state: &CubeState, output: Option<&Path>) -> CliResult {
    match output {
        Some(path) => {
            persistence::save(path, state)?;
            println!("Wrote {} cube(s) to {}", state.count(), path.display());
        }
        None => {
            for cube in 0..state.count() {
                println!("{}", state.to_cube_string(cube)?);
            }
        }
    }
    Ok(())
}

fn run_show(arg: &str, index: Option<usize>) -> CliResult {
    let state = load_cube(arg)?;
    for cube in selected(&state, index)? {
        println!("cube {cube}:");
        println!("{}", grid::format_net(&state, cube)?);
    }
    Ok(())
}

fn run_moves(size: usize, sequence: Option<&str>) -> CliResult {
    match sequence {
        None => print!("{}", move_table(size)?),
        Some(text) => {
            let parsed = MoveSet::parse_text(size, text)?;
            let moves = parsed.moves(0)?;
            let inverse = MoveSet::from_moves(size, &inverse_sequence(size, &moves))?;
            println!("ids: {moves:?}");
            println!("moves: {}", parsed.moves_as_text(0)?);
            println!("inverse: {}", inverse.moves_as_text(0)?);
        }
    }
    Ok(())
}

/// Every move id of `size` with its notation, one per line.
fn move_table(size: usize) -> Result<String, MoveError> {
    cubesolve::cube::check_size(size)?;
    let mut table = String::new();
    for id in 0..3 * layer_count(size) as u32 {
        let text = move_text(id, size).ok_or(MoveError::MoveOutOfRange {
            id,
            limit: 3 * layer_count(size) as u32,
        })?;
        table.push_str(&format!("{id}: {text}\n"));
    }
    Ok(table)
}

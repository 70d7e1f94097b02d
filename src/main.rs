//! Command-line simulator
//!
//! Usage:
//!   poets-sim [--log-level N] [--max-ticks N] <srcFile|-> <statsFile|-> <outFile|->
//!
//! Loads a topology, runs it until it goes quiet and writes one statistics
//! line per tick to `statsFile` and the kind's output to `outFile`. At most
//! one of the two may be `-` (stdout). Logs go to stderr.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use poets_sim::config::{DEFAULT_MAX_PENDING_SLICES, env_filter};
use poets_sim::{RunSummary, SimConfig, StatsWriter, graphs};

const STDIO: &str = "-";

#[derive(Parser, Debug)]
#[command(author, version, about = "Cycle-level simulator for device graphs", long_about = None)]
struct Args {
    /// Topology file, or - for stdin
    src: String,

    /// Per-tick statistics destination, or - for stdout
    stats: String,

    /// Device output destination, or - for stdout
    out: String,

    /// Verbosity: 0 warnings only, 1 run progress, 2 per tick, 3 per node and edge
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    log_level: i32,

    /// Stop after this many ticks even if the graph is still active
    #[arg(long)]
    max_ticks: Option<u32>,

    /// Incomplete output slices the heat sink may hold before failing
    #[arg(long, default_value_t = DEFAULT_MAX_PENDING_SLICES)]
    max_pending_slices: usize,
}

impl Args {
    fn config(&self) -> SimConfig {
        let config = SimConfig::new().with_max_pending_slices(self.max_pending_slices);
        match self.max_ticks {
            Some(limit) => config.with_max_ticks(limit),
            None => config,
        }
    }

    fn check(&self) -> Result<(), String> {
        if self.stats == STDIO && self.out == STDIO {
            return Err("statsFile and outFile cannot both be stdout".to_string());
        }
        Ok(())
    }
}

fn open_input(path: &str) -> io::Result<Box<dyn BufRead>> {
    if path == STDIO {
        Ok(Box::new(BufReader::new(io::stdin())))
    } else {
        Ok(Box::new(BufReader::new(File::open(path)?)))
    }
}

/// Open an output path without touching its contents. `None` means stdout.
fn open_output(path: &str) -> io::Result<Option<File>> {
    if path == STDIO {
        return Ok(None);
    }
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    Ok(Some(file))
}

/// Truncate an opened output and wrap it for writing
fn into_writer(file: Option<File>) -> io::Result<Box<dyn Write>> {
    match file {
        Some(file) => {
            file.set_len(0)?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(io::stdout()))),
    }
}

fn run(args: &Args) -> poets_sim::Result<RunSummary> {
    // Every path must open before any existing output is truncated
    let src = open_input(&args.src)?;
    let stats = open_output(&args.stats)?;
    let out = open_output(&args.out)?;

    let mut stats = StatsWriter::new(into_writer(stats)?);
    graphs::simulate(src, &mut stats, into_writer(out)?, &args.config())
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(args.log_level))
        .with_writer(io::stderr)
        .init();

    if let Err(message) = args.check() {
        error!("{}", message);
        eprintln!("Error: {}", message);
        return ExitCode::FAILURE;
    }

    info!("Loading {}", args.src);
    match run(&args) {
        Ok(summary) => {
            info!(ticks = summary.ticks, outcome = ?summary.outcome, "Done");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

//! Writes a rectangular heat topology to stdout
//!
//! Usage:
//!   generate-heat-rect [width] [maxTime] [outputDeltaTime] [outputDeltaSpace]

use std::io::{self, BufWriter, Write};
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use poets_sim::config::env_filter;
use poets_sim::tools::{HeatRectParams, build_heat_rect};

#[derive(Parser, Debug)]
#[command(author, version, about = "Generate a rectangular heat grid", long_about = None)]
struct Args {
    /// Side length in cells (rounded to a multiple of outputDeltaSpace, plus one)
    #[arg(default_value_t = 65)]
    width: u32,

    /// Number of steps each cell takes
    #[arg(default_value_t = 64)]
    max_time: u32,

    /// Steps between output slices (0 disables output)
    #[arg(default_value_t = 8)]
    output_delta_time: u32,

    /// Cells between output points along each axis
    #[arg(default_value_t = 2, value_parser = clap::value_parser!(u32).range(1..))]
    output_delta_space: u32,

    /// Seed for initial heat and channel delays
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Verbosity: 0 warnings only, 1 progress, 2 and above details
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    log_level: i32,
}

impl Args {
    fn params(&self) -> HeatRectParams {
        HeatRectParams {
            width: self.width,
            max_time: self.max_time,
            output_delta_time: self.output_delta_time,
            output_delta_space: self.output_delta_space,
            seed: self.seed,
            ..HeatRectParams::default()
        }
    }
}

fn generate(params: &HeatRectParams) -> poets_sim::Result<()> {
    let builder = build_heat_rect(params)?;
    info!(
        side = params.side(),
        devices = builder.num_devices(),
        channels = builder.num_channels(),
        "Writing heat grid"
    );

    let mut out = BufWriter::new(io::stdout().lock());
    builder.write(&mut out)?;
    out.flush()?;
    Ok(())
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

    match generate(&args.params()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

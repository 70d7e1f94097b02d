//! Cycle-level simulator for POETS-style device graphs
//!
//! A topology of devices connected by single-slot, fixed-delay channels is
//! loaded from a line-oriented text file and stepped in lock-step ticks
//! until nothing is left to do. Per-tick activity counters go to a
//! statistics sink; device outputs go to a kind-specific supervisor.
//!
//! # Architecture
//!
//! - **Wire format**: [`wire::GraphReader`] and [`wire::GraphWriter`] read and write topology files
//! - **Engine**: [`Simulator`] steps edges, then nodes, then flushes outputs, every tick
//! - **Device kinds**: [`GraphKind`] implementations in [`graphs`] (`heat`, `ring`)
//! - **Tools**: [`tools::heat_rect`] builds rectangular heat grids
//!
//! # Example
//!
//! ```no_run
//! use poets_sim::{SimConfig, StatsWriter, graphs};
//!
//! let src = std::io::BufReader::new(std::fs::File::open("ring.graph")?);
//! let mut stats = StatsWriter::new(std::io::stderr());
//! let summary = graphs::simulate(src, &mut stats, Box::new(std::io::stdout()), &SimConfig::default())?;
//! println!("{} ticks", summary.ticks);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use thiserror::Error;

pub mod config;
pub mod graphs;
pub mod runtime;
pub mod tools;
pub mod wire;

pub use config::SimConfig;
pub use graphs::{KindTag, simulate};
pub use runtime::{
    ContractViolation, EdgeId, FormatError, GraphBuilder, GraphKind, NodeId, RunOutcome,
    RunSummary, Simulator, StatsSink, StatsWriter, Supervisor, SupervisorError, TickStats,
    Topology, TopologyError,
};

#[derive(Error, Debug)]
pub enum SimError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),

    #[error("Contract violation at tick {tick} on device {node}: {source}")]
    Contract {
        tick: u32,
        node: NodeId,
        #[source]
        source: ContractViolation,
    },

    #[error("Supervisor error: {0}")]
    Supervisor(#[from] SupervisorError),

    #[error("Unknown graph kind: '{0}'")]
    UnknownKind(String),
}

pub type Result<T> = std::result::Result<T, SimError>;

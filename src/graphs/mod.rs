//! Built-in device kinds and kind dispatch
//!
//! The kind tag at the top of a topology file picks one [`GraphKind`] for
//! the whole run. Everything after the tag is handled by code that is
//! generic over that kind.

use std::fmt;
use std::io::{BufRead, Write};
use std::str::FromStr;

use tracing::info;

use crate::config::SimConfig;
use crate::runtime::graph::Topology;
use crate::runtime::kind::GraphKind;
use crate::runtime::simulator::{RunSummary, Simulator};
use crate::runtime::stats::StatsSink;
use crate::runtime::supervisor::Supervisor;
use crate::wire::GraphReader;
use crate::{Result, SimError};

pub mod heat;
pub mod ring;

pub use heat::{Heat, HeatSupervisor};
pub use ring::{Ring, RingSupervisor};

/// Known device kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindTag {
    Heat,
    Ring,
}

impl KindTag {
    pub fn name(&self) -> &'static str {
        match self {
            KindTag::Heat => Heat::TYPE_NAME,
            KindTag::Ring => Ring::TYPE_NAME,
        }
    }
}

impl FromStr for KindTag {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            _ if s == Heat::TYPE_NAME => Ok(KindTag::Heat),
            _ if s == Ring::TYPE_NAME => Ok(KindTag::Ring),
            other => Err(SimError::UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for KindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Load a topology and run it to completion.
///
/// Statistics go to `stats`; the kind's supervisor writes to `out`.
pub fn simulate<R: BufRead>(
    src: R,
    stats: &mut dyn StatsSink,
    out: Box<dyn Write>,
    config: &SimConfig,
) -> Result<RunSummary> {
    let mut reader = GraphReader::new(src);
    let kind: KindTag = reader.read_kind_tag()?.parse()?;
    info!(kind = %kind, "Selected graph kind");

    match kind {
        KindTag::Heat => {
            let supervisor = HeatSupervisor::new(out, config.max_pending_slices);
            simulate_as::<Heat, _, _>(&mut reader, supervisor, stats, config)
        }
        KindTag::Ring => simulate_as::<Ring, _, _>(&mut reader, RingSupervisor::new(out), stats, config),
    }
}

/// Load the rest of the file as kind `K` and run it
pub fn simulate_as<K, S, R>(
    reader: &mut GraphReader<R>,
    supervisor: S,
    stats: &mut dyn StatsSink,
    config: &SimConfig,
) -> Result<RunSummary>
where
    K: GraphKind,
    S: Supervisor<K>,
    R: BufRead,
{
    let header = reader.read_header::<K>()?;
    let mut sim = Simulator::<K, S>::with_config(header.graph, supervisor, config.clone());
    sim.reserve(header.device_count, header.channel_count);
    reader.read_body::<K, _>(header.device_count, header.channel_count, &mut sim)?;

    debug_assert_eq!(sim.node_count(), header.device_count);
    debug_assert_eq!(sim.edge_count(), header.channel_count);

    sim.run(stats)
}

/// Load the rest of the file into a target built from the graph properties, without running it
pub fn load_into<K, T, R>(reader: &mut GraphReader<R>, build: impl FnOnce(K::Graph) -> T) -> Result<T>
where
    K: GraphKind,
    T: Topology<K>,
    R: BufRead,
{
    let header = reader.read_header::<K>()?;
    let mut target = build(header.graph);
    reader.read_body::<K, T>(header.device_count, header.channel_count, &mut target)?;
    Ok(target)
}

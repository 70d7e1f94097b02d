//! Runtime support for synchronous device graphs

pub mod channel;
pub mod errors;
pub mod graph;
pub mod kind;
pub mod simulator;
pub mod stats;
pub mod supervisor;

pub use channel::{ChannelSlot, Edge, SlotStep};
pub use errors::{ContractViolation, FormatError, SupervisorError, TopologyError};
pub use graph::{ChannelSpec, EdgeId, GraphBuilder, NodeId, Topology};
pub use kind::GraphKind;
pub use simulator::{RunOutcome, RunSummary, Simulator};
pub use stats::{StatsSink, StatsWriter, TickStats};
pub use supervisor::{NullSupervisor, Output, RecordingSupervisor, Supervisor};

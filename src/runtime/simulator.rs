//! Synchronous tick engine
//!
//! Owns every device and channel of one topology and advances them in
//! lock-step. Each tick runs four phases in a fixed order:
//!
//! 1. Step every edge in ascending index order, delivering arrived messages
//! 2. Step every node in ascending index order, sending where possible
//! 3. Flush the outputs produced this tick to the supervisor
//! 4. Report the tick's statistics
//!
//! The run stops after the first tick in which nothing happened.

use std::collections::VecDeque;

use tracing::{debug, info, trace};

use super::channel::{Edge, SlotStep};
use super::errors::TopologyError;
use super::graph::{EdgeId, NodeId, Topology, check_attached};
use super::kind::GraphKind;
use super::stats::{StatsSink, TickStats};
use super::supervisor::{Output, Supervisor};
use crate::config::SimConfig;
use crate::{Result, SimError};

/// Most entries [`Simulator::reserve`] will allocate ahead of attachment
pub const RESERVE_LIMIT: usize = 4096;

/// A device slot in the simulator
struct Node<K: GraphKind> {
    properties: K::Properties,
    state: K::State,
    incoming: Vec<EdgeId>,
    outgoing: Vec<EdgeId>,
}

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// A tick passed with no activity
    Quiescent,
    /// The configured tick limit was reached first
    TickLimit,
}

/// Result of a completed run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Number of ticks executed, including the final idle one
    pub ticks: u32,
    pub outcome: RunOutcome,
}

/// Tick engine for a single graph kind
pub struct Simulator<K: GraphKind, S: Supervisor<K>> {
    config: SimConfig,
    graph: K::Graph,
    nodes: Vec<Node<K>>,
    edges: Vec<Edge<K::Channel, K::Message>>,
    outputs: VecDeque<Output<K::Message>>,
    supervisor: S,
    tick: u32,
}

impl<K: GraphKind, S: Supervisor<K>> Simulator<K, S> {
    /// Create an empty simulator with the default configuration
    pub fn new(graph: K::Graph, supervisor: S) -> Self {
        Self::with_config(graph, supervisor, SimConfig::default())
    }

    pub fn with_config(graph: K::Graph, supervisor: S, config: SimConfig) -> Self {
        Self {
            config,
            graph,
            nodes: Vec::new(),
            edges: Vec::new(),
            outputs: VecDeque::new(),
            supervisor,
            tick: 0,
        }
    }

    /// Reserve room for a topology of announced size.
    ///
    /// Counts usually come from an unchecked file header, so only up to
    /// [`RESERVE_LIMIT`] entries are allocated up front.
    pub fn reserve(&mut self, devices: usize, channels: usize) {
        self.nodes.reserve(devices.min(RESERVE_LIMIT));
        self.edges.reserve(channels.min(RESERVE_LIMIT));
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Index of the next tick to execute
    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn graph(&self) -> &K::Graph {
        &self.graph
    }

    pub fn properties(&self, node: NodeId) -> Option<&K::Properties> {
        self.nodes.get(node.as_usize()).map(|n| &n.properties)
    }

    pub fn state(&self, node: NodeId) -> Option<&K::State> {
        self.nodes.get(node.as_usize()).map(|n| &n.state)
    }

    /// Incoming channels of `node` in attachment order
    pub fn incoming(&self, node: NodeId) -> &[EdgeId] {
        self.nodes
            .get(node.as_usize())
            .map(|n| n.incoming.as_slice())
            .unwrap_or(&[])
    }

    /// Outgoing channels of `node` in attachment order
    pub fn outgoing(&self, node: NodeId) -> &[EdgeId] {
        self.nodes
            .get(node.as_usize())
            .map(|n| n.outgoing.as_slice())
            .unwrap_or(&[])
    }

    pub fn edge(&self, edge: EdgeId) -> Option<&Edge<K::Channel, K::Message>> {
        self.edges.get(edge.as_usize())
    }

    pub fn supervisor(&self) -> &S {
        &self.supervisor
    }

    pub fn into_supervisor(self) -> S {
        self.supervisor
    }

    /// Put every device back into its initial state and empty every channel
    pub fn reset(&mut self) {
        for node in &mut self.nodes {
            node.state = K::State::default();
            K::init(&self.graph, &node.properties, &mut node.state);
        }
        for edge in &mut self.edges {
            edge.slot.clear();
        }
        self.outputs.clear();
        self.tick = 0;
    }

    /// Run from a fresh reset until quiescence or the tick limit
    pub fn run(&mut self, stats: &mut dyn StatsSink) -> Result<RunSummary> {
        info!(
            kind = K::TYPE_NAME,
            devices = self.nodes.len(),
            channels = self.edges.len(),
            "Starting run"
        );

        self.reset();

        let outcome = loop {
            if let Some(limit) = self.config.max_ticks
                && self.tick >= limit
            {
                break RunOutcome::TickLimit;
            }

            let tick_stats = self.step()?;
            stats.on_tick(&tick_stats)?;

            if !tick_stats.is_active() {
                break RunOutcome::Quiescent;
            }
        };

        stats.finish()?;
        self.supervisor.finish()?;

        info!(ticks = self.tick, outcome = ?outcome, "Run finished");

        Ok(RunSummary {
            ticks: self.tick,
            outcome,
        })
    }

    /// Execute one tick and return its statistics.
    ///
    /// [`reset`](Self::reset) must have been called before the first step.
    pub fn step(&mut self) -> Result<TickStats> {
        let tick = self.tick;
        let mut stats = TickStats::new(tick);

        debug!(tick, "Stepping edges");
        self.step_edges(&mut stats)?;

        debug!(tick, "Stepping nodes");
        self.step_nodes(&mut stats)?;

        debug!(tick, outputs = self.outputs.len(), "Flushing outputs");
        while let Some(output) = self.outputs.pop_front() {
            let properties = &self.nodes[output.node.as_usize()].properties;
            self.supervisor
                .on_device_output(output.tick, output.node, properties, &output.message)?;
        }

        debug!(
            tick,
            blocked = stats.node_blocked,
            sent = stats.node_send,
            transit = stats.edge_transit,
            delivered = stats.edge_deliver,
            "Tick complete"
        );

        self.tick += 1;
        Ok(stats)
    }

    fn step_edges(&mut self, stats: &mut TickStats) -> Result<()> {
        let tick = self.tick;

        for (index, edge) in self.edges.iter_mut().enumerate() {
            match edge.slot.step() {
                SlotStep::Idle => stats.edge_idle += 1,
                SlotStep::Transit(remaining) => {
                    trace!(tick, edge = index, remaining, "Message in transit");
                    stats.edge_transit += 1;
                }
                SlotStep::Deliver(message) => {
                    trace!(tick, edge = index, dst = edge.dst.as_usize(), "Message delivered");
                    stats.edge_deliver += 1;

                    let dst = &mut self.nodes[edge.dst.as_usize()];
                    K::on_recv(
                        &self.graph,
                        &edge.channel,
                        &message,
                        &dst.properties,
                        &mut dst.state,
                    )
                    .map_err(|source| SimError::Contract {
                        tick,
                        node: edge.dst,
                        source,
                    })?;
                }
            }
        }
        Ok(())
    }

    fn step_nodes(&mut self, stats: &mut TickStats) -> Result<()> {
        let tick = self.tick;

        for (index, node) in self.nodes.iter_mut().enumerate() {
            let id = NodeId::new(index);

            if !K::ready_to_send(&self.graph, &node.properties, &node.state) {
                trace!(tick, node = index, "Idle");
                stats.node_idle += 1;
                continue;
            }

            // All outgoing channels must be free, or nothing is sent
            if node
                .outgoing
                .iter()
                .any(|e| !self.edges[e.as_usize()].is_empty())
            {
                trace!(tick, node = index, "Blocked");
                stats.node_blocked += 1;
                continue;
            }

            let mut message = K::Message::default();
            let observable = K::on_send(&self.graph, &mut message, &node.properties, &mut node.state)
                .map_err(|source| SimError::Contract {
                    tick,
                    node: id,
                    source,
                })?;

            for &edge_id in &node.outgoing {
                let edge = &mut self.edges[edge_id.as_usize()];
                edge.slot
                    .load(edge_id, message.clone(), edge.delay)
                    .map_err(|source| SimError::Contract {
                        tick,
                        node: id,
                        source,
                    })?;
            }

            trace!(tick, node = index, fanout = node.outgoing.len(), observable, "Send");
            stats.node_send += 1;

            if observable {
                self.outputs.push_back(Output {
                    node: id,
                    message,
                    tick,
                });
            }
        }
        Ok(())
    }
}

impl<K: GraphKind, S: Supervisor<K>> Topology<K> for Simulator<K, S> {
    fn attach_device(&mut self, properties: K::Properties) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.supervisor.on_attach_node(id, &properties);
        self.nodes.push(Node {
            properties,
            state: K::State::default(),
            incoming: Vec::new(),
            outgoing: Vec::new(),
        });
        id
    }

    fn attach_channel(
        &mut self,
        src: NodeId,
        dst: NodeId,
        delay: u32,
        channel: K::Channel,
    ) -> std::result::Result<EdgeId, TopologyError> {
        check_attached(src, self.nodes.len())?;
        check_attached(dst, self.nodes.len())?;

        let id = EdgeId::new(self.edges.len());
        self.edges.push(Edge::new(src, dst, delay, channel));
        self.nodes[src.as_usize()].outgoing.push(id);
        self.nodes[dst.as_usize()].incoming.push(id);
        Ok(id)
    }
}

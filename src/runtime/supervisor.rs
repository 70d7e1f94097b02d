//! Output sink contract
//!
//! A supervisor is attached to the simulator before loading and sees every
//! device once at attach time, then every observable send after the tick
//! that produced it.

use super::graph::NodeId;
use super::kind::GraphKind;

/// An observable send, queued until the end of the tick
#[derive(Debug, Clone)]
pub struct Output<M> {
    /// Device that sent the message
    pub node: NodeId,
    /// Copy of the message that was sent
    pub message: M,
    /// Tick in which the send happened
    pub tick: u32,
}

/// Per-run consumer of device outputs
pub trait Supervisor<K: GraphKind> {
    /// A device was attached. Called in attachment order.
    fn on_attach_node(&mut self, node: NodeId, properties: &K::Properties);

    /// A device output from tick `tick` was flushed. Called in send order,
    /// within and across ticks.
    fn on_device_output(
        &mut self,
        tick: u32,
        node: NodeId,
        properties: &K::Properties,
        message: &K::Message,
    ) -> crate::Result<()>;

    /// The run is over
    fn finish(&mut self) -> crate::Result<()> {
        Ok(())
    }
}

/// A supervisor that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSupervisor;

impl<K: GraphKind> Supervisor<K> for NullSupervisor {
    fn on_attach_node(&mut self, _node: NodeId, _properties: &K::Properties) {}

    fn on_device_output(
        &mut self,
        _tick: u32,
        _node: NodeId,
        _properties: &K::Properties,
        _message: &K::Message,
    ) -> crate::Result<()> {
        Ok(())
    }
}

/// A supervisor that records every callback, for tests and inspection
#[derive(Debug, Clone)]
pub struct RecordingSupervisor<K: GraphKind> {
    pub attached: Vec<NodeId>,
    pub outputs: Vec<(NodeId, K::Message)>,
    /// Tick of each entry in `outputs`
    pub output_ticks: Vec<u32>,
    pub finished: bool,
}

impl<K: GraphKind> RecordingSupervisor<K> {
    pub fn new() -> Self {
        Self {
            attached: Vec::new(),
            outputs: Vec::new(),
            output_ticks: Vec::new(),
            finished: false,
        }
    }
}

impl<K: GraphKind> Default for RecordingSupervisor<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: GraphKind> Supervisor<K> for RecordingSupervisor<K> {
    fn on_attach_node(&mut self, node: NodeId, _properties: &K::Properties) {
        self.attached.push(node);
    }

    fn on_device_output(
        &mut self,
        tick: u32,
        node: NodeId,
        _properties: &K::Properties,
        message: &K::Message,
    ) -> crate::Result<()> {
        self.outputs.push((node, message.clone()));
        self.output_ticks.push(tick);
        Ok(())
    }

    fn finish(&mut self) -> crate::Result<()> {
        self.finished = true;
        Ok(())
    }
}

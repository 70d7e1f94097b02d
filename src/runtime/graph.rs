//! Graph topology: stable node/edge identifiers, the attach interface,
//! and a builder for producing topology files.

use std::fmt;
use std::io::Write;

use super::errors::TopologyError;
use super::kind::GraphKind;
use crate::wire::writer::GraphWriter;

/// Index of a device, assigned in attachment order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

/// Index of a channel, assigned in attachment order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeId(usize);

impl EdgeId {
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    pub fn as_usize(&self) -> usize {
        self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// Anything a topology can be attached to.
///
/// The loader drives this interface, so the same file can populate the
/// simulator or a [`GraphBuilder`].
pub trait Topology<K: GraphKind> {
    /// Append a device and return its index
    fn attach_device(&mut self, properties: K::Properties) -> NodeId;

    /// Append a directed channel `src -> dst`.
    /// Fails if either endpoint has not been attached yet.
    fn attach_channel(
        &mut self,
        src: NodeId,
        dst: NodeId,
        delay: u32,
        channel: K::Channel,
    ) -> Result<EdgeId, TopologyError>;
}

/// Check that `node` is one of the first `attached` devices
pub(crate) fn check_attached(node: NodeId, attached: usize) -> Result<(), TopologyError> {
    if node.as_usize() < attached {
        Ok(())
    } else {
        Err(TopologyError::UnknownNode { node, attached })
    }
}

/// A channel as recorded by the builder
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSpec<C> {
    pub src: NodeId,
    pub dst: NodeId,
    pub delay: u32,
    pub channel: C,
}

/// Builder for constructing a topology without simulating it
///
/// Records devices and channels exactly as attached and can write them
/// out in the wire format.
#[derive(Debug)]
pub struct GraphBuilder<K: GraphKind> {
    graph: K::Graph,
    devices: Vec<K::Properties>,
    channels: Vec<ChannelSpec<K::Channel>>,
}

impl<K: GraphKind> GraphBuilder<K> {
    /// Create a new graph builder
    pub fn new(graph: K::Graph) -> Self {
        Self {
            graph,
            devices: Vec::new(),
            channels: Vec::new(),
        }
    }

    pub fn graph(&self) -> &K::Graph {
        &self.graph
    }

    /// Get all devices in attachment order
    pub fn devices(&self) -> &[K::Properties] {
        &self.devices
    }

    /// Get all channels in attachment order
    pub fn channels(&self) -> &[ChannelSpec<K::Channel>] {
        &self.channels
    }

    /// Get the number of devices
    pub fn num_devices(&self) -> usize {
        self.devices.len()
    }

    /// Get the number of channels
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Write the whole topology in the wire format
    pub fn write<W: Write>(&self, dst: W) -> std::io::Result<()> {
        let mut writer = GraphWriter::<K, W>::new(dst);
        writer.write_header(&self.graph, self.devices.len(), self.channels.len())?;
        writer.write_devices(&self.devices)?;
        writer.write_channels(
            self.channels
                .iter()
                .map(|c| (c.dst, c.src, c.delay, &c.channel)),
        )?;
        writer.finish()
    }
}

impl<K: GraphKind> Topology<K> for GraphBuilder<K> {
    fn attach_device(&mut self, properties: K::Properties) -> NodeId {
        let id = NodeId::new(self.devices.len());
        self.devices.push(properties);
        id
    }

    fn attach_channel(
        &mut self,
        src: NodeId,
        dst: NodeId,
        delay: u32,
        channel: K::Channel,
    ) -> Result<EdgeId, TopologyError> {
        check_attached(src, self.devices.len())?;
        check_attached(dst, self.devices.len())?;

        let id = EdgeId::new(self.channels.len());
        self.channels.push(ChannelSpec {
            src,
            dst,
            delay,
            channel,
        });
        Ok(id)
    }
}

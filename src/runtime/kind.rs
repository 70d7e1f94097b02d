//! Device behavior contract
//!
//! Defines the GraphKind trait that every device/graph kind implements.
//! The simulator is generic over exactly one kind per run; it never looks
//! inside properties, state or messages.

use std::fmt::Debug;

use super::errors::ContractViolation;
use crate::wire::WireFields;

/// A device kind: four callbacks over five data roles
///
/// - `Graph`: per-run properties, read-only to devices
/// - `Properties`: per-device, immutable after attachment
/// - `State`: per-device, mutated only through `init`, `on_recv`, `on_send`
/// - `Message`: payload carried by a single channel traversal
/// - `Channel`: per-channel parameter, immutable
///
/// Implementations must be deterministic and hold no state of their own.
pub trait GraphKind: 'static {
    /// Tag naming this kind in the topology file header
    const TYPE_NAME: &'static str;

    type Graph: WireFields + Clone + Debug;
    type Properties: WireFields + Clone + Debug;
    type State: Default + Clone + Debug;
    type Message: Default + Clone + Debug;
    type Channel: WireFields + Clone + Debug;

    /// Called once per device when the run starts
    fn init(graph: &Self::Graph, properties: &Self::Properties, state: &mut Self::State);

    /// Whether the device wants to send this tick. Must not have side effects.
    fn ready_to_send(
        graph: &Self::Graph,
        properties: &Self::Properties,
        state: &Self::State,
    ) -> bool;

    /// Deliver a message to the destination device.
    /// May be called any number of times per tick (once per incoming channel at most).
    fn on_recv(
        graph: &Self::Graph,
        channel: &Self::Channel,
        message: &Self::Message,
        properties: &Self::Properties,
        state: &mut Self::State,
    ) -> Result<(), ContractViolation>;

    /// Produce the message to broadcast on every outgoing channel.
    ///
    /// Only called when `ready_to_send` holds and every outgoing channel
    /// is empty. Returns whether the send should be surfaced as an output.
    fn on_send(
        graph: &Self::Graph,
        message: &mut Self::Message,
        properties: &Self::Properties,
        state: &mut Self::State,
    ) -> Result<bool, ContractViolation>;
}

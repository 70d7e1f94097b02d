//! Single-slot channel with a counting delay
//!
//! A channel holds at most one message. Occupancy is stored as the number
//! of ticks remaining until delivery:
//!
//! - `0`: empty
//! - `1`: delivered on the next edge step
//! - `n > 1`: in transit, decremented once per edge step
//!
//! Loading a message sets occupancy to `1 + delay`, so a zero-delay channel
//! delivers on the tick after the send, never on the same tick.

use super::errors::ContractViolation;
use super::graph::{EdgeId, NodeId};

/// What a channel did during one edge step
#[derive(Debug, PartialEq, Eq)]
pub enum SlotStep<M> {
    /// Nothing in flight
    Idle,
    /// Message still travelling; carries the ticks remaining after this step
    Transit(u32),
    /// Message arrived and the slot is now empty
    Deliver(M),
}

/// The in-flight message slot of one channel
#[derive(Debug, Clone)]
pub struct ChannelSlot<M> {
    remaining: u32,
    message: Option<M>,
}

impl<M> ChannelSlot<M> {
    pub fn new() -> Self {
        Self {
            remaining: 0,
            message: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.remaining == 0
    }

    /// Ticks until delivery (0 when empty)
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Put a message in flight.
    ///
    /// Refuses to overwrite a message that is still in flight.
    pub fn load(&mut self, edge: EdgeId, message: M, delay: u32) -> Result<(), ContractViolation> {
        if !self.is_empty() {
            return Err(ContractViolation::ChannelOccupied {
                edge,
                remaining: self.remaining,
            });
        }
        self.remaining = delay.saturating_add(1);
        self.message = Some(message);
        Ok(())
    }

    /// Advance by one tick
    pub fn step(&mut self) -> SlotStep<M> {
        match self.remaining {
            0 => SlotStep::Idle,
            1 => {
                self.remaining = 0;
                match self.message.take() {
                    Some(message) => SlotStep::Deliver(message),
                    // remaining and message are always set together in load()
                    None => SlotStep::Idle,
                }
            }
            _ => {
                self.remaining -= 1;
                SlotStep::Transit(self.remaining)
            }
        }
    }

    /// Drop anything in flight
    pub fn clear(&mut self) {
        self.remaining = 0;
        self.message = None;
    }
}

impl<M> Default for ChannelSlot<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// A directed channel between two devices
#[derive(Debug, Clone)]
pub struct Edge<C, M> {
    pub src: NodeId,
    pub dst: NodeId,
    pub delay: u32,
    pub channel: C,
    pub(crate) slot: ChannelSlot<M>,
}

impl<C, M> Edge<C, M> {
    pub fn new(src: NodeId, dst: NodeId, delay: u32, channel: C) -> Self {
        Self {
            src,
            dst,
            delay,
            channel,
            slot: ChannelSlot::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_empty()
    }

    /// Ticks until the in-flight message is delivered (0 when empty)
    pub fn occupancy(&self) -> u32 {
        self.slot.remaining()
    }
}

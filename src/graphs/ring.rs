//! Token ring
//!
//! Each device holds a token or not. A device holding the token passes it
//! to every outgoing channel on its next send; a device that receives a
//! token holds it. Every send is observable and the sink prints one line
//! per send naming the sender.
//!
//! Tokens arriving at a device that already holds one merge.

use std::io::Write;

use crate::runtime::errors::ContractViolation;
use crate::runtime::graph::NodeId;
use crate::runtime::kind::GraphKind;
use crate::runtime::supervisor::Supervisor;
use crate::wire::{FieldError, FieldWriter, Fields, WireFields};

#[derive(Debug, Clone, Copy, Default)]
pub struct Ring;

/// Per-device properties: `id initial`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RingDevice {
    pub id: u32,
    /// Non-zero if the device starts with the token
    pub initial: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RingState {
    pub has_token: bool,
}

impl WireFields for RingDevice {
    fn read_fields(fields: &mut Fields<'_>) -> Result<Self, FieldError> {
        Ok(Self {
            id: fields.next("id")?,
            initial: fields.next("initial")?,
        })
    }

    fn write_fields(&self, out: &mut FieldWriter) {
        out.push(self.id);
        out.push(self.initial);
    }
}

impl GraphKind for Ring {
    const TYPE_NAME: &'static str = "ring";

    type Graph = ();
    type Properties = RingDevice;
    type State = RingState;
    type Message = ();
    type Channel = ();

    fn init(_graph: &(), properties: &RingDevice, state: &mut RingState) {
        state.has_token = properties.initial != 0;
    }

    fn ready_to_send(_graph: &(), _properties: &RingDevice, state: &RingState) -> bool {
        state.has_token
    }

    fn on_recv(
        _graph: &(),
        _channel: &(),
        _message: &(),
        _properties: &RingDevice,
        state: &mut RingState,
    ) -> Result<(), ContractViolation> {
        state.has_token = true;
        Ok(())
    }

    fn on_send(
        _graph: &(),
        _message: &mut (),
        _properties: &RingDevice,
        state: &mut RingState,
    ) -> Result<bool, ContractViolation> {
        if !state.has_token {
            return Err(ContractViolation::NotReady);
        }
        state.has_token = false;
        Ok(true)
    }
}

/// Prints `Tick : <id>` for every send
pub struct RingSupervisor<W: Write> {
    out: W,
}

impl<W: Write> RingSupervisor<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Supervisor<Ring> for RingSupervisor<W> {
    fn on_attach_node(&mut self, _node: NodeId, _properties: &RingDevice) {}

    fn on_device_output(
        &mut self,
        _tick: u32,
        _node: NodeId,
        properties: &RingDevice,
        _message: &(),
    ) -> crate::Result<()> {
        writeln!(self.out, "Tick : {}", properties.id)?;
        Ok(())
    }

    fn finish(&mut self) -> crate::Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

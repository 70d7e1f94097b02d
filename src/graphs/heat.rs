//! Heat diffusion over a mesh of cells
//!
//! Each device is one cell. Time advances per cell: a cell at time `t`
//! waits until it has heard time-`t` heat from every neighbour, then steps
//! to `t + 1` and broadcasts its new heat. Heat and weights are 16.16
//! fixed point.
//!
//! Dirichlet cells ignore their neighbours and ramp by `initValue >> 8`
//! per step, wrapping around inside `[minHeat, maxHeat]`.

use std::collections::BTreeMap;
use std::io::Write;

use tracing::{debug, warn};

use crate::runtime::errors::{ContractViolation, SupervisorError};
use crate::runtime::graph::NodeId;
use crate::runtime::kind::GraphKind;
use crate::runtime::supervisor::Supervisor;
use crate::wire::{FieldError, FieldWriter, Fields, WireFields};

/// Multiply two 16.16 values, rounding to nearest
pub fn mul_fix16(a: i32, b: i32) -> i32 {
    ((i64::from(a) * i64::from(b) + 0x8000) >> 16) as i32
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Heat;

/// Graph properties: `topology width height maxTime outputDelta minHeat maxHeat`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeatGraph {
    /// Mesh shape, informational only (`rect`, `hex`, `mesh`). Must be one
    /// non-empty token without whitespace; the writer rejects anything else.
    pub topology: String,
    pub width: u16,
    pub height: u16,
    /// Cells stop stepping once they reach this time
    pub max_time: u32,
    /// Output every `output_delta` steps; 0 disables output
    pub output_delta: u32,
    pub min_heat: i32,
    pub max_heat: i32,
}

/// Cell properties: `id neighbourCount x y selfWeight initValue isDirichlet isOutput`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeatDevice {
    pub id: u32,
    /// Number of incoming channels
    pub neighbour_count: u32,
    pub x: u16,
    pub y: u16,
    pub self_weight: i32,
    pub init_value: i32,
    pub is_dirichlet: bool,
    pub is_output: bool,
}

/// Channel parameter: weight applied to heat arriving on this channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeatChannel {
    pub weight: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeatMessage {
    pub time: u32,
    pub heat: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeatState {
    pub time: u32,
    pub heat: i32,
    /// Weighted sum for the step to `time + 1`
    pub acc_now: i32,
    pub seen_now: u32,
    /// Weighted sum of early arrivals for the step after that
    pub acc_next: i32,
    pub seen_next: u32,
}

impl WireFields for HeatGraph {
    fn read_fields(fields: &mut Fields<'_>) -> Result<Self, FieldError> {
        Ok(Self {
            topology: fields.next("topology")?,
            width: fields.next("width")?,
            height: fields.next("height")?,
            max_time: fields.next("maxTime")?,
            output_delta: fields.next("outputDelta")?,
            min_heat: fields.next("minHeat")?,
            max_heat: fields.next("maxHeat")?,
        })
    }

    fn write_fields(&self, out: &mut FieldWriter) {
        out.word("topology", &self.topology);
        out.push(self.width);
        out.push(self.height);
        out.push(self.max_time);
        out.push(self.output_delta);
        out.push(self.min_heat);
        out.push(self.max_heat);
    }
}

impl WireFields for HeatDevice {
    fn read_fields(fields: &mut Fields<'_>) -> Result<Self, FieldError> {
        Ok(Self {
            id: fields.next("id")?,
            neighbour_count: fields.next("neighbourCount")?,
            x: fields.next("x")?,
            y: fields.next("y")?,
            self_weight: fields.next("selfWeight")?,
            init_value: fields.next("initValue")?,
            is_dirichlet: fields.next_flag("isDirichlet")?,
            is_output: fields.next_flag("isOutput")?,
        })
    }

    fn write_fields(&self, out: &mut FieldWriter) {
        out.push(self.id);
        out.push(self.neighbour_count);
        out.push(self.x);
        out.push(self.y);
        out.push(self.self_weight);
        out.push(self.init_value);
        out.flag(self.is_dirichlet);
        out.flag(self.is_output);
    }
}

impl WireFields for HeatChannel {
    fn read_fields(fields: &mut Fields<'_>) -> Result<Self, FieldError> {
        Ok(Self {
            weight: fields.next("weight")?,
        })
    }

    fn write_fields(&self, out: &mut FieldWriter) {
        out.push(self.weight);
    }
}

impl GraphKind for Heat {
    const TYPE_NAME: &'static str = "heat";

    type Graph = HeatGraph;
    type Properties = HeatDevice;
    type State = HeatState;
    type Message = HeatMessage;
    type Channel = HeatChannel;

    fn init(_graph: &HeatGraph, properties: &HeatDevice, state: &mut HeatState) {
        *state = HeatState {
            time: 0,
            heat: if properties.is_dirichlet {
                properties.init_value
            } else {
                0
            },
            acc_now: properties.init_value,
            seen_now: properties.neighbour_count,
            acc_next: 0,
            seen_next: 0,
        };
    }

    fn ready_to_send(graph: &HeatGraph, properties: &HeatDevice, state: &HeatState) -> bool {
        state.time < graph.max_time && state.seen_now == properties.neighbour_count
    }

    fn on_recv(
        _graph: &HeatGraph,
        channel: &HeatChannel,
        message: &HeatMessage,
        _properties: &HeatDevice,
        state: &mut HeatState,
    ) -> Result<(), ContractViolation> {
        let weighted = mul_fix16(channel.weight, message.heat);

        if message.time == state.time {
            state.seen_now += 1;
            state.acc_now = state.acc_now.wrapping_add(weighted);
        } else if Some(message.time) == state.time.checked_add(1) {
            state.seen_next += 1;
            state.acc_next = state.acc_next.wrapping_add(weighted);
        } else {
            return Err(ContractViolation::UnexpectedMessageTime {
                current: state.time,
                got: message.time,
            });
        }
        Ok(())
    }

    fn on_send(
        graph: &HeatGraph,
        message: &mut HeatMessage,
        properties: &HeatDevice,
        state: &mut HeatState,
    ) -> Result<bool, ContractViolation> {
        if !Self::ready_to_send(graph, properties, state) {
            return Err(ContractViolation::NotReady);
        }

        state.time += 1;
        if properties.is_dirichlet {
            state.heat = state.heat.wrapping_add(properties.init_value >> 8);
            if state.heat > graph.max_heat {
                state.heat = graph.min_heat;
            } else if state.heat < graph.min_heat {
                state.heat = graph.max_heat;
            }
        } else {
            state.heat = state.acc_now;
        }

        let weighted_self = mul_fix16(properties.self_weight, state.heat);
        state.acc_now = state.acc_next.wrapping_add(weighted_self);
        state.seen_now = state.seen_next;
        state.acc_next = 0;
        state.seen_next = 0;

        message.time = state.time;
        message.heat = state.heat;

        Ok(properties.is_output
            && graph.output_delta != 0
            && state.time % graph.output_delta == 0)
    }
}

/// Heat of every output cell at one time
#[derive(Debug)]
struct Slice {
    heat: Vec<i32>,
    reported: Vec<bool>,
    seen: usize,
}

impl Slice {
    fn new(columns: usize) -> Self {
        Self {
            heat: vec![0; columns],
            reported: vec![false; columns],
            seen: 0,
        }
    }

    fn is_complete(&self) -> bool {
        self.seen == self.heat.len()
    }
}

/// Collects heat outputs into per-time slices.
///
/// Output cells become columns in attachment order. A slice is written as
/// `time, h0, h1, ...` once every output cell has reported for that time.
/// Slices are written in increasing time order; a complete slice waits
/// behind any earlier incomplete one.
pub struct HeatSupervisor<W: Write> {
    out: W,
    /// Column of each attached node, `None` for cells that never output
    columns: Vec<Option<usize>>,
    column_count: usize,
    slices: BTreeMap<u32, Slice>,
    last_emitted: Option<u32>,
    max_pending: usize,
}

impl<W: Write> HeatSupervisor<W> {
    pub fn new(out: W, max_pending: usize) -> Self {
        Self {
            out,
            columns: Vec::new(),
            column_count: 0,
            slices: BTreeMap::new(),
            last_emitted: None,
            max_pending,
        }
    }

    /// Number of output cells
    pub fn column_count(&self) -> usize {
        self.column_count
    }

    /// Slices still waiting for some cell
    pub fn pending(&self) -> usize {
        self.slices.len()
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit_ready(&mut self) -> crate::Result<()> {
        while let Some(entry) = self.slices.first_entry() {
            if !entry.get().is_complete() {
                break;
            }
            let (time, slice) = entry.remove_entry();

            write!(self.out, "{}", time)?;
            for heat in &slice.heat {
                write!(self.out, ", {}", heat)?;
            }
            writeln!(self.out)?;

            debug!(time, "Emitted heat slice");
            self.last_emitted = Some(time);
        }
        Ok(())
    }
}

impl<W: Write> Supervisor<Heat> for HeatSupervisor<W> {
    fn on_attach_node(&mut self, node: NodeId, properties: &HeatDevice) {
        let index = node.as_usize();
        if self.columns.len() <= index {
            self.columns.resize(index + 1, None);
        }
        if properties.is_output {
            self.columns[index] = Some(self.column_count);
            self.column_count += 1;
        }
    }

    fn on_device_output(
        &mut self,
        _tick: u32,
        node: NodeId,
        _properties: &HeatDevice,
        message: &HeatMessage,
    ) -> crate::Result<()> {
        let column = self
            .columns
            .get(node.as_usize())
            .copied()
            .flatten()
            .ok_or(SupervisorError::UnobservedDevice { node })?;

        let time = message.time;
        if let Some(last) = self.last_emitted
            && time <= last
        {
            return Err(SupervisorError::StaleOutput { time }.into());
        }

        if !self.slices.contains_key(&time) && self.slices.len() >= self.max_pending {
            return Err(SupervisorError::TooManyPending {
                pending: self.slices.len() + 1,
                limit: self.max_pending,
            }
            .into());
        }

        let columns = self.column_count;
        let slice = self.slices.entry(time).or_insert_with(|| Slice::new(columns));
        if slice.reported[column] {
            return Err(SupervisorError::DuplicateOutput { node, time }.into());
        }
        slice.reported[column] = true;
        slice.heat[column] = message.heat;
        slice.seen += 1;

        self.emit_ready()
    }

    fn finish(&mut self) -> crate::Result<()> {
        if !self.slices.is_empty() {
            warn!(
                pending = self.slices.len(),
                "Run ended with incomplete heat slices; they are not written"
            );
        }
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimError;
    use crate::config::SimConfig;
    use crate::runtime::graph::Topology;
    use crate::runtime::simulator::{RunOutcome, Simulator};
    use crate::runtime::stats::TickStats;
    use crate::wire::{format_row, parse_row};

    const HALF: i32 = 0x8000;

    fn graph(max_time: u32, output_delta: u32) -> HeatGraph {
        HeatGraph {
            topology: "rect".to_string(),
            width: 2,
            height: 1,
            max_time,
            output_delta,
            min_heat: -30000,
            max_heat: 30000,
        }
    }

    fn cell(id: u32, neighbour_count: u32, init_value: i32, is_dirichlet: bool) -> HeatDevice {
        HeatDevice {
            id,
            neighbour_count,
            x: id as u16,
            y: 0,
            self_weight: if is_dirichlet { 0 } else { HALF },
            init_value,
            is_dirichlet,
            is_output: true,
        }
    }

    #[test]
    fn test_mul_fix16() {
        assert_eq!(mul_fix16(HALF, 100), 50);
        assert_eq!(mul_fix16(0x10000, -3), -3);
        assert_eq!(mul_fix16(1, HALF), 1);
        assert_eq!(mul_fix16(-0x10000, 5), -5);
        assert_eq!(mul_fix16(HALF, 757), 379);
        // Intermediate does not overflow 32 bits
        assert_eq!(mul_fix16(30000 << 8, 30000), 3_515_625);
    }

    #[test]
    fn test_init() {
        let g = graph(4, 1);
        let mut state = HeatState::default();

        Heat::init(&g, &cell(0, 3, 700, false), &mut state);
        assert_eq!((state.heat, state.acc_now, state.seen_now), (0, 700, 3));
        assert!(Heat::ready_to_send(&g, &cell(0, 3, 700, false), &state));

        Heat::init(&g, &cell(0, 0, 700, true), &mut state);
        assert_eq!(state.heat, 700);
    }

    #[test]
    fn test_recv_accumulates_now_and_next() {
        let g = graph(4, 1);
        let props = cell(0, 2, 0, false);
        let channel = HeatChannel { weight: HALF };
        let mut state = HeatState {
            time: 3,
            ..HeatState::default()
        };

        Heat::on_recv(&g, &channel, &HeatMessage { time: 3, heat: 100 }, &props, &mut state).unwrap();
        Heat::on_recv(&g, &channel, &HeatMessage { time: 4, heat: 40 }, &props, &mut state).unwrap();
        assert_eq!((state.acc_now, state.seen_now), (50, 1));
        assert_eq!((state.acc_next, state.seen_next), (20, 1));
        assert!(!Heat::ready_to_send(&g, &props, &state));

        let err = Heat::on_recv(&g, &channel, &HeatMessage { time: 6, heat: 1 }, &props, &mut state)
            .unwrap_err();
        assert_eq!(err, ContractViolation::UnexpectedMessageTime { current: 3, got: 6 });
    }

    #[test]
    fn test_send_rolls_accumulators() {
        let g = graph(4, 2);
        let props = cell(0, 1, 0, false);
        let mut state = HeatState {
            time: 1,
            acc_now: 600,
            seen_now: 1,
            acc_next: 30,
            seen_next: 1,
            ..HeatState::default()
        };

        let mut message = HeatMessage::default();
        let observable = Heat::on_send(&g, &mut message, &props, &mut state).unwrap();
        assert!(observable);
        assert_eq!(message, HeatMessage { time: 2, heat: 600 });
        assert_eq!((state.acc_now, state.seen_now), (330, 1));
        assert_eq!((state.acc_next, state.seen_next), (0, 0));

        // Time 3 is not a multiple of outputDelta
        assert!(!Heat::on_send(&g, &mut message, &props, &mut state).unwrap());
    }

    #[test]
    fn test_dirichlet_ramp_wraps() {
        let mut g = graph(10, 1);
        g.min_heat = -100;
        g.max_heat = 100;
        let props = cell(0, 0, 60 << 8, true);
        let mut state = HeatState::default();
        Heat::init(&g, &props, &mut state);

        let mut message = HeatMessage::default();
        let mut seen = Vec::new();
        for _ in 0..6 {
            Heat::on_send(&g, &mut message, &props, &mut state).unwrap();
            seen.push(message.heat);
        }
        assert_eq!(seen, vec![-100, -40, 20, 80, -100, -40]);
    }

    #[test]
    fn test_send_past_max_time_is_violation() {
        let g = graph(1, 1);
        let props = cell(0, 0, 0, true);
        let mut state = HeatState {
            time: 1,
            ..HeatState::default()
        };
        let err = Heat::on_send(&g, &mut HeatMessage::default(), &props, &mut state).unwrap_err();
        assert_eq!(err, ContractViolation::NotReady);
    }

    #[test]
    fn test_zero_output_delta_disables_output() {
        let g = graph(4, 0);
        let props = cell(0, 0, 256, true);
        let mut state = HeatState::default();
        Heat::init(&g, &props, &mut state);
        assert!(!Heat::on_send(&g, &mut HeatMessage::default(), &props, &mut state).unwrap());
    }

    #[test]
    fn test_two_cell_run() {
        let mut sim = Simulator::new(graph(3, 1), HeatSupervisor::new(Vec::new(), 8));
        let source = sim.attach_device(cell(0, 0, 512, true));
        let sink = sim.attach_device(cell(1, 1, 1000, false));
        sim.attach_channel(source, sink, 0, HeatChannel { weight: HALF })
            .unwrap();

        let mut stats = Vec::<TickStats>::new();
        let summary = sim.run(&mut stats).unwrap();
        assert_eq!(summary.outcome, RunOutcome::Quiescent);
        assert_eq!(summary.ticks, 5);

        let supervisor = sim.into_supervisor();
        assert_eq!(supervisor.pending(), 0);
        let text = String::from_utf8(supervisor.into_inner()).unwrap();
        assert_eq!(text, "1, 514, 1000\n2, 516, 757\n3, 518, 637\n");
    }

    #[test]
    fn test_rows() {
        let device = HeatDevice {
            id: 7,
            neighbour_count: 4,
            x: 3,
            y: 5,
            self_weight: HALF,
            init_value: -12,
            is_dirichlet: false,
            is_output: true,
        };
        assert_eq!(format_row(&device).unwrap(), "7 4 3 5 32768 -12 0 1");
        assert_eq!(parse_row::<HeatDevice>("7 4 3 5 32768 -12 0 1"), Ok(device));
        assert!(parse_row::<HeatDevice>("7 4 3 5 32768 -12 0 true").is_err());

        let g = graph(64, 8);
        assert_eq!(format_row(&g).unwrap(), "rect 2 1 64 8 -30000 30000");
        assert_eq!(parse_row::<HeatGraph>("rect 2 1 64 8 -30000 30000"), Ok(g));
        assert_eq!(parse_row::<HeatChannel>("8192"), Ok(HeatChannel { weight: 8192 }));
    }

    #[test]
    fn test_topology_name_must_be_one_token() {
        for name in ["", "square mesh"] {
            let builder = crate::runtime::graph::GraphBuilder::<Heat>::new(HeatGraph {
                topology: name.to_string(),
                ..graph(4, 1)
            });
            let mut out = Vec::new();
            let err = builder.write(&mut out).unwrap_err();
            assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
        }
    }

    fn sink(max_pending: usize) -> HeatSupervisor<Vec<u8>> {
        let mut sink = HeatSupervisor::new(Vec::new(), max_pending);
        let mut quiet = cell(1, 0, 0, false);
        quiet.is_output = false;
        sink.on_attach_node(NodeId::new(0), &cell(0, 0, 0, false));
        sink.on_attach_node(NodeId::new(1), &quiet);
        sink.on_attach_node(NodeId::new(2), &cell(2, 0, 0, false));
        sink
    }

    fn report(
        sink: &mut HeatSupervisor<Vec<u8>>,
        node: usize,
        time: u32,
        heat: i32,
    ) -> crate::Result<()> {
        sink.on_device_output(
            0,
            NodeId::new(node),
            &HeatDevice::default(),
            &HeatMessage { time, heat },
        )
    }

    fn written(sink: &HeatSupervisor<Vec<u8>>) -> String {
        String::from_utf8(sink.out.clone()).unwrap()
    }

    #[test]
    fn test_slices_emit_in_time_order() {
        let mut sink = sink(8);
        assert_eq!(sink.column_count(), 2);

        report(&mut sink, 0, 2, 10).unwrap();
        report(&mut sink, 0, 4, 11).unwrap();
        assert_eq!(written(&sink), "");

        report(&mut sink, 2, 2, 20).unwrap();
        assert_eq!(written(&sink), "2, 10, 20\n");
        assert_eq!(sink.pending(), 1);

        report(&mut sink, 2, 4, 21).unwrap();
        assert_eq!(written(&sink), "2, 10, 20\n4, 11, 21\n");
        assert_eq!(sink.pending(), 0);
    }

    #[test]
    fn test_complete_slice_waits_for_earlier_one() {
        let mut sink = sink(8);
        report(&mut sink, 0, 2, 1).unwrap();
        report(&mut sink, 0, 4, 2).unwrap();
        report(&mut sink, 2, 4, 3).unwrap();
        assert_eq!(written(&sink), "");

        report(&mut sink, 2, 2, 4).unwrap();
        assert_eq!(written(&sink), "2, 1, 4\n4, 2, 3\n");
    }

    #[test]
    fn test_sink_errors() {
        let mut sink = sink(8);
        assert!(matches!(
            report(&mut sink, 1, 2, 0),
            Err(SimError::Supervisor(SupervisorError::UnobservedDevice { .. }))
        ));

        report(&mut sink, 0, 2, 0).unwrap();
        assert!(matches!(
            report(&mut sink, 0, 2, 0),
            Err(SimError::Supervisor(SupervisorError::DuplicateOutput { time: 2, .. }))
        ));

        report(&mut sink, 2, 2, 0).unwrap();
        assert!(matches!(
            report(&mut sink, 0, 2, 0),
            Err(SimError::Supervisor(SupervisorError::StaleOutput { time: 2 }))
        ));
    }

    #[test]
    fn test_pending_limit() {
        let mut sink = sink(2);
        report(&mut sink, 0, 2, 0).unwrap();
        report(&mut sink, 0, 4, 0).unwrap();
        let err = report(&mut sink, 0, 6, 0).unwrap_err();
        assert!(matches!(
            err,
            SimError::Supervisor(SupervisorError::TooManyPending { pending: 3, limit: 2 })
        ));
        // Existing slices still accept reports
        report(&mut sink, 2, 4, 0).unwrap();
    }

    #[test]
    fn test_finish_drops_incomplete() {
        let mut sink = sink(8);
        report(&mut sink, 0, 2, 5).unwrap();
        sink.finish().unwrap();
        assert_eq!(written(&sink), "");
        assert_eq!(sink.pending(), 1);
    }

    #[test]
    fn test_pending_limit_from_config() {
        let config = SimConfig::default();
        let sink = HeatSupervisor::new(Vec::new(), config.max_pending_slices);
        assert_eq!(sink.max_pending, 64);
    }
}

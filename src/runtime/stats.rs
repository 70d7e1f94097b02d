//! Per-tick activity counters and the sinks that consume them

use std::fmt;
use std::io::Write;

/// What happened during a single tick
///
/// Every node lands in exactly one of the idle/blocked/send buckets and
/// every edge in exactly one of idle/transit/deliver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    pub tick: u32,

    pub node_idle: u32,
    pub node_blocked: u32,
    pub node_send: u32,

    pub edge_idle: u32,
    pub edge_transit: u32,
    pub edge_deliver: u32,
}

impl TickStats {
    /// Fresh counters for `tick`
    pub fn new(tick: u32) -> Self {
        Self {
            tick,
            ..Self::default()
        }
    }

    /// A tick is active if any node or edge did something other than idle
    pub fn is_active(&self) -> bool {
        self.node_blocked + self.node_send + self.edge_transit + self.edge_deliver > 0
    }

    pub fn nodes(&self) -> u32 {
        self.node_idle + self.node_blocked + self.node_send
    }

    pub fn edges(&self) -> u32 {
        self.edge_idle + self.edge_transit + self.edge_deliver
    }
}

/// Formats as one line of the statistics stream (without the newline)
impl fmt::Display for TickStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, {}, {}, {}, {}, {}",
            self.tick,
            self.node_idle,
            self.node_blocked,
            self.node_send,
            self.edge_idle,
            self.edge_transit,
            self.edge_deliver
        )
    }
}

/// Receives the statistics of every tick, in tick order
pub trait StatsSink {
    fn on_tick(&mut self, stats: &TickStats) -> std::io::Result<()>;

    /// Called once after the last tick
    fn finish(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Collects statistics in memory
impl StatsSink for Vec<TickStats> {
    fn on_tick(&mut self, stats: &TickStats) -> std::io::Result<()> {
        self.push(*stats);
        Ok(())
    }
}

/// Writes one comma-separated line per tick
pub struct StatsWriter<W: Write> {
    writer: W,
}

impl<W: Write> StatsWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> StatsSink for StatsWriter<W> {
    fn on_tick(&mut self, stats: &TickStats) -> std::io::Result<()> {
        writeln!(self.writer, "{}", stats)
    }

    fn finish(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

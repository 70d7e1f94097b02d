//! Topology file writer

use std::io::{self, Write};
use std::marker::PhantomData;

use super::{
    BEGIN_EDGES, BEGIN_HEADER, BEGIN_NODES, END_EDGES, END_HEADER, END_NODES, FieldWriter, MAGIC,
    FieldError, WireFields, format_row,
};
use crate::runtime::graph::NodeId;
use crate::runtime::kind::GraphKind;

fn unwritable(error: FieldError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, error)
}

/// Writes one topology of kind `K`, section by section
///
/// Sections must be written in order: header, devices, channels.
pub struct GraphWriter<K: GraphKind, W: Write> {
    writer: W,
    _kind: PhantomData<K>,
}

impl<K: GraphKind, W: Write> GraphWriter<K, W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            _kind: PhantomData,
        }
    }

    pub fn write_header(
        &mut self,
        graph: &K::Graph,
        device_count: usize,
        channel_count: usize,
    ) -> std::io::Result<()> {
        writeln!(self.writer, "{}", MAGIC)?;
        writeln!(self.writer, "{}", K::TYPE_NAME)?;
        writeln!(self.writer, "{}", BEGIN_HEADER)?;
        writeln!(self.writer, "{}", K::TYPE_NAME)?;
        writeln!(self.writer, "{} {}", device_count, channel_count)?;
        writeln!(self.writer, "{}", format_row(graph).map_err(unwritable)?)?;
        writeln!(self.writer, "{}", END_HEADER)
    }

    pub fn write_devices(&mut self, devices: &[K::Properties]) -> std::io::Result<()> {
        writeln!(self.writer, "{}", BEGIN_NODES)?;
        for properties in devices {
            writeln!(self.writer, "{}", format_row(properties).map_err(unwritable)?)?;
        }
        writeln!(self.writer, "{}", END_NODES)
    }

    /// Channels are given as `(dst, src, delay, channel)`, the on-disk column order
    pub fn write_channels<'a, I>(&mut self, channels: I) -> std::io::Result<()>
    where
        I: IntoIterator<Item = (NodeId, NodeId, u32, &'a K::Channel)>,
        K::Channel: 'a,
    {
        writeln!(self.writer, "{}", BEGIN_EDGES)?;
        for (dst, src, delay, channel) in channels {
            let mut row = FieldWriter::new();
            row.push(dst.as_usize());
            row.push(src.as_usize());
            row.push(delay);
            channel.write_fields(&mut row);
            writeln!(self.writer, "{}", row.into_line().map_err(unwritable)?)?;
        }
        writeln!(self.writer, "{}", END_EDGES)
    }

    /// Flush the underlying writer
    pub fn finish(mut self) -> std::io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

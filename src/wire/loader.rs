//! Topology file loader
//!
//! Reads the wire format line by line and attaches every device and
//! channel to a [`Topology`]. All errors carry the 1-based line number
//! they were detected on.

use std::io::BufRead;

use tracing::{debug, info};

use super::{
    BEGIN_EDGES, BEGIN_HEADER, BEGIN_NODES, END_EDGES, END_HEADER, END_NODES, FieldError, Fields,
    MAGIC, WireFields, parse_row,
};
use crate::runtime::errors::FormatError;
use crate::runtime::graph::{NodeId, Topology};
use crate::runtime::kind::GraphKind;

/// The header section of a topology file
#[derive(Debug, Clone)]
pub struct Header<K: GraphKind> {
    pub graph: K::Graph,
    pub device_count: usize,
    pub channel_count: usize,
}

/// Line-counting reader over a topology file
pub struct GraphReader<R: BufRead> {
    reader: R,
    line: usize,
}

impl<R: BufRead> GraphReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, line: 0 }
    }

    /// Number of lines consumed so far
    pub fn line(&self) -> usize {
        self.line
    }

    /// Read the magic line and the kind tag that selects the device kind
    pub fn read_kind_tag(&mut self) -> Result<String, FormatError> {
        self.expect_keyword(MAGIC)?;
        let tag = self.next_line()?.trim().to_string();
        debug!("Topology kind tag '{}'", tag);
        Ok(tag)
    }

    /// Read the header section. The kind tag must already have been consumed.
    pub fn read_header<K: GraphKind>(&mut self) -> Result<Header<K>, FormatError> {
        self.expect_keyword(BEGIN_HEADER)?;
        self.expect_keyword(K::TYPE_NAME)?;

        let line = self.next_line()?;
        let (device_count, channel_count) =
            parse_counts(&line).map_err(|e| self.bad_field("counts", e))?;

        let line = self.next_line()?;
        let graph = parse_row::<K::Graph>(&line).map_err(|e| self.bad_field("graph properties", e))?;

        self.expect_keyword(END_HEADER)?;

        info!(
            kind = K::TYPE_NAME,
            devices = device_count,
            channels = channel_count,
            "Loaded topology header"
        );

        Ok(Header {
            graph,
            device_count,
            channel_count,
        })
    }

    /// Read the node and edge sections, attaching everything to `target`
    pub fn read_body<K, T>(
        &mut self,
        device_count: usize,
        channel_count: usize,
        target: &mut T,
    ) -> Result<(), FormatError>
    where
        K: GraphKind,
        T: Topology<K>,
    {
        self.read_devices::<K, T>(device_count, target)?;
        self.read_channels::<K, T>(channel_count, target)?;
        debug!("Loaded {} devices, {} channels", device_count, channel_count);
        Ok(())
    }

    fn read_devices<K, T>(&mut self, count: usize, target: &mut T) -> Result<(), FormatError>
    where
        K: GraphKind,
        T: Topology<K>,
    {
        self.expect_keyword(BEGIN_NODES)?;
        for _ in 0..count {
            let line = self.row(END_NODES, "device properties")?;
            let properties =
                parse_row::<K::Properties>(&line).map_err(|e| self.bad_field("device properties", e))?;
            target.attach_device(properties);
        }
        self.expect_keyword(END_NODES)
    }

    fn read_channels<K, T>(&mut self, count: usize, target: &mut T) -> Result<(), FormatError>
    where
        K: GraphKind,
        T: Topology<K>,
    {
        self.expect_keyword(BEGIN_EDGES)?;
        for _ in 0..count {
            let line = self.row(END_EDGES, "channel")?;
            let (dst, src, delay, channel) =
                parse_channel_row::<K::Channel>(&line).map_err(|e| self.bad_field("channel", e))?;

            target
                .attach_channel(NodeId::new(src), NodeId::new(dst), delay, channel)
                .map_err(|source| FormatError::Topology {
                    line: self.line,
                    source,
                })?;
        }
        self.expect_keyword(END_EDGES)
    }

    /// Read a data row, reporting an early section end as a count mismatch
    fn row(&mut self, end: &str, what: &str) -> Result<String, FormatError> {
        let line = self.next_line()?;
        if line.trim() == end {
            return Err(FormatError::UnexpectedLine {
                line: self.line,
                expected: what.to_string(),
                found: end.to_string(),
            });
        }
        Ok(line)
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), FormatError> {
        let got = self.next_line()?;
        if got.trim() != keyword {
            return Err(FormatError::UnexpectedLine {
                line: self.line,
                expected: keyword.to_string(),
                found: got.trim().to_string(),
            });
        }
        Ok(())
    }

    fn next_line(&mut self) -> Result<String, FormatError> {
        let line = self.line + 1;
        let mut buf = String::new();
        let n = self
            .reader
            .read_line(&mut buf)
            .map_err(|source| FormatError::Io { line, source })?;
        if n == 0 {
            return Err(FormatError::UnexpectedEof { line });
        }
        self.line = line;
        buf.truncate(buf.trim_end_matches(['\r', '\n']).len());
        Ok(buf)
    }

    fn bad_field(&self, what: &str, error: FieldError) -> FormatError {
        FormatError::BadField {
            line: self.line,
            what: what.to_string(),
            reason: error.to_string(),
        }
    }
}

fn parse_counts(line: &str) -> Result<(usize, usize), FieldError> {
    let mut fields = Fields::new(line);
    let devices = fields.next("deviceCount")?;
    let channels = fields.next("channelCount")?;
    fields.finish()?;
    Ok((devices, channels))
}

fn parse_channel_row<C: WireFields>(line: &str) -> Result<(usize, usize, u32, C), FieldError> {
    let mut fields = Fields::new(line);
    let dst = fields.next("dstIndex")?;
    let src = fields.next("srcIndex")?;
    let delay = fields.next("delay")?;
    let channel = C::read_fields(&mut fields)?;
    fields.finish()?;
    Ok((dst, src, delay, channel))
}

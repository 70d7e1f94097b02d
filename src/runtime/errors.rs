//! Error types for the runtime system

use super::graph::{EdgeId, NodeId};

/// Error type for topology construction
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    #[error("Channel endpoint {node} is not attached (only {attached} devices exist)")]
    UnknownNode { node: NodeId, attached: usize },
}

/// Error type for wire format loading
///
/// Line numbers are 1-based and refer to the line that failed.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("Couldn't read line number {line}")]
    UnexpectedEof { line: usize },

    #[error("At line {line} : expecting '{expected}', but got '{found}'")]
    UnexpectedLine {
        line: usize,
        expected: String,
        found: String,
    },

    #[error("At line {line} : couldn't read {what}: {reason}")]
    BadField {
        line: usize,
        what: String,
        reason: String,
    },

    #[error("At line {line} : {source}")]
    Topology {
        line: usize,
        #[source]
        source: TopologyError,
    },

    #[error("At line {line} : IO error: {source}")]
    Io {
        line: usize,
        #[source]
        source: std::io::Error,
    },
}

impl FormatError {
    /// Line the error was detected on
    pub fn line(&self) -> usize {
        match self {
            FormatError::UnexpectedEof { line }
            | FormatError::UnexpectedLine { line, .. }
            | FormatError::BadField { line, .. }
            | FormatError::Topology { line, .. }
            | FormatError::Io { line, .. } => *line,
        }
    }
}

/// A device kind or the engine broke the behavior contract
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractViolation {
    #[error("message for time {got} delivered while device is at time {current}")]
    UnexpectedMessageTime { current: u32, got: u32 },

    #[error("on_send called while device is not ready to send")]
    NotReady,

    #[error("write into occupied channel {edge} ({remaining} ticks remaining)")]
    ChannelOccupied { edge: EdgeId, remaining: u32 },
}

/// Error type for output sinks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SupervisorError {
    #[error("Output from {node} is not from an observed device")]
    UnobservedDevice { node: NodeId },

    #[error("Output for time {time} arrived after that slice was emitted")]
    StaleOutput { time: u32 },

    #[error("Device {node} reported twice for time {time}")]
    DuplicateOutput { node: NodeId, time: u32 },

    #[error("{pending} slices pending (limit {limit}); some observed device stopped reporting")]
    TooManyPending { pending: usize, limit: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error_carries_line() {
        let e = FormatError::UnexpectedLine {
            line: 7,
            expected: "EndNodes".to_string(),
            found: "0 1".to_string(),
        };
        assert_eq!(e.line(), 7);
        assert_eq!(
            e.to_string(),
            "At line 7 : expecting 'EndNodes', but got '0 1'"
        );
    }

    #[test]
    fn test_topology_error_display() {
        let e = TopologyError::UnknownNode {
            node: NodeId::new(5),
            attached: 2,
        };
        assert!(e.to_string().contains("N5"));
    }
}

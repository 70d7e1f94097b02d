//! Run configuration and log verbosity

use tracing_subscriber::EnvFilter;

/// Default bound on heat slices waiting for missing devices
pub const DEFAULT_MAX_PENDING_SLICES: usize = 64;

/// Settings for a single simulation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
    /// Stop after this many ticks even if the graph is still active
    pub max_ticks: Option<u32>,
    /// How many incomplete output slices a supervisor may hold at once
    pub max_pending_slices: usize,
}

impl SimConfig {
    pub fn new() -> Self {
        Self {
            max_ticks: None,
            max_pending_slices: DEFAULT_MAX_PENDING_SLICES,
        }
    }

    /// Limit the number of ticks
    pub fn with_max_ticks(mut self, max_ticks: u32) -> Self {
        self.max_ticks = Some(max_ticks);
        self
    }

    /// Set the pending-slice bound for aggregating supervisors
    pub fn with_max_pending_slices(mut self, limit: usize) -> Self {
        self.max_pending_slices = limit;
        self
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a numeric `--log-level` to a tracing filter directive.
///
/// 0 keeps only warnings and errors, 1 adds run-level progress, 2 adds
/// per-tick phases, 3 and above add every node and edge outcome.
pub fn level_directive(log_level: i32) -> &'static str {
    match log_level {
        i32::MIN..=0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Build the log filter: `RUST_LOG` wins when set, otherwise `log_level` decides
pub fn env_filter(log_level: i32) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_directive(log_level)))
}

//! Topology generators

pub mod heat_rect;

pub use heat_rect::{HeatRectParams, build_heat_rect};

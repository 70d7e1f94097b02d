//! Rectangular heat grid generator
//!
//! Builds a square mesh of heat cells. Every cell listens to its four
//! neighbours (fewer on the border). Border cells are Dirichlet sources;
//! interior cells start at random heat. Channel delays are geometrically
//! distributed so that cells drift out of lock-step.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::graphs::heat::{Heat, HeatChannel, HeatDevice, HeatGraph};
use crate::runtime::errors::TopologyError;
use crate::runtime::graph::{GraphBuilder, NodeId, Topology};

/// Weight of a cell's own heat in the relaxation kernel (0.5)
pub const SELF_WEIGHT: i32 = 0x8000;
/// Weight of each neighbour's heat ((1 - 0.5) / 4)
pub const OTHER_WEIGHT: i32 = 0x2000;

/// Channel delay: trailing one bits in 16 random bits, `P(d) = 2^-(d+1)`
pub fn random_delay<R: Rng>(rng: &mut R) -> u32 {
    rng.r#gen::<u16>().trailing_ones()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeatRectParams {
    /// Requested side length in cells, rounded to fit the output grid
    pub width: u32,
    pub max_time: u32,
    /// Output every this many steps
    pub output_delta_time: u32,
    /// Output every this many cells along each axis
    pub output_delta_space: u32,
    pub min_heat: i32,
    pub max_heat: i32,
    pub seed: u64,
}

impl Default for HeatRectParams {
    fn default() -> Self {
        Self {
            width: 65,
            max_time: 64,
            output_delta_time: 8,
            output_delta_space: 2,
            min_heat: -30000,
            max_heat: 30000,
            seed: 0,
        }
    }
}

impl HeatRectParams {
    fn space_step(&self) -> u32 {
        self.output_delta_space.max(1)
    }

    /// Side length actually generated: a multiple of the output spacing, plus one
    pub fn side(&self) -> u32 {
        let ds = self.space_step();
        (self.width / ds).max(1) * ds + 1
    }

    /// Pixels per cell in the graph's rendering dimensions
    pub fn output_scale(&self) -> u32 {
        (256 / self.side()).max(1)
    }

    /// Rendering size, padded up to a multiple of four
    pub fn pixel_size(&self) -> u32 {
        let raw = (self.side() - 1) * self.output_scale() + 1;
        raw.div_ceil(4) * 4
    }
}

fn to_u16(value: u32) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

/// Build the grid described by `params`
pub fn build_heat_rect(params: &HeatRectParams) -> Result<GraphBuilder<Heat>, TopologyError> {
    let side = params.side();
    let ds = params.space_step();
    let scale = params.output_scale();
    let pixels = to_u16(params.pixel_size());

    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
    let mut builder = GraphBuilder::<Heat>::new(HeatGraph {
        topology: "rect".to_string(),
        width: pixels,
        height: pixels,
        max_time: params.max_time,
        output_delta: params.output_delta_time,
        min_heat: params.min_heat,
        max_heat: params.max_heat,
    });

    let (low, high) = if params.min_heat <= params.max_heat {
        (params.min_heat, params.max_heat)
    } else {
        (params.max_heat, params.min_heat)
    };

    for y in 0..side {
        for x in 0..side {
            let edge_y = y == 0 || y == side - 1;
            let edge_x = x == 0 || x == side - 1;
            let neighbour_count = 4 - u32::from(edge_x) - u32::from(edge_y);

            // One draw per cell, used or not
            let random = rng.gen_range(low..=high);

            let init_value = if edge_y {
                let phase = 3.0 * (x as f32 / side as f32 + y as f32 / side as f32);
                (phase.sin() * 30000.0) as i32
            } else if edge_x {
                if x == 0 {
                    params.min_heat / 2
                } else {
                    params.max_heat / 2
                }
            } else {
                random
            };

            builder.attach_device(HeatDevice {
                id: y * side + x,
                neighbour_count,
                x: to_u16(x * scale),
                y: to_u16(y * scale),
                self_weight: SELF_WEIGHT,
                init_value,
                is_dirichlet: edge_x || edge_y,
                is_output: x % ds == 0 && y % ds == 0,
            });
        }
    }

    let index = |x: u32, y: u32| NodeId::new((y * side + x) as usize);
    for y in 0..side {
        for x in 0..side {
            let dst = index(x, y);
            let mut sources = Vec::with_capacity(4);
            if x > 0 {
                sources.push(index(x - 1, y));
            }
            if x + 1 < side {
                sources.push(index(x + 1, y));
            }
            if y > 0 {
                sources.push(index(x, y - 1));
            }
            if y + 1 < side {
                sources.push(index(x, y + 1));
            }

            for src in sources {
                let delay = random_delay(&mut rng);
                builder.attach_channel(src, dst, delay, HeatChannel { weight: OTHER_WEIGHT })?;
            }
        }
    }

    debug!(
        side,
        devices = builder.num_devices(),
        channels = builder.num_channels(),
        "Built heat grid"
    );

    Ok(builder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::GraphReader;

    fn small() -> HeatRectParams {
        HeatRectParams {
            width: 4,
            ..HeatRectParams::default()
        }
    }

    #[test]
    fn test_geometry() {
        let defaults = HeatRectParams::default();
        assert_eq!(defaults.side(), 65);
        assert_eq!(defaults.output_scale(), 3);
        assert_eq!(defaults.pixel_size(), 196);

        let params = small();
        assert_eq!(params.side(), 5);
        assert_eq!(params.output_scale(), 51);
        assert_eq!(params.pixel_size(), 208);

        let odd = HeatRectParams {
            width: 7,
            output_delta_space: 3,
            ..HeatRectParams::default()
        };
        assert_eq!(odd.side(), 7);

        let degenerate = HeatRectParams {
            width: 0,
            output_delta_space: 0,
            ..HeatRectParams::default()
        };
        assert_eq!(degenerate.side(), 2);
    }

    #[test]
    fn test_counts_and_neighbours() {
        let builder = build_heat_rect(&small()).unwrap();
        assert_eq!(builder.num_devices(), 25);
        assert_eq!(builder.num_channels(), 4 * 25 - 2 * 5 - 2 * 5);

        let mut incoming = vec![0u32; builder.num_devices()];
        for channel in builder.channels() {
            incoming[channel.dst.as_usize()] += 1;
            assert_eq!(channel.channel.weight, OTHER_WEIGHT);
        }
        for (device, seen) in builder.devices().iter().zip(&incoming) {
            assert_eq!(device.neighbour_count, *seen);
        }
    }

    #[test]
    fn test_cell_roles() {
        let builder = build_heat_rect(&small()).unwrap();
        let devices = builder.devices();

        let corner = &devices[0];
        assert!(corner.is_dirichlet && corner.is_output);
        assert_eq!(corner.neighbour_count, 2);

        // (1, 1) is interior and off the output lattice
        let inner = &devices[6];
        assert!(!inner.is_dirichlet && !inner.is_output);
        assert!((-30000..=30000).contains(&inner.init_value));

        // (2, 2) is interior and on it
        let centre = &devices[12];
        assert!(!centre.is_dirichlet && centre.is_output);
        assert_eq!((centre.x, centre.y), (102, 102));

        // Left and right walls hold half the extremes
        assert_eq!(devices[5].init_value, -15000);
        assert_eq!(devices[9].init_value, 15000);
    }

    #[test]
    fn test_deterministic_for_seed() {
        let write = |params: &HeatRectParams| {
            let mut out = Vec::new();
            build_heat_rect(params).unwrap().write(&mut out).unwrap();
            out
        };
        assert_eq!(write(&small()), write(&small()));
    }

    #[test]
    fn test_interior_heat_spans_range() {
        let params = HeatRectParams {
            width: 32,
            min_heat: -4,
            max_heat: 3,
            ..HeatRectParams::default()
        };
        let builder = build_heat_rect(&params).unwrap();
        let side = params.side() as usize;
        let mut seen = [0u32; 8];
        for (index, device) in builder.devices().iter().enumerate() {
            if !device.is_dirichlet {
                assert!((-4..=3).contains(&device.init_value), "cell {index}");
                seen[(device.init_value + 4) as usize] += 1;
            }
        }
        // 31 x 31 interior cells over eight values
        assert_eq!(seen.iter().sum::<u32>() as usize, (side - 2) * (side - 2));
        assert!(seen.iter().all(|&n| n > 60), "{seen:?}");
    }

    #[test]
    fn test_inverted_heat_range_is_tolerated() {
        let params = HeatRectParams {
            min_heat: 10,
            max_heat: -10,
            ..small()
        };
        let builder = build_heat_rect(&params).unwrap();
        assert!(
            builder
                .devices()
                .iter()
                .filter(|d| !d.is_dirichlet)
                .all(|d| (-10..=10).contains(&d.init_value))
        );
    }

    #[test]
    fn test_output_loads_back() {
        let params = small();
        let mut out = Vec::new();
        build_heat_rect(&params).unwrap().write(&mut out).unwrap();

        let mut reader = GraphReader::new(out.as_slice());
        assert_eq!(reader.read_kind_tag().unwrap(), "heat");
        let header = reader.read_header::<Heat>().unwrap();
        assert_eq!(header.graph.max_time, 64);
        assert_eq!(header.graph.output_delta, 8);
        assert_eq!((header.device_count, header.channel_count), (25, 80));
    }

    #[test]
    fn test_delay_distribution() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let delays: Vec<u32> = (0..4096).map(|_| random_delay(&mut rng)).collect();
        assert!(delays.iter().all(|&d| d <= 16));
        let zeros = delays.iter().filter(|&&d| d == 0).count();
        // Roughly half should be zero
        assert!((1600..2500).contains(&zeros));
    }
}

//! Aggregate traffic statistics and congestion heatmaps
//!
//! Computed from a world's vehicles at the statistics period. An empty
//! population yields all-zero statistics.

use serde::Serialize;

use super::config::ProfileParams;
use super::topology::CityTopology;
use super::types::{StreetId, CANVAS_HEIGHT, CANVAS_WIDTH};
use super::vehicle::Vehicle;

/// Wait time above which a vehicle counts towards congestion
pub const CONGESTED_WAIT: u32 = 30;
/// Vehicles per lane at which a street reaches density 1.0
const VEHICLES_PER_LANE: f32 = 10.0;
/// Side length of a heatmap cell
pub const HEATMAP_CELL: f32 = 50.0;

/// Traffic density class of a street
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DensityLevel {
    High,
    Medium,
    Low,
    FreeFlow,
}

impl DensityLevel {
    pub fn classify(density: f32, thresholds: (f32, f32, f32)) -> Self {
        let (high, medium, low) = thresholds;
        if density > high {
            DensityLevel::High
        } else if density > medium {
            DensityLevel::Medium
        } else if density > low {
            DensityLevel::Low
        } else {
            DensityLevel::FreeFlow
        }
    }
}

/// Occupancy of one street
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreetTraffic {
    pub street: StreetId,
    pub name: String,
    pub vehicles: usize,
    pub density: f32,
    pub level: DensityLevel,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrafficStats {
    pub average_speed: f32,
    /// Share of vehicles waiting longer than [`CONGESTED_WAIT`], in percent
    pub congestion_percent: f32,
    pub total_vehicles: usize,
    pub high_traffic_streets: usize,
    pub medium_traffic_streets: usize,
    pub low_traffic_streets: usize,
    pub free_flow_streets: usize,
    pub streets: Vec<StreetTraffic>,
}

impl TrafficStats {
    pub fn compute(vehicles: &[Vehicle], topology: &CityTopology, params: &ProfileParams) -> Self {
        let mut stats = TrafficStats {
            total_vehicles: vehicles.len(),
            ..Default::default()
        };

        if !vehicles.is_empty() {
            let total = vehicles.len() as f32;
            stats.average_speed = vehicles.iter().map(|v| v.speed).sum::<f32>() / total;
            let congested = vehicles
                .iter()
                .filter(|v| v.wait_time > CONGESTED_WAIT)
                .count();
            stats.congestion_percent = congested as f32 / total * 100.0;
        }

        for (index, street) in topology.streets.iter().enumerate() {
            let count = vehicles
                .iter()
                .filter(|v| street.band_contains(&v.position))
                .count();
            let density = count as f32 / (street.lane_count.max(1) as f32 * VEHICLES_PER_LANE);
            let level = DensityLevel::classify(density, params.density_thresholds);
            match level {
                DensityLevel::High => stats.high_traffic_streets += 1,
                DensityLevel::Medium => stats.medium_traffic_streets += 1,
                DensityLevel::Low => stats.low_traffic_streets += 1,
                DensityLevel::FreeFlow => stats.free_flow_streets += 1,
            }
            stats.streets.push(StreetTraffic {
                street: StreetId(index),
                name: street.name.clone(),
                vehicles: count,
                density,
                level,
            });
        }

        stats
    }
}

/// Relative change from `baseline` to `optimized`, in percent
///
/// A zero baseline yields 0 rather than an undefined ratio.
pub fn improvement_percent(baseline: f32, optimized: f32) -> f32 {
    if baseline == 0.0 {
        0.0
    } else {
        (optimized - baseline) / baseline * 100.0
    }
}

/// One cell of the congestion grid
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct HeatmapCell {
    pub x: f32,
    pub y: f32,
    pub count: usize,
    /// Mean of (1 - speed / ceiling) over the vehicles in the cell
    pub congestion: f32,
    pub mean_wait: f32,
}

/// Grid of congestion cells covering the canvas
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Heatmap {
    pub columns: usize,
    pub rows: usize,
    pub cells: Vec<HeatmapCell>,
}

impl Heatmap {
    pub fn generate(vehicles: &[Vehicle], params: &ProfileParams) -> Self {
        let columns = (CANVAS_WIDTH / HEATMAP_CELL).ceil() as usize;
        let rows = (CANVAS_HEIGHT / HEATMAP_CELL).ceil() as usize;
        let mut cells: Vec<HeatmapCell> = (0..rows * columns)
            .map(|i| HeatmapCell {
                x: (i % columns) as f32 * HEATMAP_CELL,
                y: (i / columns) as f32 * HEATMAP_CELL,
                ..Default::default()
            })
            .collect();

        for vehicle in vehicles {
            let column = (vehicle.position.x / HEATMAP_CELL).floor();
            let row = (vehicle.position.y / HEATMAP_CELL).floor();
            if column < 0.0 || row < 0.0 {
                continue;
            }
            let (column, row) = (column as usize, row as usize);
            if column >= columns || row >= rows {
                continue;
            }
            let cell = &mut cells[row * columns + column];
            let ceiling = vehicle.ceiling(params);
            cell.count += 1;
            if ceiling > 0.0 {
                cell.congestion += 1.0 - vehicle.speed / ceiling;
            }
            cell.mean_wait += vehicle.wait_time as f32;
        }

        for cell in cells.iter_mut().filter(|c| c.count > 0) {
            cell.congestion /= cell.count as f32;
            cell.mean_wait /= cell.count as f32;
        }

        Self {
            columns,
            rows,
            cells,
        }
    }

    pub fn cell_at(&self, column: usize, row: usize) -> Option<&HeatmapCell> {
        if column >= self.columns || row >= self.rows {
            return None;
        }
        self.cells.get(row * self.columns + column)
    }

    /// Cells with the most vehicles first
    pub fn hottest(&self, limit: usize) -> Vec<HeatmapCell> {
        let mut occupied: Vec<HeatmapCell> =
            self.cells.iter().copied().filter(|c| c.count > 0).collect();
        occupied.sort_by(|a, b| b.count.cmp(&a.count));
        occupied.truncate(limit);
        occupied
    }
}

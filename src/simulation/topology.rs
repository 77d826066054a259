//! Static city layout: streets, junctions and obstacles
//!
//! The topology is immutable while a simulation runs. Infrastructure edits are
//! applied to a copy between runs and take effect when the world is reset.

use anyhow::{bail, Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::types::{
    Heading, JunctionId, JunctionKind, Orientation, Position, StreetId, CANVAS_HEIGHT,
    CANVAS_WIDTH,
};

/// Most lanes a street may be widened to
pub const MAX_LANES: u32 = 5;

/// Street thickness added or removed per lane
pub const LANE_EXPANSION_WIDTH: f32 = 30.0;

/// Inset from the street edge a vehicle must keep to count as on the road
const CURB_MARGIN: f32 = 5.0;

/// How far past the canvas edge a street stays drivable along its axis
const EDGE_SLACK: f32 = 20.0;

/// Distance from a junction probed when looking for an outgoing street
const TURN_PROBE_DISTANCE: f32 = 50.0;

/// A straight street, axis-aligned, with `origin` at its top-left corner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Street {
    pub name: String,
    pub origin: Position,
    pub width: f32,
    pub height: f32,
    pub lane_count: u32,
    pub orientation: Orientation,
}

impl Street {
    /// Extent across the street (x for vertical streets, y for horizontal)
    pub fn lateral_range(&self) -> (f32, f32) {
        match self.orientation {
            Orientation::Vertical => (self.origin.x, self.origin.x + self.width),
            Orientation::Horizontal => (self.origin.y, self.origin.y + self.height),
        }
    }

    /// Coordinate of `position` across this street's axis
    pub fn lateral_of(&self, position: &Position) -> f32 {
        match self.orientation {
            Orientation::Vertical => position.x,
            Orientation::Horizontal => position.y,
        }
    }

    /// Thickness across the street axis
    pub fn thickness(&self) -> f32 {
        let (min, max) = self.lateral_range();
        max - min
    }

    pub fn lane_width(&self) -> f32 {
        self.thickness() / self.lane_count.max(1) as f32
    }

    /// Lateral coordinate of the middle of `lane`
    pub fn lane_center(&self, lane: u32) -> f32 {
        let (min, _) = self.lateral_range();
        min + (lane as f32 + 0.5) * self.lane_width()
    }

    /// Lane containing `position`, clamped to the street's lanes
    pub fn lane_at(&self, position: &Position) -> u32 {
        let (min, _) = self.lateral_range();
        let lane = ((self.lateral_of(position) - min) / self.lane_width()).floor();
        (lane.max(0.0) as u32).min(self.lane_count.saturating_sub(1))
    }

    pub fn center_line(&self) -> f32 {
        let (min, max) = self.lateral_range();
        (min + max) * 0.5
    }

    /// Strictly inside the street band (ignores the street's length)
    pub fn band_contains(&self, position: &Position) -> bool {
        let (min, max) = self.lateral_range();
        let lateral = self.lateral_of(position);
        lateral > min && lateral < max
    }

    /// Inside the street band, edges included
    pub fn band_covers(&self, position: &Position) -> bool {
        let (min, max) = self.lateral_range();
        let lateral = self.lateral_of(position);
        lateral >= min && lateral <= max
    }

    /// Inside the band shrunk by the curb margin
    fn lane_area_covers(&self, lateral: f32) -> bool {
        let (min, max) = self.lateral_range();
        lateral >= min + CURB_MARGIN && lateral <= max - CURB_MARGIN
    }

    /// On the drivable surface: inside the curbs and close enough to the canvas
    pub fn is_drivable(&self, position: &Position) -> bool {
        match self.orientation {
            Orientation::Vertical => {
                self.lane_area_covers(position.x)
                    && position.y >= -EDGE_SLACK
                    && position.y <= CANVAS_HEIGHT + EDGE_SLACK
            }
            Orientation::Horizontal => {
                self.lane_area_covers(position.y)
                    && position.x >= -EDGE_SLACK
                    && position.x <= CANVAS_WIDTH + EDGE_SLACK
            }
        }
    }

    fn set_lane_count(&mut self, lanes: u32) {
        let lanes = lanes.clamp(1, MAX_LANES);
        let delta = lanes as f32 - self.lane_count as f32;
        let thickness = (self.thickness() + delta * LANE_EXPANSION_WIDTH).max(LANE_EXPANSION_WIDTH);
        match self.orientation {
            Orientation::Vertical => self.width = thickness,
            Orientation::Horizontal => self.height = thickness,
        }
        self.lane_count = lanes;
    }
}

/// A street crossing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Junction {
    pub name: String,
    pub position: Position,
    pub kind: JunctionKind,
    pub has_signal: bool,
}

impl Junction {
    pub fn is_signalised(&self) -> bool {
        self.kind == JunctionKind::Signal && self.has_signal
    }
}

/// A building footprint vehicles may not enter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub position: Position,
    pub width: f32,
    pub height: f32,
}

impl Obstacle {
    /// Whether `position` is inside the footprint grown by `margin` on every side
    pub fn intersects(&self, position: &Position, margin: f32) -> bool {
        position.x > self.position.x - margin
            && position.x < self.position.x + self.width + margin
            && position.y > self.position.y - margin
            && position.y < self.position.y + self.height + margin
    }
}

/// A change to the city's infrastructure, applied between runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "edit", rename_all = "snake_case")]
pub enum InfrastructureEdit {
    SetJunctionKind { junction: JunctionId, kind: JunctionKind },
    SetLaneCount { street: StreetId, lanes: u32 },
}

/// Streets, junctions and obstacles of one city
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CityTopology {
    pub streets: Vec<Street>,
    pub junctions: Vec<Junction>,
    pub obstacles: Vec<Obstacle>,
}

impl CityTopology {
    pub fn new(streets: Vec<Street>, junctions: Vec<Junction>, obstacles: Vec<Obstacle>) -> Self {
        Self {
            streets,
            junctions,
            obstacles,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let topology: CityTopology =
            serde_json::from_str(json).context("Failed to parse city topology")?;
        topology.validate()?;
        Ok(topology)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read topology file {}", path.display()))?;
        Self::from_json_str(&json)
    }

    /// Reject layouts the movement rules can't work with
    pub fn validate(&self) -> Result<()> {
        for street in &self.streets {
            if street.lane_count == 0 || street.lane_count > MAX_LANES {
                bail!(
                    "Street '{}' has {} lanes (expected 1..={})",
                    street.name,
                    street.lane_count,
                    MAX_LANES
                );
            }
            if street.width <= 0.0 || street.height <= 0.0 {
                bail!("Street '{}' has a non-positive size", street.name);
            }
        }
        for junction in &self.junctions {
            let on_vertical = self
                .streets_with(Orientation::Vertical)
                .any(|(_, s)| s.band_covers(&junction.position));
            let on_horizontal = self
                .streets_with(Orientation::Horizontal)
                .any(|(_, s)| s.band_covers(&junction.position));
            if !(on_vertical && on_horizontal) {
                bail!(
                    "Junction '{}' at ({}, {}) is not on a street crossing",
                    junction.name,
                    junction.position.x,
                    junction.position.y
                );
            }
        }
        Ok(())
    }

    pub fn street(&self, id: StreetId) -> Option<&Street> {
        self.streets.get(id.0)
    }

    pub fn junction(&self, id: JunctionId) -> Option<&Junction> {
        self.junctions.get(id.0)
    }

    pub fn street_by_name(&self, name: &str) -> Option<StreetId> {
        self.streets.iter().position(|s| s.name == name).map(StreetId)
    }

    pub fn junction_by_name(&self, name: &str) -> Option<JunctionId> {
        self.junctions
            .iter()
            .position(|j| j.name == name)
            .map(JunctionId)
    }

    pub fn streets_with(
        &self,
        orientation: Orientation,
    ) -> impl Iterator<Item = (StreetId, &Street)> + '_ {
        self.streets
            .iter()
            .enumerate()
            .filter(move |(_, s)| s.orientation == orientation)
            .map(|(i, s)| (StreetId(i), s))
    }

    /// First street whose band covers `position`
    pub fn street_at(&self, position: &Position) -> Option<(StreetId, &Street)> {
        self.streets
            .iter()
            .enumerate()
            .find(|(_, s)| s.band_covers(position))
            .map(|(i, s)| (StreetId(i), s))
    }

    /// First street of `orientation` whose band covers `position`
    pub fn street_at_oriented(
        &self,
        position: &Position,
        orientation: Orientation,
    ) -> Option<(StreetId, &Street)> {
        self.streets_with(orientation)
            .find(|(_, s)| s.band_covers(position))
    }

    pub fn signal_junctions(&self) -> impl Iterator<Item = (JunctionId, &Junction)> + '_ {
        self.junctions
            .iter()
            .enumerate()
            .filter(|(_, j)| j.is_signalised())
            .map(|(i, j)| (JunctionId(i), j))
    }

    pub fn is_drivable(&self, position: &Position) -> bool {
        self.streets.iter().any(|s| s.is_drivable(position))
    }

    pub fn hits_obstacle(&self, position: &Position, margin: f32) -> bool {
        self.obstacles.iter().any(|o| o.intersects(position, margin))
    }

    /// Whether a street leads away from `from` towards `heading`
    pub fn has_street_towards(&self, from: &Position, heading: Heading) -> bool {
        let probe = from.advanced(heading, TURN_PROBE_DISTANCE);
        self.streets.iter().any(|s| s.lane_area_covers(s.lateral_of(&probe)))
    }

    pub fn apply_edit(&mut self, edit: &InfrastructureEdit) -> Result<()> {
        match *edit {
            InfrastructureEdit::SetJunctionKind { junction, kind } => {
                let target = self
                    .junctions
                    .get_mut(junction.0)
                    .with_context(|| format!("Unknown junction {:?}", junction))?;
                target.kind = kind;
                target.has_signal = kind == JunctionKind::Signal;
                info!("Junction '{}' is now {:?}", target.name, kind);
            }
            InfrastructureEdit::SetLaneCount { street, lanes } => {
                let target = self
                    .streets
                    .get_mut(street.0)
                    .with_context(|| format!("Unknown street {:?}", street))?;
                let before = target.lane_count;
                target.set_lane_count(lanes);
                info!(
                    "Street '{}' lanes {} -> {}",
                    target.name, before, target.lane_count
                );
            }
        }
        Ok(())
    }

    /// Stock 900x800 city with four streets in each direction
    pub fn default_city() -> Self {
        let vertical = [
            ("Main Street", 100.0, 80.0, 2),
            ("Oak Avenue", 300.0, 80.0, 2),
            ("Pine Boulevard", 500.0, 100.0, 3),
            ("Elm Street", 700.0, 80.0, 2),
        ];
        let horizontal = [
            ("North Road", 100.0, 80.0, 2),
            ("Market Street", 300.0, 80.0, 2),
            ("Central Avenue", 500.0, 100.0, 3),
            ("South Drive", 700.0, 80.0, 2),
        ];

        let mut streets = Vec::new();
        for (name, x, width, lanes) in vertical {
            streets.push(Street {
                name: name.to_string(),
                origin: Position::new(x, 0.0),
                width,
                height: CANVAS_HEIGHT,
                lane_count: lanes,
                orientation: Orientation::Vertical,
            });
        }
        for (name, y, height, lanes) in horizontal {
            streets.push(Street {
                name: name.to_string(),
                origin: Position::new(0.0, y),
                width: CANVAS_WIDTH,
                height,
                lane_count: lanes,
                orientation: Orientation::Horizontal,
            });
        }

        use JunctionKind::{Signal, Stop};
        let junction_rows = [
            [
                ("Mango Junction", Signal),
                ("Apple Crossing", Stop),
                ("Cherry Square", Signal),
                ("Berry Plaza", Stop),
            ],
            [
                ("Orange Circle", Stop),
                ("Peach Junction", Signal),
                ("Grape Square", Signal),
                ("Lemon Crossing", Stop),
            ],
            [
                ("Kiwi Plaza", Signal),
                ("Plum Junction", Stop),
                ("Banana Square", Signal),
                ("Melon Circle", Signal),
            ],
            [
                ("Papaya Junction", Stop),
                ("Guava Square", Signal),
                ("Lime Plaza", Stop),
                ("Pear Crossing", Signal),
            ],
        ];

        let mut junctions = Vec::new();
        for (row, names) in junction_rows.iter().enumerate() {
            for (col, (name, kind)) in names.iter().enumerate() {
                junctions.push(Junction {
                    name: name.to_string(),
                    position: Position::new(140.0 + col as f32 * 200.0, 140.0 + row as f32 * 200.0),
                    kind: *kind,
                    has_signal: *kind == Signal,
                });
            }
        }

        let buildings = [
            (20.0, 20.0, 60.0, 75.0),
            (200.0, 20.0, 80.0, 60.0),
            (400.0, 20.0, 60.0, 85.0),
            (600.0, 20.0, 85.0, 60.0),
            (800.0, 20.0, 60.0, 70.0),
            (20.0, 200.0, 65.0, 80.0),
            (200.0, 200.0, 60.0, 95.0),
            (400.0, 200.0, 80.0, 70.0),
            (600.0, 200.0, 70.0, 80.0),
            (800.0, 200.0, 60.0, 90.0),
            (20.0, 400.0, 60.0, 80.0),
            (200.0, 400.0, 75.0, 85.0),
            (400.0, 400.0, 60.0, 75.0),
            (620.0, 400.0, 70.0, 80.0),
            (800.0, 400.0, 65.0, 70.0),
            (20.0, 600.0, 60.0, 90.0),
            (200.0, 600.0, 70.0, 80.0),
            (400.0, 600.0, 80.0, 75.0),
            (620.0, 600.0, 60.0, 85.0),
            (800.0, 600.0, 70.0, 80.0),
        ];
        let obstacles = buildings
            .iter()
            .map(|&(x, y, width, height)| Obstacle {
                position: Position::new(x, y),
                width,
                height,
            })
            .collect();

        Self::new(streets, junctions, obstacles)
    }
}

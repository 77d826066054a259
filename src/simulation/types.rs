//! Core types for the traffic simulation
//!
//! Plain data shared by the topology, vehicles, signals and the controller.

use serde::{Deserialize, Serialize};

/// Index of a street inside its topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreetId(pub usize);

/// Index of a junction inside its topology
///
/// Junction order never changes once a topology is built, so the id stays
/// stable across resets and infrastructure edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JunctionId(pub usize);

/// Index of a vehicle inside its world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VehicleId(pub usize);

/// A 2D position on the city canvas (y grows downwards)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Position moved `amount` units along `heading`
    pub fn advanced(&self, heading: Heading, amount: f32) -> Position {
        let (dx, dy) = heading.unit();
        Position::new(self.x + dx * amount, self.y + dy * amount)
    }
}

/// Direction of travel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Heading {
    Up,
    Down,
    Left,
    Right,
}

impl Heading {
    pub const ALL: [Heading; 4] = [Heading::Up, Heading::Down, Heading::Left, Heading::Right];

    /// Unit step in canvas coordinates
    pub fn unit(self) -> (f32, f32) {
        match self {
            Heading::Up => (0.0, -1.0),
            Heading::Down => (0.0, 1.0),
            Heading::Left => (-1.0, 0.0),
            Heading::Right => (1.0, 0.0),
        }
    }

    pub fn opposite(self) -> Heading {
        match self {
            Heading::Up => Heading::Down,
            Heading::Down => Heading::Up,
            Heading::Left => Heading::Right,
            Heading::Right => Heading::Left,
        }
    }

    /// Heading after a right turn (screen coordinates, y down)
    pub fn right_turn(self) -> Heading {
        match self {
            Heading::Up => Heading::Right,
            Heading::Right => Heading::Down,
            Heading::Down => Heading::Left,
            Heading::Left => Heading::Up,
        }
    }

    pub fn left_turn(self) -> Heading {
        self.right_turn().opposite()
    }

    /// Orientation of the street a vehicle with this heading drives on
    pub fn orientation(self) -> Orientation {
        match self {
            Heading::Up | Heading::Down => Orientation::Vertical,
            Heading::Left | Heading::Right => Orientation::Horizontal,
        }
    }
}

/// Orientation of a street
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Vertical,
    Horizontal,
}

/// Control type of a junction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JunctionKind {
    Signal,
    Stop,
    Roundabout,
}

/// Type of road user in the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleKind {
    Car,
    Bus,
    Bike,
    Pedestrian,
}

impl VehicleKind {
    pub const ALL: [VehicleKind; 4] = [
        VehicleKind::Car,
        VehicleKind::Bus,
        VehicleKind::Bike,
        VehicleKind::Pedestrian,
    ];

    /// Cruising speed in canvas units per tick, before the profile multiplier
    pub fn base_speed(self) -> f32 {
        match self {
            VehicleKind::Car => 0.7,
            VehicleKind::Bus => 0.5,
            VehicleKind::Bike => 0.8,
            VehicleKind::Pedestrian => 0.3,
        }
    }

    /// Footprint used as the obstacle clearance margin
    pub fn size(self) -> f32 {
        match self {
            VehicleKind::Car => 22.0,
            VehicleKind::Bus => 35.0,
            VehicleKind::Bike => 14.0,
            VehicleKind::Pedestrian => 12.0,
        }
    }
}

/// Which parameter set a city runs with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CityProfile {
    /// Fixed signal timing, stock speeds
    #[default]
    Baseline,
    /// Learning-controlled signals, boosted speeds and wider detection
    Optimized,
}

/// Canvas extent in world units
pub const CANVAS_WIDTH: f32 = 900.0;
pub const CANVAS_HEIGHT: f32 = 800.0;

/// Below this speed a vehicle counts as waiting
pub const WAITING_SPEED: f32 = 0.1;

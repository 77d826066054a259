//! Vehicle movement logic for the traffic simulation
//!
//! A vehicle resolves one tick of movement against the signals, the other
//! vehicles and (optionally) the city topology. Rules are evaluated in a fixed
//! order and the first one that applies decides the vehicle's speed:
//!
//! 1. stop-sign protocol
//! 2. red-light compliance
//! 3. car following (with an occasional lane change)
//! 4. free flow
//!
//! Stop signs and red lights end the tick without moving. Otherwise the
//! vehicle advances, is checked against obstacles and street bounds, wraps
//! around the canvas edge, and may turn at a junction.

use log::debug;
use ordered_float::OrderedFloat;
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::Serialize;

use super::config::ProfileParams;
use super::signal::{SignalColor, TrafficSignal};
use super::topology::CityTopology;
use super::types::{
    Heading, JunctionKind, Orientation, Position, VehicleId, VehicleKind, CANVAS_HEIGHT,
    CANVAS_WIDTH, WAITING_SPEED,
};

/// Distance to a stop junction inside which the stop protocol is considered
pub const STOP_SIGN_RANGE: f32 = 50.0;
/// Outer edge of the zone in which a vehicle must stand still before a stop sign
pub const STOP_ZONE_OUTER: f32 = 40.0;
/// Inner edge of the stop zone; vehicles already in the junction roll on
pub const STOP_ZONE_INNER: f32 = 10.0;

/// Extra look-ahead beyond the following distance when searching for a leader
const LEADER_LOOKAHEAD: f32 = 20.0;
/// Lateral tolerance for two vehicles to share a corridor
const CORRIDOR_HALF_WIDTH: f32 = 25.0;
/// Fraction of the leader's speed a too-close follower brakes to
pub const FOLLOW_BRAKE_FACTOR: f32 = 0.8;
const FOLLOW_MATCH_FACTOR: f32 = 1.1;

const LANE_CHANGE_PROBABILITY: f64 = 0.01;
const LANE_CHANGE_SCAN_RADIUS: f32 = 50.0;
const LANE_CHANGE_LATERAL_CLEARANCE: f32 = 15.0;
const LANE_CHANGE_LONGITUDINAL_CLEARANCE: f32 = 40.0;

/// Speed gained per tick in free flow
pub const ACCELERATION: f32 = 0.05;

/// Ticks that must pass after a turn before the next one
pub const TURN_COOLDOWN: u32 = 180;
const TURN_PROBABILITY: f64 = 0.003;
/// Distance to a junction inside which a vehicle may turn
pub const TURN_JUNCTION_RADIUS: f32 = 20.0;
const STRAIGHT_WEIGHT: f64 = 0.7;
const RIGHT_TURN_WEIGHT: f64 = 0.9;

/// Distance from the far edge a wrapped vehicle reappears at
const WRAP_INSET: f32 = 20.0;

const SPAWN_ATTEMPTS: usize = 8;

/// Progress through the stop-sign protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopSignState {
    #[default]
    NotStopped,
    Stopping,
    Released,
}

/// Which rule decided a vehicle's tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Held at a stop sign
    StopSign,
    /// Held at a red light
    RedLight,
    /// Move reverted by an obstacle
    Blocked,
    /// Advanced (possibly reverted onto the street, wrapped or turned)
    Moved,
}

/// Everything besides the other vehicles that a move is resolved against
pub struct MoveContext<'a> {
    pub signals: &'a [TrafficSignal],
    pub topology: Option<&'a CityTopology>,
    pub params: &'a ProfileParams,
}

/// A road user in the traffic simulation
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub kind: VehicleKind,
    pub position: Position,
    pub heading: Heading,
    pub speed: f32,
    /// Kind-derived cruising speed, before the profile multiplier
    pub base_speed: f32,
    /// Grows while stalled, shrinks while flowing
    pub wait_time: u32,
    pub lane_index: u32,
    pub stop_sign_state: StopSignState,
    pub stop_timer: u32,
    /// Ticks since the last heading change
    pub turn_cooldown: u32,
    pub total_distance: f32,
}

impl Vehicle {
    pub fn new(id: VehicleId, kind: VehicleKind, position: Position, heading: Heading) -> Self {
        let base_speed = kind.base_speed();
        Self {
            id,
            kind,
            position,
            heading,
            speed: base_speed,
            base_speed,
            wait_time: 0,
            lane_index: 0,
            stop_sign_state: StopSignState::NotStopped,
            stop_timer: 0,
            turn_cooldown: 0,
            total_distance: 0.0,
        }
    }

    /// Create a vehicle at a random street-relative position
    ///
    /// Vertical headings are placed on vertical streets and horizontal ones on
    /// horizontal streets, in the middle 40% of the street's width.
    pub fn spawn<R: Rng>(
        id: VehicleId,
        kind: VehicleKind,
        heading: Heading,
        topology: Option<&CityTopology>,
        rng: &mut R,
    ) -> Self {
        let mut vehicle = Vehicle::new(id, kind, Position::default(), heading);

        let Some(topology) = topology else {
            vehicle.position = Position::new(
                rng.random_range(0.0..CANVAS_WIDTH),
                rng.random_range(0.0..CANVAS_HEIGHT),
            );
            return vehicle;
        };

        let candidates: Vec<_> = topology.streets_with(heading.orientation()).collect();
        for _ in 0..SPAWN_ATTEMPTS {
            let position = match candidates.choose(rng) {
                Some((_, street)) => {
                    let (min, _) = street.lateral_range();
                    let thickness = street.thickness();
                    let lateral = min + thickness * 0.3 + rng.random::<f32>() * thickness * 0.4;
                    match street.orientation {
                        Orientation::Vertical => {
                            Position::new(lateral, rng.random_range(0.0..CANVAS_HEIGHT))
                        }
                        Orientation::Horizontal => {
                            Position::new(rng.random_range(0.0..CANVAS_WIDTH), lateral)
                        }
                    }
                }
                None => Position::new(
                    rng.random_range(0.0..CANVAS_WIDTH),
                    rng.random_range(0.0..CANVAS_HEIGHT),
                ),
            };
            vehicle.position = position;
            if !topology.hits_obstacle(&position, kind.size()) {
                break;
            }
        }
        vehicle.refresh_lane(Some(topology));
        vehicle
    }

    /// Speed ceiling under the given profile
    pub fn ceiling(&self, params: &ProfileParams) -> f32 {
        self.base_speed * params.speed_multiplier
    }

    pub fn is_waiting(&self) -> bool {
        self.speed < WAITING_SPEED
    }

    /// Resolve one tick of movement
    ///
    /// `others` is the full vehicle list; the entry with this vehicle's id is
    /// skipped.
    pub fn step<R: Rng>(
        &mut self,
        others: &[Vehicle],
        ctx: &MoveContext<'_>,
        rng: &mut R,
    ) -> MoveOutcome {
        let ceiling = self.ceiling(ctx.params);

        if let Some(topology) = ctx.topology {
            if self.resolve_stop_sign(topology, ctx.params.stop_dwell) {
                return MoveOutcome::StopSign;
            }
        }

        if self.red_light_ahead(ctx.signals, ctx.params.light_detection_radius) {
            self.speed = 0.0;
            self.wait_time += 1;
            return MoveOutcome::RedLight;
        }

        match self.find_leader(others, ctx.params.following_distance + LEADER_LOOKAHEAD) {
            Some((gap, leader_speed)) => {
                if gap < ctx.params.following_distance {
                    self.speed = (leader_speed * FOLLOW_BRAKE_FACTOR).max(0.0);
                    self.wait_time += 1;
                } else {
                    self.speed = (leader_speed * FOLLOW_MATCH_FACTOR).min(ceiling);
                }
                self.speed = self.speed.min(ceiling);

                if let Some(topology) = ctx.topology {
                    if self.speed < ceiling * 0.5 && rng.random_bool(LANE_CHANGE_PROBABILITY) {
                        self.try_lane_change(others, topology);
                    }
                }
            }
            None => {
                self.speed = (self.speed + ACCELERATION).min(ceiling);
                self.wait_time = self.wait_time.saturating_sub(1);
            }
        }

        let previous = self.position;
        self.position = previous.advanced(self.heading, self.speed);

        if let Some(topology) = ctx.topology {
            if topology.hits_obstacle(&self.position, self.kind.size()) {
                self.position = previous;
                self.speed = 0.0;
                return MoveOutcome::Blocked;
            }
            if !topology.is_drivable(&self.position) {
                self.position = previous;
                self.speed = (self.speed * 0.5).max(0.0);
            }
        }

        self.total_distance += self.speed;
        self.wrap_around(ctx.topology, rng);

        self.turn_cooldown = self.turn_cooldown.saturating_add(1);
        if let Some(topology) = ctx.topology {
            if self.turn_cooldown > TURN_COOLDOWN && rng.random_bool(TURN_PROBABILITY) {
                self.try_turn(topology, rng);
            }
        }

        self.speed = self.speed.clamp(0.0, ceiling);
        MoveOutcome::Moved
    }

    /// Returns true when the vehicle is held at a stop sign this tick
    fn resolve_stop_sign(&mut self, topology: &CityTopology, dwell: u32) -> bool {
        let nearest_stop = topology
            .junctions
            .iter()
            .filter(|j| j.kind == JunctionKind::Stop)
            .map(|j| self.position.distance(&j.position))
            .find(|&d| d < STOP_SIGN_RANGE);

        let Some(distance) = nearest_stop else {
            self.stop_sign_state = StopSignState::NotStopped;
            self.stop_timer = 0;
            return false;
        };

        if distance < STOP_ZONE_OUTER
            && distance > STOP_ZONE_INNER
            && self.stop_sign_state != StopSignState::Released
        {
            self.speed = 0.0;
            self.wait_time += 1;
            self.stop_timer += 1;
            self.stop_sign_state = if self.stop_timer >= dwell {
                StopSignState::Released
            } else {
                StopSignState::Stopping
            };
            return true;
        }
        false
    }

    fn red_light_ahead(&self, signals: &[TrafficSignal], radius: f32) -> bool {
        signals.iter().any(|signal| {
            signal.color == SignalColor::Red && self.position.distance(&signal.position) < radius
        })
    }

    /// Whether `other` is ahead of this vehicle in the same heading and corridor
    fn is_ahead(&self, other: &Vehicle) -> bool {
        if other.heading != self.heading {
            return false;
        }
        let (lateral_gap, ahead) = match self.heading {
            Heading::Up => ((self.position.x - other.position.x).abs(), other.position.y < self.position.y),
            Heading::Down => ((self.position.x - other.position.x).abs(), other.position.y > self.position.y),
            Heading::Left => ((self.position.y - other.position.y).abs(), other.position.x < self.position.x),
            Heading::Right => ((self.position.y - other.position.y).abs(), other.position.x > self.position.x),
        };
        ahead && lateral_gap < CORRIDOR_HALF_WIDTH
    }

    /// Nearest vehicle ahead within `range`, as (distance, speed)
    fn find_leader(&self, others: &[Vehicle], range: f32) -> Option<(f32, f32)> {
        others
            .iter()
            .filter(|other| other.id != self.id && self.is_ahead(other))
            .map(|other| (self.position.distance(&other.position), other.speed))
            .filter(|(distance, _)| *distance < range)
            .min_by_key(|(distance, _)| OrderedFloat(*distance))
    }

    fn try_lane_change(&mut self, others: &[Vehicle], topology: &CityTopology) {
        let Some((_, street)) =
            topology.street_at_oriented(&self.position, self.heading.orientation())
        else {
            return;
        };
        if street.lane_count < 2 {
            return;
        }

        let current_lane = street.lane_at(&self.position);
        // Adjacent lanes only: move right unless already in the last lane
        let target_lane = if current_lane + 1 < street.lane_count {
            current_lane + 1
        } else {
            current_lane - 1
        };
        let target = street.lane_center(target_lane);

        let blocked = others.iter().any(|other| {
            if other.id == self.id
                || self.position.distance(&other.position) > LANE_CHANGE_SCAN_RADIUS
            {
                return false;
            }
            match street.orientation {
                Orientation::Vertical => {
                    (other.position.x - target).abs() < LANE_CHANGE_LATERAL_CLEARANCE
                        && (other.position.y - self.position.y).abs()
                            < LANE_CHANGE_LONGITUDINAL_CLEARANCE
                }
                Orientation::Horizontal => {
                    (other.position.y - target).abs() < LANE_CHANGE_LATERAL_CLEARANCE
                        && (other.position.x - self.position.x).abs()
                            < LANE_CHANGE_LONGITUDINAL_CLEARANCE
                }
            }
        });
        if blocked {
            return;
        }

        match street.orientation {
            Orientation::Vertical => self.position.x = target,
            Orientation::Horizontal => self.position.y = target,
        }
        self.lane_index = target_lane;
        debug!(
            "Vehicle {} moved to lane {} on '{}'",
            self.id.0, target_lane, street.name
        );
    }

    /// Relocate a vehicle that left the canvas
    ///
    /// Leaving through a vertical edge snaps onto a random vertical street,
    /// leaving through a horizontal edge onto a random horizontal street.
    /// Without a candidate street the wrapped coordinate is kept as is.
    fn wrap_around<R: Rng>(&mut self, topology: Option<&CityTopology>, rng: &mut R) {
        if self.position.x < 0.0 || self.position.x > CANVAS_WIDTH {
            self.position.x = if self.position.x < 0.0 {
                CANVAS_WIDTH - WRAP_INSET
            } else {
                WRAP_INSET
            };
            if let Some(center) = random_street_center(topology, Orientation::Vertical, rng) {
                self.position.x = center;
            }
        }
        if self.position.y < 0.0 || self.position.y > CANVAS_HEIGHT {
            self.position.y = if self.position.y < 0.0 {
                CANVAS_HEIGHT - WRAP_INSET
            } else {
                WRAP_INSET
            };
            if let Some(center) = random_street_center(topology, Orientation::Horizontal, rng) {
                self.position.y = center;
            }
        }
    }

    fn try_turn<R: Rng>(&mut self, topology: &CityTopology, rng: &mut R) {
        let Some(junction) = topology
            .junctions
            .iter()
            .find(|j| self.position.distance(&j.position) < TURN_JUNCTION_RADIUS)
        else {
            return;
        };

        let valid: Vec<Heading> = Heading::ALL
            .into_iter()
            .filter(|&h| {
                h == self.heading
                    || (h != self.heading.opposite()
                        && topology.has_street_towards(&junction.position, h))
            })
            .collect();
        let Some(&fallback) = valid.first() else {
            return;
        };

        let roll: f64 = rng.random();
        let straight = self.heading;
        let right = self.heading.right_turn();
        let left = self.heading.left_turn();
        let next = if roll < STRAIGHT_WEIGHT && valid.contains(&straight) {
            straight
        } else if roll < RIGHT_TURN_WEIGHT && valid.contains(&right) {
            right
        } else if valid.contains(&left) {
            left
        } else {
            fallback
        };

        if next != self.heading {
            debug!(
                "Vehicle {} turned {:?} -> {:?} at '{}'",
                self.id.0, self.heading, next, junction.name
            );
            self.heading = next;
            self.turn_cooldown = 0;
            self.refresh_lane(Some(topology));
        }
    }

    /// Recompute the lane index from the street the vehicle is on
    pub fn refresh_lane(&mut self, topology: Option<&CityTopology>) {
        if let Some((_, street)) = topology
            .and_then(|t| t.street_at_oriented(&self.position, self.heading.orientation()))
        {
            self.lane_index = street.lane_at(&self.position);
        }
    }
}

fn random_street_center<R: Rng>(
    topology: Option<&CityTopology>,
    orientation: Orientation,
    rng: &mut R,
) -> Option<f32> {
    let streets: Vec<_> = topology?.streets_with(orientation).collect();
    streets.choose(rng).map(|(_, street)| street.center_line())
}

//! Standalone traffic simulation module
//!
//! This module contains the traffic simulation core: vehicle movement, signal
//! timing, the Q-learning signal controller and the statistics and suggestions
//! derived from a running city. It has no rendering surface and can be driven
//! from the console or from tests.

mod comparison;
mod config;
mod controller;
mod signal;
mod stats;
mod suggestions;
mod topology;
mod types;
mod vehicle;
mod world;

// Re-export public types for external use
// These may not be used within this crate but are part of the public API
#[allow(unused_imports)]
pub use comparison::{CityComparison, ComparisonReport};
#[allow(unused_imports)]
pub use config::{ControllerConfig, ProfileParams, SignalTiming, SimConfig, VehicleCounts};
#[allow(unused_imports)]
pub use controller::{
    Action, ControllerTelemetry, LocalTraffic, PendingEvaluation, QLearningController, StateKey,
    COUNT_BUCKET, WAIT_BUCKET,
};
#[allow(unused_imports)]
pub use signal::{DurationBounds, SignalColor, TrafficSignal, REACTIVE_RADIUS};
#[allow(unused_imports)]
pub use stats::{
    improvement_percent, DensityLevel, Heatmap, HeatmapCell, StreetTraffic, TrafficStats,
    CONGESTED_WAIT, HEATMAP_CELL,
};
#[allow(unused_imports)]
pub use suggestions::{
    edits_for, generate as generate_suggestions, Impact, JunctionAnalysis, StreetAnalysis,
    Suggestion, SuggestionKind, TrafficLevel,
};
#[allow(unused_imports)]
pub use topology::{
    CityTopology, InfrastructureEdit, Junction, Obstacle, Street, LANE_EXPANSION_WIDTH, MAX_LANES,
};
#[allow(unused_imports)]
pub use types::{
    CityProfile, Heading, JunctionId, JunctionKind, Orientation, Position, StreetId, VehicleId,
    VehicleKind, CANVAS_HEIGHT, CANVAS_WIDTH, WAITING_SPEED,
};
#[allow(unused_imports)]
pub use vehicle::{
    MoveContext, MoveOutcome, StopSignState, Vehicle, ACCELERATION, FOLLOW_BRAKE_FACTOR,
    STOP_SIGN_RANGE, STOP_ZONE_INNER, STOP_ZONE_OUTER, TURN_COOLDOWN,
    TURN_JUNCTION_RADIUS,
};
pub use world::{SignalView, SimWorld, WorldSnapshot};

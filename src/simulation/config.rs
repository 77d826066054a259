//! Simulation configuration
//!
//! Everything here is plain data that can be deserialized from JSON. The
//! per-profile movement and timing parameters are derived, not configured.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::types::{CityProfile, VehicleKind};

/// Number of vehicles of each kind before scaling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleCounts {
    pub cars: usize,
    pub buses: usize,
    pub bikes: usize,
    pub pedestrians: usize,
}

impl Default for VehicleCounts {
    fn default() -> Self {
        Self {
            cars: 40,
            buses: 8,
            bikes: 12,
            pedestrians: 20,
        }
    }
}

impl VehicleCounts {
    pub const PRESETS: [&'static str; 4] = ["light", "normal", "heavy", "rush_hour"];

    /// Named traffic preset
    pub fn preset(name: &str) -> Option<Self> {
        let (cars, buses, bikes, pedestrians) = match name {
            "light" => (20, 4, 8, 10),
            "normal" => (40, 8, 12, 20),
            "heavy" => (60, 12, 18, 30),
            "rush_hour" => (80, 16, 25, 40),
            _ => return None,
        };
        Some(Self {
            cars,
            buses,
            bikes,
            pedestrians,
        })
    }

    /// Each count multiplied by `factor` and floored
    pub fn scaled(&self, factor: f32) -> Self {
        let scale = |n: usize| (n as f32 * factor.max(0.0)).floor() as usize;
        Self {
            cars: scale(self.cars),
            buses: scale(self.buses),
            bikes: scale(self.bikes),
            pedestrians: scale(self.pedestrians),
        }
    }

    pub fn count(&self, kind: VehicleKind) -> usize {
        match kind {
            VehicleKind::Car => self.cars,
            VehicleKind::Bus => self.buses,
            VehicleKind::Bike => self.bikes,
            VehicleKind::Pedestrian => self.pedestrians,
        }
    }

    pub fn total(&self) -> usize {
        self.cars + self.buses + self.bikes + self.pedestrians
    }
}

/// Tuning for the Q-learning signal controller
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub learning_rate: f64,
    pub discount_factor: f64,
    pub exploration_rate: f64,
    pub min_exploration_rate: f64,
    pub exploration_decay: f64,
    /// Ticks between two decisions of one adaptive signal
    pub decision_period: u32,
    /// Radius inside which vehicles belong to a signal's observed state
    pub observation_radius: f32,
    /// Ticks between a decision and the measurement that scores it
    pub reward_delay_ticks: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.3,
            discount_factor: 0.98,
            exploration_rate: 0.2,
            min_exploration_rate: 0.01,
            exploration_decay: 0.99,
            decision_period: 20,
            observation_radius: 100.0,
            reward_delay_ticks: 6,
        }
    }
}

impl ControllerConfig {
    /// Clamp every parameter into its meaningful range
    pub fn sanitized(mut self) -> Self {
        self.learning_rate = self.learning_rate.clamp(0.0, 1.0);
        self.discount_factor = self.discount_factor.clamp(0.0, 1.0);
        self.min_exploration_rate = self.min_exploration_rate.clamp(0.0, 1.0);
        self.exploration_rate = self
            .exploration_rate
            .clamp(self.min_exploration_rate, 1.0);
        self.exploration_decay = self.exploration_decay.clamp(0.0, 1.0);
        self.decision_period = self.decision_period.max(1);
        self.observation_radius = self.observation_radius.max(0.0);
        self
    }
}

/// Top-level simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub vehicle_counts: VehicleCounts,
    /// Multiplier applied to `vehicle_counts` when populating a world
    pub population_scale: f32,
    /// Seed for reproducible runs; a random one is drawn and logged if absent
    pub seed: Option<u64>,
    /// When false, vehicles ignore streets, junctions and obstacles
    pub topology_aware: bool,
    pub heatmap_enabled: bool,
    /// Ticks between two statistics refreshes
    pub stats_period: u64,
    pub controller: ControllerConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            vehicle_counts: VehicleCounts::default(),
            population_scale: 1.5,
            seed: None,
            topology_aware: true,
            heatmap_enabled: false,
            stats_period: 60,
            controller: ControllerConfig::default(),
        }
    }
}

impl SimConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: SimConfig =
            serde_json::from_str(json).context("Failed to parse simulation config")?;
        if config.population_scale < 0.0 {
            bail!("population_scale must not be negative");
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_json_str(&json)
    }

    /// Counts actually spawned at (re)initialization
    pub fn population(&self) -> VehicleCounts {
        self.vehicle_counts.scaled(self.population_scale)
    }
}

/// Signal timing limits for one profile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalTiming {
    pub red_duration: u32,
    pub green_duration: u32,
    pub min_red: u32,
    pub max_red: u32,
    pub min_green: u32,
    pub max_green: u32,
}

/// Movement, timing and reporting parameters selected by a [`CityProfile`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileParams {
    pub speed_multiplier: f32,
    pub light_detection_radius: f32,
    pub following_distance: f32,
    /// Ticks a vehicle must stand still at a stop sign
    pub stop_dwell: u32,
    pub signal_timing: SignalTiming,
    /// Street density thresholds (high, medium, low)
    pub density_thresholds: (f32, f32, f32),
}

impl ProfileParams {
    pub fn for_profile(profile: CityProfile) -> Self {
        match profile {
            CityProfile::Baseline => Self {
                speed_multiplier: 1.0,
                light_detection_radius: 40.0,
                following_distance: 30.0,
                stop_dwell: 60,
                signal_timing: SignalTiming {
                    red_duration: 240,
                    green_duration: 80,
                    min_red: 240,
                    max_red: 240,
                    min_green: 80,
                    max_green: 80,
                },
                density_thresholds: (0.8, 0.4, 0.2),
            },
            CityProfile::Optimized => Self {
                speed_multiplier: 2.0,
                light_detection_radius: 60.0,
                following_distance: 40.0,
                stop_dwell: 10,
                signal_timing: SignalTiming {
                    red_duration: 12,
                    green_duration: 600,
                    min_red: 10,
                    max_red: 20,
                    min_green: 400,
                    max_green: 800,
                },
                density_thresholds: (1.0, 0.6, 0.3),
            },
        }
    }
}

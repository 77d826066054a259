//! Tabular Q-learning controller for adaptive traffic signals
//!
//! The controller observes the traffic around one signal, discretizes it into
//! a small state key and chooses whether to extend or shorten the green phase.
//! Scoring a decision is split in two phases: [`QLearningController::begin_action`]
//! captures the local traffic when the decision is made, and
//! [`QLearningController::finish_action`] measures it again a fixed number of
//! ticks later, computes the reward and writes the value update.

use log::debug;
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;

use super::config::ControllerConfig;
use super::signal::{SignalColor, TrafficSignal};
use super::types::{JunctionId, Position};
use super::vehicle::Vehicle;

/// Bucket width for waiting and moving vehicle counts
pub const COUNT_BUCKET: usize = 3;
/// Bucket width for the mean wait time, in ticks
pub const WAIT_BUCKET: f32 = 10.0;

/// Timing adjustment the controller can make
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Longer green, shorter red
    Extend,
    /// Shorter green, longer red (only applied when the junction is empty)
    Shorten,
}

impl Action {
    pub const ALL: [Action; 2] = [Action::Extend, Action::Shorten];
}

/// Discretized traffic state around one signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct StateKey {
    pub junction: JunctionId,
    pub color: SignalColor,
    pub waiting_bucket: u32,
    pub moving_bucket: u32,
    pub wait_bucket: u32,
}

/// Vehicle counts within a radius of a point
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LocalTraffic {
    pub nearby: usize,
    pub waiting: usize,
    pub moving: usize,
    pub mean_wait: f32,
}

impl LocalTraffic {
    pub fn measure(center: &Position, vehicles: &[Vehicle], radius: f32) -> Self {
        let mut nearby = 0;
        let mut waiting = 0;
        let mut total_wait = 0u64;
        for vehicle in vehicles
            .iter()
            .filter(|v| center.distance(&v.position) < radius)
        {
            nearby += 1;
            if vehicle.is_waiting() {
                waiting += 1;
            }
            total_wait += vehicle.wait_time as u64;
        }
        let mean_wait = if nearby > 0 {
            total_wait as f32 / nearby as f32
        } else {
            0.0
        };
        Self {
            nearby,
            waiting,
            moving: nearby - waiting,
            mean_wait,
        }
    }
}

/// A decision waiting for its delayed reward measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingEvaluation {
    pub junction: JunctionId,
    pub state: StateKey,
    pub action: Action,
    pub before_waiting: usize,
    pub before_moving: usize,
    /// World tick at or after which the evaluation is resolved
    pub due_tick: u64,
}

/// Controller counters for display
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ControllerTelemetry {
    pub updates: u64,
    pub average_reward: f64,
    pub exploration_rate: f64,
    pub table_size: usize,
}

/// Epsilon-greedy tabular Q-learning agent shared by all adaptive signals
#[derive(Debug, Clone)]
pub struct QLearningController {
    config: ControllerConfig,
    values: HashMap<(StateKey, Action), f64>,
    exploration_rate: f64,
    total_updates: u64,
    cumulative_reward: f64,
}

impl Default for QLearningController {
    fn default() -> Self {
        Self::new(ControllerConfig::default())
    }
}

impl QLearningController {
    pub fn new(config: ControllerConfig) -> Self {
        let config = config.sanitized();
        Self {
            config,
            values: HashMap::new(),
            exploration_rate: config.exploration_rate,
            total_updates: 0,
            cumulative_reward: 0.0,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn exploration_rate(&self) -> f64 {
        self.exploration_rate
    }

    pub fn total_updates(&self) -> u64 {
        self.total_updates
    }

    pub fn cumulative_reward(&self) -> f64 {
        self.cumulative_reward
    }

    /// Local traffic inside the observation radius of `signal`
    pub fn local_traffic(&self, signal: &TrafficSignal, vehicles: &[Vehicle]) -> LocalTraffic {
        LocalTraffic::measure(&signal.position, vehicles, self.config.observation_radius)
    }

    pub fn observe(&self, signal: &TrafficSignal, vehicles: &[Vehicle]) -> StateKey {
        let local = self.local_traffic(signal, vehicles);
        StateKey {
            junction: signal.junction,
            color: signal.color,
            waiting_bucket: (local.waiting / COUNT_BUCKET) as u32,
            moving_bucket: (local.moving / COUNT_BUCKET) as u32,
            wait_bucket: (local.mean_wait / WAIT_BUCKET).floor() as u32,
        }
    }

    /// Stored estimate, 0 for pairs never updated
    pub fn value(&self, state: &StateKey, action: Action) -> f64 {
        self.values.get(&(*state, action)).copied().unwrap_or(0.0)
    }

    fn best_value(&self, state: &StateKey) -> f64 {
        self.value(state, Action::Extend)
            .max(self.value(state, Action::Shorten))
    }

    pub fn choose_action<R: Rng>(&self, state: &StateKey, rng: &mut R) -> Action {
        if rng.random_bool(self.exploration_rate) {
            if rng.random_bool(0.5) {
                Action::Extend
            } else {
                Action::Shorten
            }
        } else if self.value(state, Action::Extend) > self.value(state, Action::Shorten) {
            Action::Extend
        } else {
            Action::Shorten
        }
    }

    /// Score the change in local traffic after an action
    ///
    /// Fewer waiting vehicles weigh most, moving vehicles are rewarded and any
    /// remaining queue is penalised.
    pub fn reward(
        before_waiting: usize,
        after_waiting: usize,
        _before_moving: usize,
        after_moving: usize,
    ) -> f64 {
        let improvement = before_waiting as f64 - after_waiting as f64;
        10.0 * improvement + 3.0 * after_moving as f64 - 5.0 * after_waiting as f64
    }

    pub fn update(&mut self, state: &StateKey, action: Action, reward: f64, next_state: &StateKey) {
        let current = self.value(state, action);
        let target = reward + self.config.discount_factor * self.best_value(next_state);
        let updated = current + self.config.learning_rate * (target - current);
        self.values.insert((*state, action), updated);

        self.cumulative_reward += reward;
        self.total_updates += 1;
        self.exploration_rate = (self.exploration_rate * self.config.exploration_decay)
            .max(self.config.min_exploration_rate);

        debug!(
            "Q update {:?}/{:?}: {:.3} -> {:.3} (reward {:.1}, epsilon {:.4})",
            state.junction, action, current, updated, reward, self.exploration_rate
        );
    }

    /// Observe `signal`, choose an action and capture the before-state
    ///
    /// The caller applies the returned action to the signal and hands the
    /// pending evaluation back to [`finish_action`](Self::finish_action) once
    /// `due_tick` is reached.
    pub fn begin_action<R: Rng>(
        &self,
        signal: &TrafficSignal,
        vehicles: &[Vehicle],
        now: u64,
        rng: &mut R,
    ) -> PendingEvaluation {
        let state = self.observe(signal, vehicles);
        let action = self.choose_action(&state, rng);
        let before = self.local_traffic(signal, vehicles);
        PendingEvaluation {
            junction: signal.junction,
            state,
            action,
            before_waiting: before.waiting,
            before_moving: before.moving,
            due_tick: now + self.config.reward_delay_ticks,
        }
    }

    /// Measure the outcome of a pending decision and update the table
    ///
    /// Returns the reward that was applied.
    pub fn finish_action(
        &mut self,
        pending: &PendingEvaluation,
        signal: &TrafficSignal,
        vehicles: &[Vehicle],
    ) -> f64 {
        let after = self.local_traffic(signal, vehicles);
        let reward = Self::reward(
            pending.before_waiting,
            after.waiting,
            pending.before_moving,
            after.moving,
        );
        let next_state = self.observe(signal, vehicles);
        self.update(&pending.state, pending.action, reward, &next_state);
        reward
    }

    pub fn telemetry(&self) -> ControllerTelemetry {
        ControllerTelemetry {
            updates: self.total_updates,
            average_reward: if self.total_updates > 0 {
                self.cumulative_reward / self.total_updates as f64
            } else {
                0.0
            },
            exploration_rate: self.exploration_rate,
            table_size: self.values.len(),
        }
    }
}

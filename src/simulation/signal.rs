//! Traffic signal state machine for the traffic simulation
//!
//! A signal alternates between green and red. Fixed signals keep their
//! durations forever. Adaptive signals let the Q-learning controller retune the
//! durations every few ticks and react directly to the traffic around them.

use rand::Rng;
use serde::Serialize;

use super::config::SignalTiming;
use super::controller::{Action, LocalTraffic, PendingEvaluation, QLearningController};
use super::topology::Junction;
use super::types::{JunctionId, Position};
use super::vehicle::Vehicle;

/// Radius of the per-tick reactive adjustment
pub const REACTIVE_RADIUS: f32 = 80.0;
/// Waiting vehicles at red above which the red phase is sped up
const QUEUE_THRESHOLD: usize = 5;
const RED_SPEEDUP: u32 = 3;
const EMPTY_GREEN_SPEEDUP: u32 = 2;

const EXTEND_GREEN_STEP: u32 = 40;
const EXTEND_RED_STEP: u32 = 3;
const SHORTEN_GREEN_STEP: u32 = 20;
const SHORTEN_RED_STEP: u32 = 2;
/// Shortening is only applied below this many nearby vehicles
const SHORTEN_MAX_NEARBY: usize = 3;

/// Ticks per displayed second
const TICKS_PER_SECOND: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalColor {
    Red,
    Green,
}

/// Duration limits of an adaptive signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DurationBounds {
    pub min_red: u32,
    pub max_red: u32,
    pub min_green: u32,
    pub max_green: u32,
}

/// A traffic light at a signalised junction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafficSignal {
    pub junction: JunctionId,
    pub name: String,
    pub position: Position,
    pub color: SignalColor,
    /// Ticks since the last transition
    pub timer: u32,
    pub red_duration: u32,
    pub green_duration: u32,
    /// Present only on signals tuned by the controller
    pub adaptive: Option<DurationBounds>,
}

impl TrafficSignal {
    /// Signal with durations that never change
    pub fn fixed(junction: JunctionId, name: &str, position: Position, red: u32, green: u32) -> Self {
        Self {
            junction,
            name: name.to_string(),
            position,
            color: SignalColor::Green,
            timer: 0,
            red_duration: red,
            green_duration: green,
            adaptive: None,
        }
    }

    /// Signal whose durations the controller may tune within `timing`'s bounds
    pub fn adaptive(junction: JunctionId, name: &str, position: Position, timing: &SignalTiming) -> Self {
        let bounds = DurationBounds {
            min_red: timing.min_red,
            max_red: timing.max_red.max(timing.min_red),
            min_green: timing.min_green,
            max_green: timing.max_green.max(timing.min_green),
        };
        Self {
            junction,
            name: name.to_string(),
            position,
            color: SignalColor::Green,
            timer: 0,
            red_duration: timing.red_duration.clamp(bounds.min_red, bounds.max_red),
            green_duration: timing.green_duration.clamp(bounds.min_green, bounds.max_green),
            adaptive: Some(bounds),
        }
    }

    /// Build the signal for `junction` under the given timing
    pub fn for_junction(id: JunctionId, junction: &Junction, timing: &SignalTiming, adaptive: bool) -> Self {
        if adaptive {
            Self::adaptive(id, &junction.name, junction.position, timing)
        } else {
            Self::fixed(
                id,
                &junction.name,
                junction.position,
                timing.red_duration,
                timing.green_duration,
            )
        }
    }

    pub fn is_adaptive(&self) -> bool {
        self.adaptive.is_some()
    }

    /// Duration of the current phase
    pub fn phase_duration(&self) -> u32 {
        match self.color {
            SignalColor::Red => self.red_duration,
            SignalColor::Green => self.green_duration,
        }
    }

    /// Ticks left in the current phase
    pub fn remaining_ticks(&self) -> u32 {
        self.phase_duration().saturating_sub(self.timer)
    }

    /// Remaining time rounded up to whole displayed seconds
    pub fn countdown_seconds(&self) -> u32 {
        self.remaining_ticks().div_ceil(TICKS_PER_SECOND)
    }

    /// Advance one tick
    ///
    /// Adaptive signals consult `controller` every decision period and return
    /// the decision's pending evaluation. Without a controller an adaptive
    /// signal keeps its timing and runs like a fixed one. Fixed signals
    /// ignore both `vehicles` and `controller`.
    pub fn tick<R: Rng>(
        &mut self,
        vehicles: &[Vehicle],
        controller: Option<&QLearningController>,
        now: u64,
        rng: &mut R,
    ) -> Option<PendingEvaluation> {
        self.timer += 1;
        let mut pending = None;

        if self.is_adaptive() && !vehicles.is_empty() {
            if let Some(controller) = controller {
                if self.timer % controller.config().decision_period == 0 {
                    let evaluation = controller.begin_action(self, vehicles, now, rng);
                    let local = controller.local_traffic(self, vehicles);
                    self.apply_action(evaluation.action, &local);
                    pending = Some(evaluation);
                }
                self.react_to_traffic(vehicles);
            }
        }

        self.advance_phase();
        pending
    }

    /// Retune durations for `action`, clamped to the adaptive bounds
    ///
    /// Shortening only happens when `local` shows an empty junction.
    /// Fixed signals are never changed.
    pub fn apply_action(&mut self, action: Action, local: &LocalTraffic) {
        let Some(bounds) = self.adaptive else {
            return;
        };
        match action {
            Action::Extend => {
                self.green_duration = (self.green_duration + EXTEND_GREEN_STEP).min(bounds.max_green);
                self.red_duration = self
                    .red_duration
                    .saturating_sub(EXTEND_RED_STEP)
                    .max(bounds.min_red);
            }
            Action::Shorten => {
                if local.waiting == 0 && local.nearby < SHORTEN_MAX_NEARBY {
                    self.green_duration = self
                        .green_duration
                        .saturating_sub(SHORTEN_GREEN_STEP)
                        .max(bounds.min_green);
                    self.red_duration = (self.red_duration + SHORTEN_RED_STEP).min(bounds.max_red);
                }
            }
        }
    }

    /// Push the timer forward when the current phase is wasting time
    fn react_to_traffic(&mut self, vehicles: &[Vehicle]) {
        let local = LocalTraffic::measure(&self.position, vehicles, REACTIVE_RADIUS);
        match self.color {
            SignalColor::Red if local.waiting > QUEUE_THRESHOLD => self.timer += RED_SPEEDUP,
            SignalColor::Green if local.nearby == 0 => self.timer += EMPTY_GREEN_SPEEDUP,
            _ => {}
        }
    }

    fn advance_phase(&mut self) {
        match self.color {
            SignalColor::Red if self.timer > self.red_duration => {
                self.color = SignalColor::Green;
                self.timer = 0;
            }
            SignalColor::Green if self.timer > self.green_duration => {
                self.color = SignalColor::Red;
                self.timer = 0;
            }
            _ => {}
        }
    }
}

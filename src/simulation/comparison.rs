//! Before/after comparison of a baseline and an optimized city
//!
//! Both cities share the same topology and population configuration and
//! advance in lockstep. Suggested infrastructure edits only ever go to the
//! optimized city.

use log::info;
use serde::Serialize;

use super::config::SimConfig;
use super::controller::ControllerTelemetry;
use super::stats::{improvement_percent, TrafficStats};
use super::suggestions::{self, Suggestion};
use super::topology::CityTopology;
use super::types::CityProfile;
use super::world::SimWorld;

/// Side-by-side statistics of the two cities
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub tick: u64,
    pub baseline: TrafficStats,
    pub optimized: TrafficStats,
    /// Relative change of the average speed, in percent
    pub speed_improvement: f32,
    /// Relative drop of the congestion percentage, in percent
    pub congestion_reduction: f32,
    pub controller: ControllerTelemetry,
}

pub struct CityComparison {
    pub baseline: SimWorld,
    pub optimized: SimWorld,
}

impl CityComparison {
    /// Build both cities; the optimized one uses the next seed after the baseline's
    pub fn new(topology: CityTopology, config: SimConfig) -> Self {
        let baseline = SimWorld::new(topology.clone(), CityProfile::Baseline, config.clone());
        let optimized_config = SimConfig {
            seed: Some(baseline.seed().wrapping_add(1)),
            ..config
        };
        let optimized = SimWorld::new(topology, CityProfile::Optimized, optimized_config);
        Self {
            baseline,
            optimized,
        }
    }

    /// Advance both cities by one tick
    pub fn tick(&mut self) -> bool {
        let a = self.baseline.tick();
        let b = self.optimized.tick();
        a || b
    }

    pub fn run(&mut self, ticks: u64) -> u64 {
        let mut executed = 0;
        while executed < ticks && self.tick() {
            executed += 1;
        }
        executed
    }

    pub fn pause(&mut self) {
        self.baseline.pause();
        self.optimized.pause();
    }

    pub fn resume(&mut self) {
        self.baseline.resume();
        self.optimized.resume();
    }

    pub fn reset(&mut self) {
        self.baseline.reset();
        self.optimized.reset();
    }

    /// Suggestions derived from the baseline city's current traffic
    pub fn suggest(&self) -> Vec<Suggestion> {
        suggestions::generate(
            self.baseline.topology(),
            &self.baseline.vehicles,
            self.baseline.signals.len(),
        )
    }

    /// Queue the edits behind `suggestions` on the optimized city and rebuild it
    ///
    /// Returns the number of edits queued. The optimized city is left running
    /// if it was running before.
    pub fn apply_suggestions(&mut self, suggestions: &[Suggestion]) -> usize {
        let edits = suggestions::edits_for(suggestions);
        let count = edits.len();
        for edit in edits {
            self.optimized.queue_edit(edit);
        }

        let was_running = self.optimized.is_running();
        self.optimized.reset();
        if was_running {
            self.optimized.resume();
        }
        info!("Applied {} infrastructure edits to the optimized city", count);
        count
    }

    pub fn report(&self) -> ComparisonReport {
        let baseline = self.baseline.stats().clone();
        let optimized = self.optimized.stats().clone();
        ComparisonReport {
            tick: self.baseline.tick_count(),
            speed_improvement: improvement_percent(baseline.average_speed, optimized.average_speed),
            congestion_reduction: -improvement_percent(
                baseline.congestion_percent,
                optimized.congestion_percent,
            ),
            controller: self.optimized.controller().telemetry(),
            baseline,
            optimized,
        }
    }
}

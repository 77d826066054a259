//! Main simulation world that ties everything together
//!
//! `SimWorld` owns one city: its topology, vehicles, signals and the
//! Q-learning controller, and drives them one discrete tick at a time.

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use super::config::{ProfileParams, SimConfig};
use super::controller::{ControllerTelemetry, PendingEvaluation, QLearningController};
use super::signal::{SignalColor, TrafficSignal};
use super::stats::{Heatmap, TrafficStats};
use super::topology::{CityTopology, InfrastructureEdit};
use super::types::{CityProfile, Heading, JunctionId, Position, VehicleId, VehicleKind};
use super::vehicle::{MoveContext, Vehicle};

/// Read-only view of a signal for renderers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalView {
    pub junction: JunctionId,
    pub name: String,
    pub position: Position,
    pub color: SignalColor,
    pub remaining_ticks: u32,
    pub countdown_seconds: u32,
    pub red_duration: u32,
    pub green_duration: u32,
    pub adaptive: bool,
}

impl From<&TrafficSignal> for SignalView {
    fn from(signal: &TrafficSignal) -> Self {
        Self {
            junction: signal.junction,
            name: signal.name.clone(),
            position: signal.position,
            color: signal.color,
            remaining_ticks: signal.remaining_ticks(),
            countdown_seconds: signal.countdown_seconds(),
            red_duration: signal.red_duration,
            green_duration: signal.green_duration,
            adaptive: signal.is_adaptive(),
        }
    }
}

/// Everything a presentation layer needs after a tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub running: bool,
    pub profile: CityProfile,
    pub vehicles: Vec<Vehicle>,
    pub signals: Vec<SignalView>,
    pub stats: TrafficStats,
    pub heatmap: Option<Heatmap>,
    pub controller: ControllerTelemetry,
}

/// The main simulation world
pub struct SimWorld {
    config: SimConfig,
    profile: CityProfile,
    params: ProfileParams,
    topology: CityTopology,

    /// Edits waiting for the next reset
    queued_edits: Vec<InfrastructureEdit>,

    pub vehicles: Vec<Vehicle>,
    pub signals: Vec<TrafficSignal>,

    /// Survives resets for the whole session
    controller: QLearningController,

    /// Decisions whose reward has not been measured yet
    pending: Vec<PendingEvaluation>,

    tick: u64,
    running: bool,
    seed: u64,
    rng: StdRng,

    stats: TrafficStats,
    heatmap: Option<Heatmap>,
}

impl SimWorld {
    pub fn new(topology: CityTopology, profile: CityProfile, config: SimConfig) -> Self {
        let controller = QLearningController::new(config.controller);
        Self::with_controller(topology, profile, config, controller)
    }

    /// Build a world around an existing (possibly trained) controller
    pub fn with_controller(
        topology: CityTopology,
        profile: CityProfile,
        config: SimConfig,
        controller: QLearningController,
    ) -> Self {
        let seed = config.seed.unwrap_or_else(|| rand::rng().random());
        info!("Creating {:?} city with seed {}", profile, seed);

        let mut world = Self {
            params: ProfileParams::for_profile(profile),
            config,
            profile,
            topology,
            queued_edits: Vec::new(),
            vehicles: Vec::new(),
            signals: Vec::new(),
            controller,
            pending: Vec::new(),
            tick: 0,
            running: true,
            seed,
            rng: StdRng::seed_from_u64(seed),
            stats: TrafficStats::default(),
            heatmap: None,
        };
        world.populate();
        world
    }

    /// Default city with default configuration and a fixed seed
    pub fn create_default_with_seed(profile: CityProfile, seed: u64) -> Self {
        let config = SimConfig {
            seed: Some(seed),
            ..SimConfig::default()
        };
        Self::new(CityTopology::default_city(), profile, config)
    }

    /// Rebuild vehicles and signals from the topology
    fn populate(&mut self) {
        let topology = self.config.topology_aware.then_some(&self.topology);
        let counts = self.config.population();

        self.vehicles.clear();
        for kind in VehicleKind::ALL {
            for _ in 0..counts.count(kind) {
                let id = VehicleId(self.vehicles.len());
                let heading = *Heading::ALL.choose(&mut self.rng).unwrap_or(&Heading::Up);
                self.vehicles
                    .push(Vehicle::spawn(id, kind, heading, topology, &mut self.rng));
            }
        }

        let adaptive = self.profile == CityProfile::Optimized && self.config.topology_aware;
        let timing = self.params.signal_timing;
        self.signals = self
            .topology
            .signal_junctions()
            .map(|(id, junction)| TrafficSignal::for_junction(id, junction, &timing, adaptive))
            .collect();

        self.refresh_stats();
        info!(
            "Populated {:?} city: {} vehicles, {} signals ({})",
            self.profile,
            self.vehicles.len(),
            self.signals.len(),
            if adaptive { "adaptive" } else { "fixed" }
        );
    }

    /// Run one tick
    ///
    /// Signals update first, then every vehicle moves against the new signal
    /// states, then due reward measurements and periodic statistics run.
    /// Returns false without doing anything while paused.
    pub fn tick(&mut self) -> bool {
        if !self.running {
            return false;
        }
        let now = self.tick;

        for signal in self.signals.iter_mut() {
            if let Some(pending) =
                signal.tick(&self.vehicles, Some(&self.controller), now, &mut self.rng)
            {
                self.pending.push(pending);
            }
        }

        let ctx = MoveContext {
            signals: &self.signals,
            topology: self.config.topology_aware.then_some(&self.topology),
            params: &self.params,
        };
        for index in 0..self.vehicles.len() {
            let mut vehicle = self.vehicles[index];
            vehicle.step(&self.vehicles, &ctx, &mut self.rng);
            self.vehicles[index] = vehicle;
        }

        self.tick += 1;
        self.resolve_pending();

        if self.config.stats_period > 0 && self.tick % self.config.stats_period == 0 {
            self.refresh_stats();
        }
        true
    }

    /// Run up to `ticks` ticks, stopping early if paused
    pub fn run(&mut self, ticks: u64) -> u64 {
        let mut executed = 0;
        while executed < ticks && self.tick() {
            executed += 1;
        }
        executed
    }

    fn resolve_pending(&mut self) {
        let now = self.tick;
        let (due, waiting): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|p| p.due_tick <= now);
        self.pending = waiting;

        for evaluation in due {
            match self.signals.iter().find(|s| s.junction == evaluation.junction) {
                Some(signal) => {
                    self.controller
                        .finish_action(&evaluation, signal, &self.vehicles);
                }
                None => debug!(
                    "Dropping evaluation for missing signal at {:?}",
                    evaluation.junction
                ),
            }
        }
    }

    /// Recompute statistics (and the heatmap, if enabled) from the current state
    pub fn refresh_stats(&mut self) {
        self.stats = TrafficStats::compute(&self.vehicles, &self.topology, &self.params);
        self.heatmap = self
            .config
            .heatmap_enabled
            .then(|| Heatmap::generate(&self.vehicles, &self.params));
        debug!(
            "Tick {}: avg speed {:.2}, congestion {:.1}%",
            self.tick, self.stats.average_speed, self.stats.congestion_percent
        );
    }

    pub fn pause(&mut self) {
        self.running = false;
    }

    pub fn resume(&mut self) {
        self.running = true;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Stage an infrastructure change for the next reset
    pub fn queue_edit(&mut self, edit: InfrastructureEdit) {
        self.queued_edits.push(edit);
    }

    pub fn queued_edits(&self) -> &[InfrastructureEdit] {
        &self.queued_edits
    }

    /// Apply queued edits and rebuild every vehicle and signal
    ///
    /// The world is paused afterwards. Pending reward measurements are
    /// discarded; the controller's learned values are kept.
    pub fn reset(&mut self) {
        for edit in std::mem::take(&mut self.queued_edits) {
            if let Err(err) = self.topology.apply_edit(&edit) {
                warn!("Skipping infrastructure edit {:?}: {:#}", edit, err);
            }
        }
        if !self.pending.is_empty() {
            debug!("Discarding {} pending evaluations", self.pending.len());
        }
        self.pending.clear();
        self.tick = 0;
        self.running = false;
        self.populate();
        info!("Reset {:?} city", self.profile);
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            tick: self.tick,
            running: self.running,
            profile: self.profile,
            vehicles: self.vehicles.clone(),
            signals: self.signals.iter().map(SignalView::from).collect(),
            stats: self.stats.clone(),
            heatmap: self.heatmap.clone(),
            controller: self.controller.telemetry(),
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn profile(&self) -> CityProfile {
        self.profile
    }

    pub fn params(&self) -> &ProfileParams {
        &self.params
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn topology(&self) -> &CityTopology {
        &self.topology
    }

    pub fn stats(&self) -> &TrafficStats {
        &self.stats
    }

    pub fn heatmap(&self) -> Option<&Heatmap> {
        self.heatmap.as_ref()
    }

    pub fn controller(&self) -> &QLearningController {
        &self.controller
    }

    pub fn pending_evaluations(&self) -> &[PendingEvaluation] {
        &self.pending
    }

    /// Print a summary of the world state
    pub fn print_summary(&self) {
        let stats = &self.stats;
        println!("=== {:?} City ===", self.profile);
        println!("Tick: {}", self.tick);
        println!(
            "Vehicles: {}, Signals: {}",
            self.vehicles.len(),
            self.signals.len()
        );
        println!("Average speed: {:.2}", stats.average_speed);
        println!("Congestion: {:.1}%", stats.congestion_percent);
        println!(
            "Streets: high={} medium={} low={} free={}",
            stats.high_traffic_streets,
            stats.medium_traffic_streets,
            stats.low_traffic_streets,
            stats.free_flow_streets
        );

        let red = self
            .signals
            .iter()
            .filter(|s| s.color == SignalColor::Red)
            .count();
        println!("Signals red/green: {}/{}", red, self.signals.len() - red);

        if self.profile == CityProfile::Optimized {
            let telemetry = self.controller.telemetry();
            println!(
                "Controller: updates={} avg_reward={:.2} epsilon={:.4} table={}",
                telemetry.updates,
                telemetry.average_reward,
                telemetry.exploration_rate,
                telemetry.table_size
            );
        }
        println!();
    }
}

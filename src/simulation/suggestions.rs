//! Heuristic infrastructure suggestions derived from a traffic snapshot
//!
//! The engine looks at how vehicles are distributed around junctions and along
//! streets, picks out the worst bottlenecks and proposes changes. Suggestions
//! never touch a running world; [`edits_for`] turns them into
//! [`InfrastructureEdit`]s that take effect at the next reset.

use ordered_float::OrderedFloat;
use serde::Serialize;
use std::cmp::Reverse;
use std::fmt;

use super::topology::{CityTopology, InfrastructureEdit, MAX_LANES};
use super::types::{JunctionId, JunctionKind, StreetId};
use super::vehicle::Vehicle;

const JUNCTION_RADIUS: f32 = 80.0;
const JUNCTION_WAITING_SPEED: f32 = 0.1;
const JUNCTION_WAITING_TIME: u32 = 20;
const STREET_WAITING_SPEED: f32 = 0.2;
const STREET_WAITING_TIME: u32 = 15;
const VEHICLES_PER_LANE: f32 = 10.0;
const SYSTEM_WAITING_TIME: u32 = 30;

/// Overall traffic volume, by total vehicle count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficLevel {
    Light,
    Normal,
    Heavy,
    RushHour,
}

impl TrafficLevel {
    pub fn from_vehicle_count(count: usize) -> Self {
        match count {
            0..=99 => TrafficLevel::Light,
            100..=179 => TrafficLevel::Normal,
            180..=279 => TrafficLevel::Heavy,
            _ => TrafficLevel::RushHour,
        }
    }

    pub fn is_congested(&self) -> bool {
        matches!(self, TrafficLevel::Heavy | TrafficLevel::RushHour)
    }

    /// Improvement range the adaptive controller typically achieves
    pub fn expected_improvement(&self) -> &'static str {
        match self {
            TrafficLevel::Light => "30-40%",
            TrafficLevel::Normal => "40-50%",
            TrafficLevel::Heavy => "50-60%",
            TrafficLevel::RushHour => "60-70%",
        }
    }
}

impl fmt::Display for TrafficLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrafficLevel::Light => "light",
            TrafficLevel::Normal => "normal",
            TrafficLevel::Heavy => "heavy",
            TrafficLevel::RushHour => "rush hour",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    Critical,
    High,
    Medium,
    Info,
}

/// Traffic around one junction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JunctionAnalysis {
    pub junction: JunctionId,
    pub name: String,
    pub kind: JunctionKind,
    pub has_signal: bool,
    pub vehicles: usize,
    pub waiting: usize,
    pub congestion_score: f32,
    pub average_wait: f32,
}

impl JunctionAnalysis {
    pub fn measure(topology: &CityTopology, vehicles: &[Vehicle]) -> Vec<Self> {
        topology
            .junctions
            .iter()
            .enumerate()
            .map(|(index, junction)| {
                let nearby: Vec<&Vehicle> = vehicles
                    .iter()
                    .filter(|v| v.position.distance(&junction.position) < JUNCTION_RADIUS)
                    .collect();
                let waiting = nearby
                    .iter()
                    .filter(|v| v.speed < JUNCTION_WAITING_SPEED || v.wait_time > JUNCTION_WAITING_TIME)
                    .count();
                let count = nearby.len().max(1) as f32;
                let total_wait: u64 = nearby.iter().map(|v| v.wait_time as u64).sum();
                Self {
                    junction: JunctionId(index),
                    name: junction.name.clone(),
                    kind: junction.kind,
                    has_signal: junction.has_signal,
                    vehicles: nearby.len(),
                    waiting,
                    congestion_score: waiting as f32 / count * nearby.len() as f32,
                    average_wait: total_wait as f32 / count,
                }
            })
            .collect()
    }
}

/// Traffic along one street
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreetAnalysis {
    pub street: StreetId,
    pub name: String,
    pub lanes: u32,
    pub vehicles: usize,
    pub waiting: usize,
    pub density: f32,
    /// Share of waiting vehicles, in percent
    pub congestion_percent: f32,
}

impl StreetAnalysis {
    pub fn measure(topology: &CityTopology, vehicles: &[Vehicle]) -> Vec<Self> {
        topology
            .streets
            .iter()
            .enumerate()
            .map(|(index, street)| {
                let on_street: Vec<&Vehicle> = vehicles
                    .iter()
                    .filter(|v| street.band_contains(&v.position))
                    .collect();
                let waiting = on_street
                    .iter()
                    .filter(|v| v.speed < STREET_WAITING_SPEED || v.wait_time > STREET_WAITING_TIME)
                    .count();
                Self {
                    street: StreetId(index),
                    name: street.name.clone(),
                    lanes: street.lane_count,
                    vehicles: on_street.len(),
                    waiting,
                    density: on_street.len() as f32
                        / (street.lane_count.max(1) as f32 * VEHICLES_PER_LANE),
                    congestion_percent: waiting as f32 / on_street.len().max(1) as f32 * 100.0,
                }
            })
            .collect()
    }
}

/// What a suggestion proposes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SuggestionKind {
    /// Let the Q-learning controller drive every signal
    DeployLearning,
    Roundabouts { junctions: Vec<JunctionId> },
    /// Streets and the lane count each should reach
    LaneExpansion { streets: Vec<(StreetId, u32)> },
    AdaptiveSignals { junctions: Vec<JunctionId> },
    RemoveSignals { junctions: Vec<JunctionId> },
    /// Informational list of the most congested streets
    Hotspots { streets: Vec<StreetId> },
    /// Informational system-wide overview
    Summary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub kind: SuggestionKind,
    pub impact: Impact,
    pub description: String,
    pub reason: String,
}

fn join_names<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join(", ")
}

/// Analyze a city's traffic and propose changes, most impactful first
///
/// `signal_count` is the number of signals currently running in the city.
pub fn generate(topology: &CityTopology, vehicles: &[Vehicle], signal_count: usize) -> Vec<Suggestion> {
    let junctions = JunctionAnalysis::measure(topology, vehicles);
    let streets = StreetAnalysis::measure(topology, vehicles);

    let total = vehicles.len();
    let system_waiting = vehicles
        .iter()
        .filter(|v| v.wait_time > SYSTEM_WAITING_TIME)
        .count();
    let (congestion, average_speed) = if total > 0 {
        (
            system_waiting as f32 / total as f32 * 100.0,
            vehicles.iter().map(|v| v.speed).sum::<f32>() / total as f32,
        )
    } else {
        (0.0, 0.0)
    };
    let level = TrafficLevel::from_vehicle_count(total);

    let mut worst_junctions: Vec<&JunctionAnalysis> =
        junctions.iter().filter(|j| j.vehicles > 3).collect();
    worst_junctions.sort_by_key(|j| Reverse(OrderedFloat(j.congestion_score)));
    worst_junctions.truncate(5);

    let mut worst_streets: Vec<&StreetAnalysis> =
        streets.iter().filter(|s| s.vehicles > 5).collect();
    worst_streets.sort_by_key(|s| Reverse(OrderedFloat(s.congestion_percent)));
    worst_streets.truncate(3);

    let mut underutilized: Vec<&JunctionAnalysis> = junctions
        .iter()
        .filter(|j| j.has_signal && j.vehicles < 8 && j.average_wait < 20.0)
        .collect();
    underutilized.sort_by_key(|j| j.vehicles);
    underutilized.truncate(4);

    let mut needs_signals: Vec<&JunctionAnalysis> = junctions
        .iter()
        .filter(|j| !j.has_signal && j.congestion_score > 5.0 && j.vehicles > 10)
        .collect();
    needs_signals.sort_by_key(|j| Reverse(OrderedFloat(j.congestion_score)));
    needs_signals.truncate(2);

    let mut suggestions = vec![Suggestion {
        kind: SuggestionKind::DeployLearning,
        impact: Impact::Critical,
        description: format!(
            "Deploy Q-learning control - current avg speed {:.2}, {} vehicles waiting",
            average_speed, system_waiting
        ),
        reason: format!(
            "The controller will tune {} signals in real time. Expected {} improvement under {} traffic.",
            signal_count,
            level.expected_improvement(),
            level
        ),
    }];

    let roundabouts: Vec<&JunctionAnalysis> = worst_junctions
        .iter()
        .copied()
        .filter(|j| j.has_signal)
        .take(if level.is_congested() { 3 } else { 2 })
        .collect();
    if !roundabouts.is_empty() {
        suggestions.push(Suggestion {
            kind: SuggestionKind::Roundabouts {
                junctions: roundabouts.iter().map(|j| j.junction).collect(),
            },
            impact: if level.is_congested() {
                Impact::Critical
            } else {
                Impact::High
            },
            description: format!(
                "Convert to roundabouts: {}",
                join_names(roundabouts.iter().map(|j| j.name.as_str()))
            ),
            reason: roundabouts
                .iter()
                .map(|j| format!("{} ({} waiting, {:.0} avg wait)", j.name, j.waiting, j.average_wait))
                .collect::<Vec<_>>()
                .join("; "),
        });
    }

    if level.is_congested() {
        let expansions: Vec<(&StreetAnalysis, u32)> = worst_streets
            .iter()
            .copied()
            .filter(|s| s.lanes < MAX_LANES && s.congestion_percent > 40.0)
            .map(|s| {
                let added = if s.congestion_percent > 70.0 { 2 } else { 1 };
                (s, (s.lanes + added).min(MAX_LANES))
            })
            .collect();
        if !expansions.is_empty() {
            suggestions.push(Suggestion {
                kind: SuggestionKind::LaneExpansion {
                    streets: expansions.iter().map(|(s, lanes)| (s.street, *lanes)).collect(),
                },
                impact: Impact::Critical,
                description: format!(
                    "Expand lanes: {}",
                    expansions
                        .iter()
                        .map(|(s, lanes)| format!("{} ({} -> {})", s.name, s.lanes, lanes))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
                reason: expansions
                    .iter()
                    .map(|(s, _)| {
                        format!(
                            "{} ({:.0}% congestion, {}/{} waiting)",
                            s.name, s.congestion_percent, s.waiting, s.vehicles
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("; "),
            });
        }
    }

    if !needs_signals.is_empty() {
        suggestions.push(Suggestion {
            kind: SuggestionKind::AdaptiveSignals {
                junctions: needs_signals.iter().map(|j| j.junction).collect(),
            },
            impact: Impact::High,
            description: format!(
                "Add adaptive signals at {}",
                join_names(needs_signals.iter().map(|j| j.name.as_str()))
            ),
            reason: needs_signals
                .iter()
                .map(|j| format!("{} ({} vehicles, score {:.1})", j.name, j.vehicles, j.congestion_score))
                .collect::<Vec<_>>()
                .join("; "),
        });
    }

    if !underutilized.is_empty() {
        let limit = match level {
            TrafficLevel::Light => 4,
            TrafficLevel::Normal => 3,
            _ => 2,
        };
        let removed: Vec<&JunctionAnalysis> = underutilized.iter().copied().take(limit).collect();
        suggestions.push(Suggestion {
            kind: SuggestionKind::RemoveSignals {
                junctions: removed.iter().map(|j| j.junction).collect(),
            },
            impact: if level == TrafficLevel::Light {
                Impact::High
            } else {
                Impact::Medium
            },
            description: format!(
                "Remove {} underutilized signals: {}",
                removed.len(),
                join_names(removed.iter().map(|j| j.name.as_str()))
            ),
            reason: removed
                .iter()
                .map(|j| format!("{} ({} vehicles, {:.0} avg wait)", j.name, j.vehicles, j.average_wait))
                .collect::<Vec<_>>()
                .join("; "),
        });
    }

    if !worst_streets.is_empty() {
        suggestions.push(Suggestion {
            kind: SuggestionKind::Hotspots {
                streets: worst_streets.iter().map(|s| s.street).collect(),
            },
            impact: Impact::Info,
            description: format!(
                "Congestion hotspots: {}",
                join_names(worst_streets.iter().map(|s| s.name.as_str()))
            ),
            reason: worst_streets
                .iter()
                .map(|s| {
                    format!(
                        "{} ({}/{} waiting, {:.0}% congestion, {} lanes)",
                        s.name, s.waiting, s.vehicles, s.congestion_percent, s.lanes
                    )
                })
                .collect::<Vec<_>>()
                .join("; "),
        });
    }

    suggestions.push(Suggestion {
        kind: SuggestionKind::Summary,
        impact: Impact::Info,
        description: format!(
            "Traffic level {} - {} vehicles, {:.1}% congestion",
            level, total, congestion
        ),
        reason: format!(
            "{} vehicles waiting, avg speed {:.2}. {} junctions need attention, {} streets congested.",
            system_waiting,
            average_speed,
            worst_junctions.len(),
            worst_streets.len()
        ),
    });

    suggestions
}

/// Infrastructure edits that carry out the actionable suggestions
///
/// Lane expansions come first, then roundabouts, new signals and signal
/// removals. A junction named by several suggestions ends up with the kind
/// of the last one.
pub fn edits_for(suggestions: &[Suggestion]) -> Vec<InfrastructureEdit> {
    let mut lanes = Vec::new();
    let mut roundabouts = Vec::new();
    let mut additions = Vec::new();
    let mut removals = Vec::new();

    for suggestion in suggestions {
        match &suggestion.kind {
            SuggestionKind::LaneExpansion { streets } => {
                lanes.extend(streets.iter().map(|&(street, count)| {
                    InfrastructureEdit::SetLaneCount {
                        street,
                        lanes: count,
                    }
                }));
            }
            SuggestionKind::Roundabouts { junctions } => {
                roundabouts.extend(junctions.iter().map(|&junction| {
                    InfrastructureEdit::SetJunctionKind {
                        junction,
                        kind: JunctionKind::Roundabout,
                    }
                }));
            }
            SuggestionKind::AdaptiveSignals { junctions } => {
                additions.extend(junctions.iter().map(|&junction| {
                    InfrastructureEdit::SetJunctionKind {
                        junction,
                        kind: JunctionKind::Signal,
                    }
                }));
            }
            SuggestionKind::RemoveSignals { junctions } => {
                removals.extend(junctions.iter().map(|&junction| {
                    InfrastructureEdit::SetJunctionKind {
                        junction,
                        kind: JunctionKind::Stop,
                    }
                }));
            }
            SuggestionKind::DeployLearning
            | SuggestionKind::Hotspots { .. }
            | SuggestionKind::Summary => {}
        }
    }

    lanes
        .into_iter()
        .chain(roundabouts)
        .chain(additions)
        .chain(removals)
        .collect()
}

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;

use traffic_planner::simulation::{
    CityComparison, CityTopology, SimConfig, SuggestionKind, VehicleCounts,
};

/// Ticks between two printed summaries (10 simulated seconds)
const TICKS_PER_REPORT: u64 = 600;

#[derive(Parser)]
#[command(name = "traffic_planner")]
#[command(about = "Headless baseline vs. Q-learning traffic city comparison")]
struct Cli {
    /// Number of simulation ticks to run
    #[arg(long, default_value = "1200")]
    ticks: u64,

    /// Seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Vehicle preset: light, normal, heavy or rush_hour
    #[arg(long)]
    preset: Option<String>,

    /// Simulation config JSON file
    #[arg(long)]
    config: Option<PathBuf>,

    /// City topology JSON file (defaults to the stock city)
    #[arg(long)]
    topology: Option<PathBuf>,

    /// Ignore streets and obstacles and keep fixed signal timing
    #[arg(long)]
    legacy: bool,

    /// Halfway through, apply the suggested infrastructure changes to the optimized city
    #[arg(long)]
    suggest: bool,

    /// Print the final snapshots as JSON instead of text summaries
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("warn,traffic_planner=info"),
    )
    .init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;
    let topology = match &cli.topology {
        Some(path) => CityTopology::load(path)?,
        None => CityTopology::default_city(),
    };

    run_headless(&cli, topology, config)
}

fn build_config(cli: &Cli) -> Result<SimConfig> {
    let mut config = match &cli.config {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };
    if let Some(name) = &cli.preset {
        config.vehicle_counts = VehicleCounts::preset(name).with_context(|| {
            format!(
                "Unknown preset '{}' (expected one of {})",
                name,
                VehicleCounts::PRESETS.join(", ")
            )
        })?;
    }
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    if cli.legacy {
        config.topology_aware = false;
    }
    Ok(config)
}

/// Run the simulation in headless mode (no graphics)
fn run_headless(cli: &Cli, topology: CityTopology, config: SimConfig) -> Result<()> {
    info!(
        "Running {} ticks with {} vehicles per city{}",
        cli.ticks,
        config.population().total(),
        if config.topology_aware { "" } else { " (legacy mode)" }
    );

    let mut cities = CityComparison::new(topology, config);
    if !cli.json {
        println!("Initial state:");
        cities.baseline.print_summary();
        cities.optimized.print_summary();
    }

    let mut suggest_at = cli.suggest.then_some(cli.ticks / 2);
    let mut tick = 0;
    while tick < cli.ticks {
        if suggest_at.is_some_and(|at| at <= tick) {
            apply_suggestions(&mut cities);
            suggest_at = None;
        }

        let mut chunk = TICKS_PER_REPORT.min(cli.ticks - tick);
        if let Some(at) = suggest_at {
            chunk = chunk.min(at - tick);
        }
        tick += cities.run(chunk);

        if !cli.json && (tick % TICKS_PER_REPORT == 0 || tick == cli.ticks) {
            println!("--- After tick {} ---", tick);
            cities.baseline.print_summary();
            cities.optimized.print_summary();
        }
    }

    let report = cities.report();
    info!("=== SIMULATION COMPLETE ===");
    info!("Ticks: {}", tick);
    info!(
        "Average speed: baseline {:.2}, optimized {:.2} ({:+.1}%)",
        report.baseline.average_speed, report.optimized.average_speed, report.speed_improvement
    );
    info!(
        "Congestion: baseline {:.1}%, optimized {:.1}% ({:.1}% reduction)",
        report.baseline.congestion_percent,
        report.optimized.congestion_percent,
        report.congestion_reduction
    );
    info!("Q-learning updates: {}", report.controller.updates);
    info!(
        "Average reward: {:.2}, exploration rate: {:.4}, table size: {}",
        report.controller.average_reward,
        report.controller.exploration_rate,
        report.controller.table_size
    );

    if cli.json {
        let output = serde_json::json!({
            "report": report,
            "baseline": cities.baseline.snapshot(),
            "optimized": cities.optimized.snapshot(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialize snapshots")?
        );
    }
    Ok(())
}

fn apply_suggestions(cities: &mut CityComparison) {
    let suggestions = cities.suggest();
    for suggestion in &suggestions {
        info!(
            "Suggestion [{:?}] {} - {}",
            suggestion.impact, suggestion.description, suggestion.reason
        );
    }
    let actionable = suggestions
        .iter()
        .filter(|s| {
            !matches!(
                s.kind,
                SuggestionKind::DeployLearning
                    | SuggestionKind::Hotspots { .. }
                    | SuggestionKind::Summary
            )
        })
        .count();
    let edits = cities.apply_suggestions(&suggestions);
    info!(
        "{} actionable suggestions turned into {} edits",
        actionable, edits
    );
}

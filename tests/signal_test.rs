//! Traffic signal validation tests
//!
//! Tests the red/green state machine and the adaptive duration tuning

use rand::rngs::StdRng;
use rand::SeedableRng;
use traffic_planner::simulation::{
    Action, CityProfile, ControllerConfig, Heading, JunctionId, LocalTraffic, Position, ProfileParams,
    QLearningController, SignalColor, TrafficSignal, Vehicle, VehicleId, VehicleKind,
};

fn baseline_signal() -> TrafficSignal {
    TrafficSignal::fixed(JunctionId(0), "Test Crossing", Position::new(140.0, 140.0), 240, 80)
}

fn optimized_signal() -> TrafficSignal {
    let params = ProfileParams::for_profile(CityProfile::Optimized);
    TrafficSignal::adaptive(
        JunctionId(0),
        "Test Crossing",
        Position::new(140.0, 140.0),
        &params.signal_timing,
    )
}

fn waiting_car(id: usize, x: f32, y: f32) -> Vehicle {
    let mut vehicle = Vehicle::new(VehicleId(id), VehicleKind::Car, Position::new(x, y), Heading::Up);
    vehicle.speed = 0.0;
    vehicle
}

#[test]
fn test_signal_starts_green() {
    let signal = baseline_signal();
    assert_eq!(signal.color, SignalColor::Green);
    assert_eq!(signal.timer, 0);
    assert!(!signal.is_adaptive());
}

/// Red 240 / green 80 from green: red after 81 ticks, green again 241 ticks later
#[test]
fn test_fixed_signal_cycle() {
    let mut signal = baseline_signal();
    let mut rng = StdRng::seed_from_u64(1);

    for tick in 0..80 {
        signal.tick(&[], None, tick, &mut rng);
        assert_eq!(signal.color, SignalColor::Green, "Still green at tick {}", tick + 1);
    }
    signal.tick(&[], None, 80, &mut rng);
    assert_eq!(signal.color, SignalColor::Red);
    assert_eq!(signal.timer, 0);

    for tick in 0..240 {
        signal.tick(&[], None, 81 + tick, &mut rng);
        assert_eq!(signal.color, SignalColor::Red);
    }
    signal.tick(&[], None, 321, &mut rng);
    assert_eq!(signal.color, SignalColor::Green);
    assert_eq!(signal.timer, 0);

    // Durations of a fixed signal never change
    assert_eq!(signal.red_duration, 240);
    assert_eq!(signal.green_duration, 80);
}

#[test]
fn test_signal_alternates_strictly() {
    let mut signal = baseline_signal();
    let mut rng = StdRng::seed_from_u64(2);
    let mut previous = signal.color;
    let mut transitions = 0;

    for tick in 0..2000 {
        signal.tick(&[], None, tick, &mut rng);
        if signal.color != previous {
            assert_eq!(signal.timer, 0, "Timer must reset on every transition");
            assert_ne!(signal.color, previous);
            previous = signal.color;
            transitions += 1;
        }
    }
    // One full cycle is 81 + 241 ticks, so 2000 ticks hold six of them
    assert_eq!(transitions, 12);
}

#[test]
fn test_countdown_display() {
    let mut signal = baseline_signal();
    let mut rng = StdRng::seed_from_u64(3);
    assert_eq!(signal.remaining_ticks(), 80);
    assert_eq!(signal.countdown_seconds(), 2);

    for tick in 0..30 {
        signal.tick(&[], None, tick, &mut rng);
    }
    assert_eq!(signal.remaining_ticks(), 50);
    assert_eq!(signal.countdown_seconds(), 1);
}

#[test]
fn test_adaptive_durations_stay_in_bounds() {
    let mut signal = optimized_signal();
    let bounds = signal.adaptive.unwrap();
    let quiet = LocalTraffic::default();

    for _ in 0..50 {
        signal.apply_action(Action::Extend, &quiet);
    }
    assert_eq!(signal.green_duration, bounds.max_green);
    assert_eq!(signal.red_duration, bounds.min_red);

    for _ in 0..50 {
        signal.apply_action(Action::Shorten, &quiet);
    }
    assert_eq!(signal.green_duration, bounds.min_green);
    assert_eq!(signal.red_duration, bounds.max_red);
}

#[test]
fn test_shorten_requires_empty_junction() {
    let mut signal = optimized_signal();
    let green = signal.green_duration;
    let red = signal.red_duration;

    let busy = LocalTraffic {
        nearby: 4,
        waiting: 1,
        moving: 3,
        mean_wait: 5.0,
    };
    signal.apply_action(Action::Shorten, &busy);
    assert_eq!(signal.green_duration, green);
    assert_eq!(signal.red_duration, red);

    let crowded_but_moving = LocalTraffic {
        nearby: 5,
        waiting: 0,
        moving: 5,
        mean_wait: 0.0,
    };
    signal.apply_action(Action::Shorten, &crowded_but_moving);
    assert_eq!(signal.green_duration, green);

    signal.apply_action(Action::Shorten, &LocalTraffic::default());
    assert!(signal.green_duration < green);
    assert!(signal.red_duration > red);
}

#[test]
fn test_fixed_signal_ignores_actions() {
    let mut signal = baseline_signal();
    signal.apply_action(Action::Extend, &LocalTraffic::default());
    assert_eq!(signal.green_duration, 80);
    assert_eq!(signal.red_duration, 240);
}

#[test]
fn test_adaptive_signal_consults_controller() {
    let controller = QLearningController::new(ControllerConfig::default());
    let period = controller.config().decision_period;
    let mut signal = optimized_signal();
    let mut rng = StdRng::seed_from_u64(4);
    // A single moving car keeps the junction occupied but below the queue threshold
    let mut car = waiting_car(0, 140.0, 170.0);
    car.speed = 0.5;
    let vehicles = vec![car];

    let mut decisions = Vec::new();
    for tick in 0..(period as u64 * 3) {
        if let Some(pending) = signal.tick(&vehicles, Some(&controller), tick, &mut rng) {
            decisions.push((tick, pending));
        }
    }

    assert_eq!(decisions.len(), 3);
    for (tick, pending) in decisions {
        assert_eq!(pending.junction, JunctionId(0));
        assert_eq!(pending.due_tick, tick + controller.config().reward_delay_ticks);
        assert_eq!(pending.before_moving, 1);
        assert_eq!(pending.before_waiting, 0);
    }
}

#[test]
fn test_fixed_signal_never_consults_controller() {
    let controller = QLearningController::default();
    let mut signal = baseline_signal();
    let mut rng = StdRng::seed_from_u64(5);
    let vehicles = vec![waiting_car(0, 140.0, 170.0)];

    for tick in 0..500 {
        assert!(signal
            .tick(&vehicles, Some(&controller), tick, &mut rng)
            .is_none());
    }
}

#[test]
fn test_queue_at_red_shortens_red_phase() {
    let controller = QLearningController::default();
    let mut signal = optimized_signal();
    let mut rng = StdRng::seed_from_u64(6);
    signal.color = SignalColor::Red;
    signal.red_duration = 20;
    let queue: Vec<Vehicle> = (0..6).map(|i| waiting_car(i, 140.0, 150.0 + i as f32 * 5.0)).collect();

    // Each tick adds 1 plus the queue bonus of 3
    for tick in 0..5 {
        signal.tick(&queue, Some(&controller), tick, &mut rng);
    }
    assert_eq!(signal.color, SignalColor::Red);
    assert_eq!(signal.timer, 20);

    signal.tick(&queue, Some(&controller), 5, &mut rng);
    assert_eq!(signal.color, SignalColor::Green);
}

/// Without a controller an adaptive signal counts plain ticks
#[test]
fn test_queue_nudge_needs_controller() {
    let mut signal = optimized_signal();
    let mut rng = StdRng::seed_from_u64(7);
    signal.color = SignalColor::Red;
    signal.red_duration = 20;
    let queue: Vec<Vehicle> = (0..6).map(|i| waiting_car(i, 140.0, 150.0 + i as f32 * 5.0)).collect();

    for tick in 0..5 {
        assert!(signal.tick(&queue, None, tick, &mut rng).is_none());
    }
    assert_eq!(signal.timer, 5);

    for tick in 5..20 {
        signal.tick(&queue, None, tick, &mut rng);
    }
    assert_eq!(signal.color, SignalColor::Red);
    signal.tick(&queue, None, 20, &mut rng);
    assert_eq!(signal.color, SignalColor::Green);
    assert_eq!(signal.red_duration, 20);
}

// Breaker state-machine checks: timed transitions, lock semantics, the
// overload auto-trip chain, and the contact resistance model. Waits carry
// generous slack over the configured switching times.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use sv_core::sim::{Breaker, BreakerDefinition, BreakerState};

fn wait(ms: u64) {
    thread::sleep(Duration::from_millis(ms));
}

#[test]
fn test_initial_state_is_open() {
    let breaker = Breaker::create();
    assert_eq!(breaker.state(), BreakerState::Open);
    assert!(breaker.is_open());
    assert!(!breaker.is_closed());
    assert!(!breaker.is_locked());
    assert_eq!(breaker.current(), 0.0);
}

#[test]
fn test_invalid_definition_rejected() {
    let mut definition = BreakerDefinition::default();
    definition.max_current_a = -100.0;
    assert!(Breaker::create_with(definition).is_err());

    definition = BreakerDefinition::default();
    definition.open_time_sec = 0.0;
    assert!(Breaker::create_with(definition).is_err());

    let breaker = Breaker::create();
    let mut bad = BreakerDefinition::default();
    bad.close_time_sec = -1.0;
    assert!(breaker.set_definition(bad).is_err());
    assert!(breaker.definition().is_valid());
}

#[test]
fn test_custom_definition_retained() {
    let mut definition = BreakerDefinition::default();
    definition.max_current_a = 2000.0;
    definition.voltage_rating_v = 800.0;
    definition.open_time_sec = 0.030;
    definition.close_time_sec = 0.080;

    let breaker = Breaker::create_with(definition).unwrap();
    let retrieved = breaker.definition();
    assert_eq!(retrieved.max_current_a, 2000.0);
    assert_eq!(retrieved.voltage_rating_v, 800.0);
    assert_eq!(retrieved.open_time_sec, 0.030);
    assert_eq!(retrieved.close_time_sec, 0.080);
}

#[test]
fn test_close_then_open_cycle() {
    let breaker = Breaker::create();

    assert!(breaker.close());
    assert!(breaker.is_closing());
    assert!(!breaker.close()); // already closing
    wait(150);
    assert!(breaker.is_closed());
    assert_eq!(breaker.state(), BreakerState::Closed);

    assert!(breaker.open());
    assert!(breaker.is_opening());
    assert!(!breaker.open()); // already opening
    wait(100);
    assert!(breaker.is_open());
    assert_eq!(breaker.state(), BreakerState::Open);
}

#[test]
fn test_open_rejected_when_already_open() {
    let breaker = Breaker::create();
    assert!(!breaker.open());
}

#[test]
fn test_lock_blocks_commands() {
    let breaker = Breaker::create();
    breaker.close();
    wait(150);

    breaker.lock();
    assert_eq!(breaker.state(), BreakerState::LockedClosed);
    assert!(breaker.is_locked());
    assert!(breaker.is_closed());
    assert!(!breaker.open());
    assert!(!breaker.close());

    breaker.unlock();
    assert_eq!(breaker.state(), BreakerState::Closed);
    assert!(breaker.open());
    wait(100);
    assert_eq!(breaker.state(), BreakerState::Open);

    breaker.lock();
    assert_eq!(breaker.state(), BreakerState::LockedOpen);
    breaker.unlock();
    assert_eq!(breaker.state(), BreakerState::Open);
}

#[test]
fn test_trip_clears_lock_and_current() {
    let breaker = Breaker::create();
    breaker.close();
    wait(150);
    breaker.set_current(500.0);
    breaker.lock();
    assert!(breaker.is_locked());

    breaker.trip();
    assert!(breaker.is_open());
    assert!(!breaker.is_locked());
    assert_eq!(breaker.current(), 0.0);
}

#[test]
fn test_overload_trip_chain() {
    let breaker = Breaker::create();

    let transitions: Arc<Mutex<Vec<(BreakerState, BreakerState)>>> =
        Arc::new(Mutex::new(Vec::new()));
    let observed = Arc::clone(&transitions);
    breaker.on_state_change(move |old, new| {
        observed.lock().unwrap().push((old, new));
    });

    breaker.close();
    wait(150);
    assert!(breaker.is_closed());

    // Rated at 1000 A; 1500 A trips on the spot.
    breaker.set_current(1500.0);
    wait(20);
    assert_eq!(breaker.state(), BreakerState::Open);
    assert_eq!(breaker.current(), 0.0);

    let seen = transitions.lock().unwrap();
    assert_eq!(
        seen.as_slice(),
        &[
            (BreakerState::Open, BreakerState::Closing),
            (BreakerState::Closing, BreakerState::Closed),
            (BreakerState::Closed, BreakerState::Open),
        ]
    );
}

#[test]
fn test_negative_overload_trips() {
    let breaker = Breaker::create();
    breaker.close();
    wait(150);
    breaker.set_current(-1500.0);
    wait(20);
    assert!(breaker.is_open());
}

#[test]
fn test_callback_may_reenter() {
    let breaker = Arc::new(Breaker::create());
    let handle = Arc::clone(&breaker);
    let relatched = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&relatched);

    // A reclosing scheme: lock the breaker the moment it lands open.
    breaker.on_state_change(move |_, new| {
        if new == BreakerState::Open {
            handle.lock();
            *flag.lock().unwrap() = true;
        }
    });

    breaker.close();
    wait(150);
    breaker.trip();
    wait(20);

    assert!(*relatched.lock().unwrap());
    assert_eq!(breaker.state(), BreakerState::LockedOpen);
}

#[test]
fn test_resistance_model() {
    let breaker = Breaker::create();
    let definition = breaker.definition();

    assert_eq!(breaker.resistance(), f64::INFINITY);

    breaker.close();
    wait(150);
    assert_eq!(breaker.resistance(), definition.resistance_ohm);

    // Mid-travel the value sits between contact and arc resistance.
    breaker.open();
    let mid = breaker.resistance();
    assert!(mid.is_finite());
    assert!(mid >= definition.resistance_ohm.min(definition.arc_resistance_ohm));
    assert!(mid <= definition.resistance_ohm.max(definition.arc_resistance_ohm));

    wait(100);
    assert_eq!(breaker.resistance(), f64::INFINITY);
}

#[test]
fn test_arc_voltage_only_during_transition() {
    let breaker = Breaker::create();
    assert_eq!(breaker.arc_voltage(), 0.0);

    breaker.close();
    wait(150);
    breaker.set_current(500.0);
    assert_eq!(breaker.arc_voltage(), 0.0); // closed, no arc

    breaker.open();
    let arcing = breaker.arc_voltage();
    assert!(arcing > 0.0, "expected an arc while opening, got {}", arcing);

    wait(100);
    assert_eq!(breaker.arc_voltage(), 0.0);
}

#[test]
fn test_run_simulation_trips_on_fault() {
    let mut definition = BreakerDefinition::default();
    definition.close_time_sec = 0.020;
    definition.open_time_sec = 0.010;
    let breaker = Breaker::create_with(definition).unwrap();

    let result = breaker
        .run_simulation(400.0, 100.0, 5000.0, 0.05, 0.2, 0.01)
        .unwrap();

    assert!(result.trip_occurred);
    assert!(result.trip_time >= 0.05);
    assert_eq!(result.time_points.len(), result.current_values.len());
    assert_eq!(result.time_points.len(), result.state_history.len());
    assert!(!result.time_points.is_empty());
}

#[test]
fn test_run_simulation_rejects_bad_parameters() {
    let breaker = Breaker::create();
    assert!(breaker.run_simulation(0.0, 100.0, 5000.0, 0.1, 1.0, 0.01).is_err());
    assert!(breaker.run_simulation(400.0, -1.0, 5000.0, 0.1, 1.0, 0.01).is_err());
    assert!(breaker.run_simulation(400.0, 100.0, 5000.0, 0.1, 0.0, 0.01).is_err());
    assert!(breaker.run_simulation(400.0, 100.0, 5000.0, 0.1, 1.0, 0.0).is_err());
}

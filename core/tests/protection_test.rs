// Relay behavior checks: zone-1 instantaneous distance trips, threshold
// blocking, directionality, zone timing, and the differential bias
// characteristic with its instantaneous stage.

use std::f64::consts::PI;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use sv_core::protection::{
    DifferentialProtection, DifferentialProtectionSettings, DistanceProtection,
    DistanceProtectionSettings, Phasor,
};

fn zone1_settings() -> DistanceProtectionSettings {
    let mut settings = DistanceProtectionSettings::default();
    settings.zone1.reach_ohm = 10.0;
    settings.zone1.angle_rad = PI / 3.0;
    settings.zone1.delay = Duration::ZERO;
    settings.zone1.enabled = true;
    settings.voltage_threshold_v = 20.0;
    settings.current_threshold_a = 0.5;
    settings.direction_forward = true;
    settings
}

#[test]
fn test_distance_zone1_instantaneous_trip() {
    let relay = DistanceProtection::create(zone1_settings()).unwrap();

    let trips = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&trips);
    relay.on_trip(move |result| {
        assert!(result.zone1_trip);
        counter.fetch_add(1, Ordering::SeqCst);
    });

    // |Z| = 100 V / 20 A = 5 ohm at angle 0: inside zone 1, forward.
    let result = relay.update(Phasor::new(100.0, 0.0), Phasor::new(20.0, 0.0));

    assert!(result.zone1_trip);
    assert!((result.measured_impedance_ohm - 5.0).abs() < 1e-9);
    assert!(result.measured_angle_rad.abs() < 1e-9);
    assert!(result.trip_time.is_some());
    assert_eq!(trips.load(Ordering::SeqCst), 1);
}

#[test]
fn test_distance_blocked_below_thresholds() {
    let relay = DistanceProtection::create(zone1_settings()).unwrap();

    // 10 V is under the 20 V floor even though Z would sit in zone 1.
    let result = relay.update(Phasor::new(10.0, 0.0), Phasor::new(20.0, 0.0));
    assert!(!result.tripped());
    assert_eq!(result.measured_impedance_ohm, 0.0);

    // 0.2 A is under the 0.5 A floor.
    let result = relay.update(Phasor::new(100.0, 0.0), Phasor::new(0.2, 0.0));
    assert!(!result.tripped());
}

#[test]
fn test_distance_reverse_fault_blocked() {
    let relay = DistanceProtection::create(zone1_settings()).unwrap();

    // Re(Z) < 0: a fault behind the relay. No trip, but the measured
    // impedance is still reported.
    let result = relay.update(Phasor::new(-100.0, 0.0), Phasor::new(20.0, 0.0));
    assert!(!result.tripped());
    assert!((result.measured_impedance_ohm - 5.0).abs() < 1e-9);

    // A reverse-set relay blocks the forward fault the same way.
    let mut reverse = zone1_settings();
    reverse.direction_forward = false;
    let relay = DistanceProtection::create(reverse).unwrap();
    let result = relay.update(Phasor::new(100.0, 0.0), Phasor::new(20.0, 0.0));
    assert!(!result.tripped());
    assert!((result.measured_impedance_ohm - 5.0).abs() < 1e-9);
}

#[test]
fn test_distance_zero_real_impedance_blocked_both_directions() {
    // Z = 5i ohm: Re(Z) == 0 satisfies neither Re(Z) > 0 nor Re(Z) < 0,
    // so both relay orientations must block.
    let v = Phasor::new(0.0, 100.0);
    let i = Phasor::new(20.0, 0.0);

    let relay = DistanceProtection::create(zone1_settings()).unwrap();
    let result = relay.update(v, i);
    assert!(!result.tripped());
    assert!((result.measured_impedance_ohm - 5.0).abs() < 1e-9);

    let mut reverse = zone1_settings();
    reverse.direction_forward = false;
    let relay = DistanceProtection::create(reverse).unwrap();
    let result = relay.update(v, i);
    assert!(!result.tripped());
    assert!((result.measured_impedance_ohm - 5.0).abs() < 1e-9);
}

#[test]
fn test_distance_outside_reach_no_trip() {
    let relay = DistanceProtection::create(zone1_settings()).unwrap();

    // 100 V / 2 A = 50 ohm: outside every default reach.
    let result = relay.update(Phasor::new(100.0, 0.0), Phasor::new(2.0, 0.0));
    assert!(!result.tripped());
    assert!((result.measured_impedance_ohm - 50.0).abs() < 1e-9);
}

#[test]
fn test_distance_angle_discrimination() {
    let mut settings = zone1_settings();
    settings.zone2.enabled = false;
    settings.zone3.enabled = false;
    let relay = DistanceProtection::create(settings).unwrap();

    // Impedance angle of 90 degrees falls outside the 60-degree sector.
    let result = relay.update(Phasor::new(0.0, 100.0), Phasor::new(20.0, 0.0));
    assert!(!result.tripped());
}

#[test]
fn test_distance_zone2_waits_out_its_delay() {
    let mut settings = zone1_settings();
    settings.zone1.enabled = false;
    settings.zone2.delay = Duration::from_millis(50);
    settings.zone3.enabled = false;
    let relay = DistanceProtection::create(settings).unwrap();

    // 15 ohm: inside zone 2 (20 ohm) but outside zone 1.
    let v = Phasor::new(150.0, 0.0);
    let i = Phasor::new(10.0, 0.0);

    let first = relay.update(v, i);
    assert!(!first.zone2_trip);

    thread::sleep(Duration::from_millis(70));
    let second = relay.update(v, i);
    assert!(second.zone2_trip);
    assert!(!second.zone1_trip);
}

#[test]
fn test_distance_pickup_drop_resets_timer() {
    let mut settings = zone1_settings();
    settings.zone1.enabled = false;
    settings.zone2.delay = Duration::from_millis(50);
    settings.zone3.enabled = false;
    let relay = DistanceProtection::create(settings).unwrap();

    let inside = (Phasor::new(150.0, 0.0), Phasor::new(10.0, 0.0));
    let outside = (Phasor::new(150.0, 0.0), Phasor::new(1.0, 0.0));

    assert!(!relay.update(inside.0, inside.1).zone2_trip);
    thread::sleep(Duration::from_millis(70));

    // The pickup dropped in between, so the timer restarts.
    relay.update(outside.0, outside.1);
    let result = relay.update(inside.0, inside.1);
    assert!(!result.zone2_trip);
}

#[test]
fn test_distance_disabled_returns_null_result() {
    let relay = DistanceProtection::create(zone1_settings()).unwrap();
    relay.set_enabled(false);
    assert!(!relay.is_enabled());

    let result = relay.update(Phasor::new(100.0, 0.0), Phasor::new(20.0, 0.0));
    assert!(!result.tripped());
    assert_eq!(result.measured_impedance_ohm, 0.0);

    relay.set_enabled(true);
    assert!(relay.update(Phasor::new(100.0, 0.0), Phasor::new(20.0, 0.0)).zone1_trip);
}

#[test]
fn test_distance_settings_validation() {
    let mut bad = DistanceProtectionSettings::default();
    bad.zone1.reach_ohm = 0.0;
    assert!(DistanceProtection::create(bad).is_err());

    let mut bad = DistanceProtectionSettings::default();
    bad.zone2.angle_rad = 4.0;
    assert!(DistanceProtection::create(bad).is_err());

    let relay = DistanceProtection::create(DistanceProtectionSettings::default()).unwrap();
    let mut bad = DistanceProtectionSettings::default();
    bad.voltage_threshold_v = -1.0;
    assert!(relay.set_settings(bad).is_err());
}

#[test]
fn test_differential_instantaneous_trip() {
    let settings = DifferentialProtectionSettings {
        slope_percent: 25.0,
        min_operating_current_a: 0.3,
        min_restraint_current_a: 1.0,
        instantaneous_threshold_a: 10.0,
    };
    let relay = DifferentialProtection::create(settings).unwrap();

    let trips = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&trips);
    relay.on_trip(move |result| {
        assert!(result.instantaneous);
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let result = relay.update(Phasor::new(100.0, 0.0), Phasor::new(0.0, 0.0));
    assert!(result.trip);
    assert!(result.instantaneous);
    assert!((result.operating_current_a - 100.0).abs() < 1e-9);
    assert!((result.restraint_current_a - 50.0).abs() < 1e-9);
    assert_eq!(trips.load(Ordering::SeqCst), 1);
}

#[test]
fn test_differential_balanced_load_holds() {
    let relay = DifferentialProtection::create(DifferentialProtectionSettings::default()).unwrap();

    // A through-load: identical current enters and leaves.
    let result = relay.update(Phasor::new(5.0, 0.0), Phasor::new(5.0, 0.0));
    assert!(!result.trip);
    assert_eq!(result.operating_current_a, 0.0);
    assert!((result.restraint_current_a - 5.0).abs() < 1e-9);
}

#[test]
fn test_differential_slope_characteristic() {
    let relay = DifferentialProtection::create(DifferentialProtectionSettings::default()).unwrap();

    // Restraint 4 A, slope 25 % -> trip line at 1 A operating.
    let below = relay.update(Phasor::new(4.45, 0.0), Phasor::new(3.55, 0.0));
    assert!(!below.trip, "operating {} should hold", below.operating_current_a);

    let above = relay.update(Phasor::new(4.6, 0.0), Phasor::new(3.4, 0.0));
    assert!(above.trip);
    assert!(!above.instantaneous);
}

#[test]
fn test_differential_minimum_operating_floor() {
    let relay = DifferentialProtection::create(DifferentialProtectionSettings::default()).unwrap();

    // Tiny imbalance below the 0.3 A minimum never trips, even with a
    // negligible restraint.
    let result = relay.update(Phasor::new(0.2, 0.0), Phasor::new(0.0, 0.0));
    assert!(!result.trip);

    // Above the operating floor with restraint under the minimum: trips.
    let result = relay.update(Phasor::new(0.8, 0.0), Phasor::new(0.0, 0.0));
    assert!(result.trip);
}

#[test]
fn test_differential_disabled_holds() {
    let relay = DifferentialProtection::create(DifferentialProtectionSettings::default()).unwrap();
    relay.set_enabled(false);
    let result = relay.update(Phasor::new(100.0, 0.0), Phasor::new(0.0, 0.0));
    assert!(!result.trip);
    assert_eq!(result.operating_current_a, 0.0);
}

#[test]
fn test_differential_settings_validation() {
    let mut bad = DifferentialProtectionSettings::default();
    bad.slope_percent = 0.0;
    assert!(DifferentialProtection::create(bad).is_err());

    bad = DifferentialProtectionSettings::default();
    bad.slope_percent = 150.0;
    assert!(DifferentialProtection::create(bad).is_err());

    bad = DifferentialProtectionSettings::default();
    bad.instantaneous_threshold_a = -5.0;
    assert!(DifferentialProtection::create(bad).is_err());
}

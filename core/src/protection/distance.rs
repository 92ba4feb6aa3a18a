// Impedance-zone distance relay: three graded zones with directional and
// timing discrimination. Zone 1 trips instantaneously, zones 2 and 3 carry
// backup delays.

use crate::iec_61850_9_2::common::ConfigError;
use crate::protection::phasor::Phasor;

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// One impedance reach locus.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceZone {
    pub reach_ohm: f64,
    pub angle_rad: f64,
    pub delay: Duration,
    pub enabled: bool,
}

impl DistanceZone {
    pub fn is_valid(&self) -> bool {
        self.reach_ohm > 0.0 && (0.0..=PI).contains(&self.angle_rad)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceProtectionSettings {
    pub zone1: DistanceZone,
    pub zone2: DistanceZone,
    pub zone3: DistanceZone,
    pub voltage_threshold_v: f64,
    pub current_threshold_a: f64,
    pub direction_forward: bool,
}

impl Default for DistanceProtectionSettings {
    fn default() -> Self {
        DistanceProtectionSettings {
            zone1: DistanceZone {
                reach_ohm: 10.0,
                angle_rad: 1.047,
                delay: Duration::ZERO,
                enabled: true,
            },
            zone2: DistanceZone {
                reach_ohm: 20.0,
                angle_rad: 1.047,
                delay: Duration::from_millis(300),
                enabled: true,
            },
            zone3: DistanceZone {
                reach_ohm: 30.0,
                angle_rad: 1.047,
                delay: Duration::from_millis(600),
                enabled: true,
            },
            voltage_threshold_v: 20.0,
            current_threshold_a: 0.5,
            direction_forward: true,
        }
    }
}

impl DistanceProtectionSettings {
    pub fn is_valid(&self) -> bool {
        self.zone1.is_valid()
            && self.zone2.is_valid()
            && self.zone3.is_valid()
            && self.voltage_threshold_v > 0.0
            && self.current_threshold_a > 0.0
    }
}

/// Outcome of one measurement update.
#[derive(Debug, Clone, Copy, Default)]
pub struct DistanceProtectionResult {
    pub zone1_trip: bool,
    pub zone2_trip: bool,
    pub zone3_trip: bool,
    pub measured_impedance_ohm: f64,
    pub measured_angle_rad: f64,
    pub trip_time: Option<Instant>,
}

impl DistanceProtectionResult {
    pub fn tripped(&self) -> bool {
        self.zone1_trip || self.zone2_trip || self.zone3_trip
    }
}

pub type DistanceTripCallback = Arc<dyn Fn(&DistanceProtectionResult) + Send + Sync>;

#[derive(Debug, Clone, Copy)]
struct ZonePickup {
    active: bool,
    started: Instant,
}

impl Default for ZonePickup {
    fn default() -> Self {
        ZonePickup {
            active: false,
            started: Instant::now(),
        }
    }
}

pub struct DistanceProtection {
    settings: Mutex<DistanceProtectionSettings>,
    enabled: AtomicBool,
    pickups: Mutex<[ZonePickup; 3]>,
    callback: Mutex<Option<DistanceTripCallback>>,
}

impl DistanceProtection {
    pub fn create(settings: DistanceProtectionSettings) -> Result<Self, ConfigError> {
        if !settings.is_valid() {
            return Err(ConfigError::InvalidSettings("distance protection"));
        }
        Ok(DistanceProtection {
            settings: Mutex::new(settings),
            enabled: AtomicBool::new(true),
            pickups: Mutex::new([ZonePickup::default(); 3]),
            callback: Mutex::new(None),
        })
    }

    /// Feeds one voltage/current measurement pair (SI units) through the
    /// relay and reports the zone decisions.
    pub fn update(&self, voltage_v: Phasor, current_a: Phasor) -> DistanceProtectionResult {
        let mut result = DistanceProtectionResult::default();

        if !self.enabled.load(Ordering::Acquire) {
            self.reset();
            return result;
        }

        let settings = *self.settings.lock().unwrap();

        // Load/blocking check: no pickup below the measurement floor.
        if voltage_v.magnitude() < settings.voltage_threshold_v
            || current_a.magnitude() < settings.current_threshold_a
        {
            self.reset();
            return result;
        }

        let impedance = voltage_v / current_a;
        result.measured_impedance_ohm = impedance.magnitude();
        result.measured_angle_rad = impedance.angle();

        // Strict directional check: a forward-set relay needs Re(Z) > 0,
        // a reverse-set relay Re(Z) < 0. Re(Z) == 0 is blocked either way.
        let blocked = if settings.direction_forward {
            impedance.re <= 0.0
        } else {
            impedance.re >= 0.0
        };
        if blocked {
            self.reset();
            return result;
        }

        let now = Instant::now();
        let zones = [&settings.zone1, &settings.zone2, &settings.zone3];
        let mut trips = [false; 3];
        {
            let mut pickups = self.pickups.lock().unwrap();
            for (index, zone) in zones.iter().enumerate() {
                if zone.enabled
                    && in_zone(zone, result.measured_impedance_ohm, result.measured_angle_rad)
                {
                    if !pickups[index].active {
                        pickups[index].active = true;
                        pickups[index].started = now;
                    }
                    if now.duration_since(pickups[index].started) >= zone.delay {
                        trips[index] = true;
                    }
                } else {
                    pickups[index].active = false;
                }
            }
        }

        result.zone1_trip = trips[0];
        result.zone2_trip = trips[1];
        result.zone3_trip = trips[2];
        if result.tripped() {
            result.trip_time = Some(now);
            self.invoke_callback(&result);
        }

        result
    }

    /// Drops every zone pickup.
    pub fn reset(&self) {
        let mut pickups = self.pickups.lock().unwrap();
        for pickup in pickups.iter_mut() {
            pickup.active = false;
        }
    }

    pub fn set_settings(&self, settings: DistanceProtectionSettings) -> Result<(), ConfigError> {
        if !settings.is_valid() {
            return Err(ConfigError::InvalidSettings("distance protection"));
        }
        *self.settings.lock().unwrap() = settings;
        Ok(())
    }

    pub fn settings(&self) -> DistanceProtectionSettings {
        *self.settings.lock().unwrap()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
        if !enabled {
            self.reset();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Registers the trip callback, fired on every update that trips a
    /// zone. The callback slot has its own lock, released before the call.
    pub fn on_trip<F>(&self, callback: F)
    where
        F: Fn(&DistanceProtectionResult) + Send + Sync + 'static,
    {
        *self.callback.lock().unwrap() = Some(Arc::new(callback));
    }

    fn invoke_callback(&self, result: &DistanceProtectionResult) {
        let callback = self.callback.lock().unwrap().clone();
        if let Some(callback) = callback {
            callback(result);
        }
    }
}

/// Inside the reach circle and within ±angle of the zone axis, modulo 2π.
fn in_zone(zone: &DistanceZone, impedance_ohm: f64, angle_rad: f64) -> bool {
    if impedance_ohm > zone.reach_ohm {
        return false;
    }
    let normalized = angle_rad.abs() % (2.0 * PI);
    normalized <= zone.angle_rad || normalized >= 2.0 * PI - zone.angle_rad
}

impl std::fmt::Debug for DistanceProtection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistanceProtection")
            .field("enabled", &self.is_enabled())
            .field("settings", &self.settings())
            .finish()
    }
}

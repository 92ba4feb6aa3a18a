// Biased differential relay: percentage-slope characteristic with an
// unrestrained instantaneous stage.

use crate::iec_61850_9_2::common::ConfigError;
use crate::protection::phasor::Phasor;

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifferentialProtectionSettings {
    pub slope_percent: f64,
    pub min_operating_current_a: f64,
    pub min_restraint_current_a: f64,
    pub instantaneous_threshold_a: f64,
}

impl Default for DifferentialProtectionSettings {
    fn default() -> Self {
        DifferentialProtectionSettings {
            slope_percent: 25.0,
            min_operating_current_a: 0.3,
            min_restraint_current_a: 1.0,
            instantaneous_threshold_a: 10.0,
        }
    }
}

impl DifferentialProtectionSettings {
    pub fn is_valid(&self) -> bool {
        self.slope_percent > 0.0
            && self.slope_percent <= 100.0
            && self.min_operating_current_a > 0.0
            && self.min_restraint_current_a > 0.0
            && self.instantaneous_threshold_a > 0.0
    }
}

/// Outcome of one measurement update.
#[derive(Debug, Clone, Copy, Default)]
pub struct DifferentialProtectionResult {
    pub trip: bool,
    pub instantaneous: bool,
    pub operating_current_a: f64,
    pub restraint_current_a: f64,
    pub trip_time: Option<Instant>,
}

pub type DifferentialTripCallback = Arc<dyn Fn(&DifferentialProtectionResult) + Send + Sync>;

pub struct DifferentialProtection {
    settings: Mutex<DifferentialProtectionSettings>,
    enabled: AtomicBool,
    callback: Mutex<Option<DifferentialTripCallback>>,
}

impl DifferentialProtection {
    pub fn create(settings: DifferentialProtectionSettings) -> Result<Self, ConfigError> {
        if !settings.is_valid() {
            return Err(ConfigError::InvalidSettings("differential protection"));
        }
        Ok(DifferentialProtection {
            settings: Mutex::new(settings),
            enabled: AtomicBool::new(true),
            callback: Mutex::new(None),
        })
    }

    /// Feeds the two side currents (SI units) through the relay.
    /// Operating current is |I1 - I2|, restraint is |I1 + I2| / 2.
    pub fn update(&self, current1_a: Phasor, current2_a: Phasor) -> DifferentialProtectionResult {
        let mut result = DifferentialProtectionResult::default();

        if !self.enabled.load(Ordering::Acquire) {
            return result;
        }

        let settings = *self.settings.lock().unwrap();

        result.operating_current_a = (current1_a - current2_a).magnitude();
        result.restraint_current_a = ((current1_a + current2_a) * 0.5).magnitude();

        if result.operating_current_a >= settings.instantaneous_threshold_a {
            result.trip = true;
            result.instantaneous = true;
            result.trip_time = Some(Instant::now());
            self.invoke_callback(&result);
            return result;
        }

        if in_characteristic(
            &settings,
            result.operating_current_a,
            result.restraint_current_a,
        ) {
            result.trip = true;
            result.trip_time = Some(Instant::now());
            self.invoke_callback(&result);
        }

        result
    }

    pub fn set_settings(
        &self,
        settings: DifferentialProtectionSettings,
    ) -> Result<(), ConfigError> {
        if !settings.is_valid() {
            return Err(ConfigError::InvalidSettings("differential protection"));
        }
        *self.settings.lock().unwrap() = settings;
        Ok(())
    }

    pub fn settings(&self) -> DifferentialProtectionSettings {
        *self.settings.lock().unwrap()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Registers the trip callback. The slot has its own lock, released
    /// before the call.
    pub fn on_trip<F>(&self, callback: F)
    where
        F: Fn(&DifferentialProtectionResult) + Send + Sync + 'static,
    {
        *self.callback.lock().unwrap() = Some(Arc::new(callback));
    }

    fn invoke_callback(&self, result: &DifferentialProtectionResult) {
        let callback = self.callback.lock().unwrap().clone();
        if let Some(callback) = callback {
            callback(result);
        }
    }
}

/// Percentage-bias characteristic: below the minimum operating current the
/// relay stays quiet; below the minimum restraint the operating pickup
/// alone decides; above it the operating current must beat the slope line.
fn in_characteristic(
    settings: &DifferentialProtectionSettings,
    operating: f64,
    restraint: f64,
) -> bool {
    if operating < settings.min_operating_current_a {
        return false;
    }
    if restraint < settings.min_restraint_current_a {
        return operating >= settings.min_operating_current_a;
    }
    operating >= restraint * (settings.slope_percent / 100.0)
}

impl std::fmt::Debug for DifferentialProtection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DifferentialProtection")
            .field("enabled", &self.is_enabled())
            .field("settings", &self.settings())
            .finish()
    }
}

// Circuit-breaker simulation: a six-state machine with timed transitions
// driven by a 10 ms background loop, an overload auto-trip, and a simple
// arc model over the contact travel.

use crate::iec_61850_9_2::common::ConfigError;

use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Simulation loop tick.
const SIMULATION_STEP: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakerState {
    Open,
    Closed,
    Opening,
    Closing,
    LockedOpen,
    LockedClosed,
}

impl BreakerState {
    pub fn as_str(self) -> &'static str {
        match self {
            BreakerState::Open => "OPEN",
            BreakerState::Closed => "CLOSED",
            BreakerState::Opening => "OPENING",
            BreakerState::Closing => "CLOSING",
            BreakerState::LockedOpen => "LOCKED_OPEN",
            BreakerState::LockedClosed => "LOCKED_CLOSED",
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            BreakerState::Open => 0,
            BreakerState::Closed => 1,
            BreakerState::Opening => 2,
            BreakerState::Closing => 3,
            BreakerState::LockedOpen => 4,
            BreakerState::LockedClosed => 5,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => BreakerState::Closed,
            2 => BreakerState::Opening,
            3 => BreakerState::Closing,
            4 => BreakerState::LockedOpen,
            5 => BreakerState::LockedClosed,
            _ => BreakerState::Open,
        }
    }
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical ratings of the simulated breaker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreakerDefinition {
    pub open_time_sec: f64,
    pub close_time_sec: f64,
    pub resistance_ohm: f64,
    pub max_current_a: f64,
    pub voltage_rating_v: f64,
    pub power_rating_w: f64,
    pub arc_duration_sec: f64,
    pub arc_voltage_v: f64,
    pub arc_resistance_ohm: f64,
    pub contact_gap_mm: f64,
    pub dielectric_strength_kv_per_mm: f64,
}

impl Default for BreakerDefinition {
    fn default() -> Self {
        BreakerDefinition {
            open_time_sec: 0.050,
            close_time_sec: 0.100,
            resistance_ohm: 0.001,
            max_current_a: 1000.0,
            voltage_rating_v: 400.0,
            power_rating_w: 400_000.0,
            arc_duration_sec: 0.020,
            arc_voltage_v: 20.0,
            arc_resistance_ohm: 0.5,
            contact_gap_mm: 10.0,
            dielectric_strength_kv_per_mm: 3.0,
        }
    }
}

impl BreakerDefinition {
    pub fn is_valid(&self) -> bool {
        self.open_time_sec > 0.0
            && self.close_time_sec > 0.0
            && self.resistance_ohm >= 0.0
            && self.max_current_a > 0.0
            && self.voltage_rating_v > 0.0
            && self.power_rating_w > 0.0
            && self.arc_duration_sec > 0.0
            && self.arc_voltage_v >= 0.0
            && self.arc_resistance_ohm >= 0.0
            && self.contact_gap_mm > 0.0
            && self.dielectric_strength_kv_per_mm > 0.0
    }
}

/// Record of one scripted fault scenario.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationResult {
    pub time_points: Vec<f64>,
    pub current_values: Vec<f64>,
    pub state_history: Vec<BreakerState>,
    pub trip_occurred: bool,
    pub trip_time: f64,
}

pub type BreakerCallback = Arc<dyn Fn(BreakerState, BreakerState) + Send + Sync>;

#[derive(Debug, Clone, Copy)]
struct TransitionPlan {
    started: Option<Instant>,
    duration_sec: f64,
    target: BreakerState,
}

struct BreakerShared {
    state: AtomicU8,
    locked: AtomicBool,
    current_bits: AtomicU64,
    running: AtomicBool,
    transition: Mutex<TransitionPlan>,
    definition: Mutex<BreakerDefinition>,
    callback: Mutex<Option<BreakerCallback>>,
}

impl BreakerShared {
    fn state(&self) -> BreakerState {
        BreakerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn current(&self) -> f64 {
        f64::from_bits(self.current_bits.load(Ordering::SeqCst))
    }

    fn store_current(&self, current: f64) {
        self.current_bits.store(current.to_bits(), Ordering::SeqCst);
    }

    /// Swaps the state and fires the registered callback on an actual
    /// change. The callback slot lock is released before the call so the
    /// callback may command the breaker again.
    fn transition_to(&self, new_state: BreakerState) {
        let old_state = BreakerState::from_u8(
            self.state.swap(new_state.to_u8(), Ordering::SeqCst),
        );
        if old_state == new_state {
            return;
        }
        let callback = self.callback.lock().unwrap().clone();
        if let Some(callback) = callback {
            callback(old_state, new_state);
        }
    }

    fn trip(&self) {
        self.locked.store(false, Ordering::SeqCst);
        self.transition.lock().unwrap().started = None;
        self.transition_to(BreakerState::Open);
        self.store_current(0.0);
    }

    /// One 10 ms simulation tick: complete due transitions and decay the
    /// arc current while the contacts are parting.
    fn update_state(&self) {
        let state = self.state();

        if state == BreakerState::Opening || state == BreakerState::Closing {
            let due = {
                let plan = self.transition.lock().unwrap();
                match plan.started {
                    Some(started) => {
                        started.elapsed().as_secs_f64() >= plan.duration_sec
                    }
                    None => false,
                }
            };
            if due {
                let target = {
                    let mut plan = self.transition.lock().unwrap();
                    plan.started = None;
                    plan.target
                };
                self.transition_to(target);
                if target == BreakerState::Open {
                    self.store_current(0.0);
                }
            }
        }

        if state == BreakerState::Opening {
            let current = self.current();
            if current > 0.0 {
                let arc_duration = self.definition.lock().unwrap().arc_duration_sec;
                let decay = current / arc_duration * SIMULATION_STEP.as_secs_f64();
                self.store_current((current - decay).max(0.0));
            }
        }
    }
}

/// The breaker handle. The simulation thread runs from construction until
/// drop; all commands are safe from any thread, including state-change
/// callbacks.
pub struct Breaker {
    shared: Arc<BreakerShared>,
    simulation_thread: Option<thread::JoinHandle<()>>,
}

impl Breaker {
    /// Creates a breaker with the default ratings.
    pub fn create() -> Self {
        Self::with_definition(BreakerDefinition::default())
    }

    /// Creates a breaker with custom ratings; invalid ratings are rejected.
    pub fn create_with(definition: BreakerDefinition) -> Result<Self, ConfigError> {
        if !definition.is_valid() {
            return Err(ConfigError::InvalidDefinition("breaker ratings"));
        }
        Ok(Self::with_definition(definition))
    }

    fn with_definition(definition: BreakerDefinition) -> Self {
        let shared = Arc::new(BreakerShared {
            state: AtomicU8::new(BreakerState::Open.to_u8()),
            locked: AtomicBool::new(false),
            current_bits: AtomicU64::new(0f64.to_bits()),
            running: AtomicBool::new(true),
            transition: Mutex::new(TransitionPlan {
                started: None,
                duration_sec: 0.0,
                target: BreakerState::Open,
            }),
            definition: Mutex::new(definition),
            callback: Mutex::new(None),
        });

        let worker = Arc::clone(&shared);
        let simulation_thread = thread::spawn(move || {
            while worker.running.load(Ordering::SeqCst) {
                worker.update_state();
                thread::sleep(SIMULATION_STEP);
            }
        });

        Breaker {
            shared,
            simulation_thread: Some(simulation_thread),
        }
    }

    pub fn state(&self) -> BreakerState {
        self.shared.state()
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state(), BreakerState::Open | BreakerState::LockedOpen)
    }

    pub fn is_closed(&self) -> bool {
        matches!(
            self.state(),
            BreakerState::Closed | BreakerState::LockedClosed
        )
    }

    pub fn is_opening(&self) -> bool {
        self.state() == BreakerState::Opening
    }

    pub fn is_closing(&self) -> bool {
        self.state() == BreakerState::Closing
    }

    pub fn is_in_transition(&self) -> bool {
        matches!(self.state(), BreakerState::Opening | BreakerState::Closing)
    }

    pub fn is_locked(&self) -> bool {
        self.shared.locked.load(Ordering::SeqCst)
    }

    /// Commands the contacts open. Rejected while locked, already open, or
    /// already opening.
    pub fn open(&self) -> bool {
        if self.is_locked() {
            return false;
        }
        let state = self.state();
        if state == BreakerState::Open || state == BreakerState::Opening {
            return false;
        }

        let duration = self.definition().open_time_sec;
        {
            let mut plan = self.shared.transition.lock().unwrap();
            plan.started = Some(Instant::now());
            plan.duration_sec = duration;
            plan.target = BreakerState::Open;
        }
        self.shared.transition_to(BreakerState::Opening);
        true
    }

    /// Commands the contacts closed. Rejected while locked, already
    /// closed, or already closing.
    pub fn close(&self) -> bool {
        if self.is_locked() {
            return false;
        }
        let state = self.state();
        if state == BreakerState::Closed || state == BreakerState::Closing {
            return false;
        }

        let duration = self.definition().close_time_sec;
        {
            let mut plan = self.shared.transition.lock().unwrap();
            plan.started = Some(Instant::now());
            plan.duration_sec = duration;
            plan.target = BreakerState::Closed;
        }
        self.shared.transition_to(BreakerState::Closing);
        true
    }

    /// Locks the breaker in its present terminal position.
    pub fn lock(&self) {
        self.shared.locked.store(true, Ordering::SeqCst);
        match self.state() {
            BreakerState::Open => self.shared.transition_to(BreakerState::LockedOpen),
            BreakerState::Closed => self.shared.transition_to(BreakerState::LockedClosed),
            _ => {}
        }
    }

    pub fn unlock(&self) {
        self.shared.locked.store(false, Ordering::SeqCst);
        match self.state() {
            BreakerState::LockedOpen => self.shared.transition_to(BreakerState::Open),
            BreakerState::LockedClosed => self.shared.transition_to(BreakerState::Closed),
            _ => {}
        }
    }

    /// Protection trip: clears the lock, forces the contacts open and
    /// zeroes the current, from any state.
    pub fn trip(&self) {
        self.shared.trip();
    }

    pub fn definition(&self) -> BreakerDefinition {
        *self.shared.definition.lock().unwrap()
    }

    pub fn set_definition(&self, definition: BreakerDefinition) -> Result<(), ConfigError> {
        if !definition.is_valid() {
            return Err(ConfigError::InvalidDefinition("breaker ratings"));
        }
        *self.shared.definition.lock().unwrap() = definition;
        Ok(())
    }

    pub fn current(&self) -> f64 {
        self.shared.current()
    }

    /// Updates the through current. Exceeding the maximum rating trips the
    /// breaker immediately.
    pub fn set_current(&self, current: f64) {
        self.shared.store_current(current);
        if current.abs() > self.definition().max_current_a {
            self.trip();
        }
    }

    pub fn is_overloaded(&self) -> bool {
        self.current().abs() > self.definition().max_current_a
    }

    /// Contact resistance. Closed contacts show the rated resistance, open
    /// contacts an open circuit. During travel the value interpolates
    /// linearly between the contact resistance and the arc resistance:
    /// toward the arc while opening, away from it while closing.
    pub fn resistance(&self) -> f64 {
        let state = self.state();
        let definition = self.definition();
        match state {
            BreakerState::Closed | BreakerState::LockedClosed => definition.resistance_ohm,
            BreakerState::Open | BreakerState::LockedOpen => f64::INFINITY,
            BreakerState::Opening | BreakerState::Closing => {
                let progress = self.transition_progress();
                let base = definition.resistance_ohm;
                let arc = definition.arc_resistance_ohm;
                if state == BreakerState::Opening {
                    base + (arc - base) * progress
                } else {
                    arc + (base - arc) * progress
                }
            }
        }
    }

    /// Arc voltage across the parting contacts. Zero outside a transition
    /// or below 1 A of through current; within the arcing window it grows
    /// with the contact gap and with the current relative to the rating.
    pub fn arc_voltage(&self) -> f64 {
        if !self.is_in_transition() {
            return 0.0;
        }
        let current = self.current();
        if current.abs() <= 1.0 {
            return 0.0;
        }

        let definition = self.definition();
        let elapsed = {
            let plan = self.shared.transition.lock().unwrap();
            match plan.started {
                Some(started) => started.elapsed().as_secs_f64(),
                None => return 0.0,
            }
        };
        if elapsed > definition.arc_duration_sec {
            return 0.0;
        }

        let arc_progress = elapsed / definition.arc_duration_sec;
        definition.arc_voltage_v
            * (1.0 + arc_progress * definition.contact_gap_mm / 10.0)
            * (current.abs() / definition.max_current_a)
    }

    /// Registers the state-change callback, invoked on every transition
    /// that actually changes the state. Safe to install mid-run; the
    /// callback may call back into the breaker.
    pub fn on_state_change<F>(&self, callback: F)
    where
        F: Fn(BreakerState, BreakerState) + Send + Sync + 'static,
    {
        *self.shared.callback.lock().unwrap() = Some(Arc::new(callback));
    }

    /// Runs a scripted fault scenario: closes the breaker, drives the
    /// nominal current, injects the fault current at `fault_time_s`, and
    /// records the trajectory until `duration_s` elapses.
    pub fn run_simulation(
        &self,
        voltage_v: f64,
        nominal_current_a: f64,
        fault_current_a: f64,
        fault_time_s: f64,
        duration_s: f64,
        time_step_s: f64,
    ) -> Result<SimulationResult, ConfigError> {
        if voltage_v <= 0.0 || nominal_current_a < 0.0 || duration_s <= 0.0 || time_step_s <= 0.0 {
            return Err(ConfigError::InvalidSettings("simulation parameters"));
        }

        let mut result = SimulationResult::default();

        self.close();
        thread::sleep(Duration::from_secs_f64(
            self.definition().close_time_sec + 0.05,
        ));

        let mut elapsed = 0.0;
        let mut fault_injected = false;

        while elapsed < duration_s {
            let mut current = nominal_current_a;
            if elapsed >= fault_time_s {
                if !fault_injected {
                    fault_injected = true;
                    info!(
                        "Fault injected at t={:.3}s, current={:.1}A",
                        elapsed, fault_current_a
                    );
                }
                current = fault_current_a;
            }

            if self.is_closed() {
                self.set_current(current);
            } else {
                self.set_current(0.0);
            }

            result.time_points.push(elapsed);
            result.current_values.push(self.current());
            result.state_history.push(self.state());

            if !result.trip_occurred && self.is_open() && elapsed > 0.0 {
                result.trip_occurred = true;
                result.trip_time = elapsed;
                info!("Breaker tripped at t={:.3}s", elapsed);
            }

            thread::sleep(Duration::from_secs_f64(time_step_s));
            elapsed += time_step_s;
        }

        if result.trip_occurred {
            info!("Simulation completed: breaker tripped at t={:.3}s", result.trip_time);
        } else {
            info!("Simulation completed: breaker did not trip");
        }

        Ok(result)
    }

    fn transition_progress(&self) -> f64 {
        let plan = self.shared.transition.lock().unwrap();
        match plan.started {
            Some(started) if plan.duration_sec > 0.0 => {
                (started.elapsed().as_secs_f64() / plan.duration_sec).clamp(0.0, 1.0)
            }
            _ => 1.0,
        }
    }
}

impl Drop for Breaker {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.simulation_thread.take() {
            let _ = handle.join();
        }
    }
}

impl fmt::Debug for Breaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Breaker")
            .field("state", &self.state())
            .field("locked", &self.is_locked())
            .field("current_a", &self.current())
            .finish()
    }
}

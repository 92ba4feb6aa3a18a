// Scripted breaker fault scenario: close, run nominal load, inject the
// fault and print the recorded trajectory.

use log::info;
use std::error::Error;

use sv_core::sim::Breaker;

pub fn run(
    voltage: f64,
    nominal: f64,
    fault: f64,
    fault_time: f64,
    duration: f64,
    time_step: f64,
) -> Result<(), Box<dyn Error>> {
    let breaker = Breaker::create();

    info!(
        "Breaker scenario: {}V, nominal {}A, fault {}A at t={}s, {}s total",
        voltage, nominal, fault, fault_time, duration
    );

    let result = breaker.run_simulation(voltage, nominal, fault, fault_time, duration, time_step)?;

    for ((t, current), state) in result
        .time_points
        .iter()
        .zip(&result.current_values)
        .zip(&result.state_history)
    {
        info!("t={:6.3}s  I={:8.1}A  {}", t, current, state);
    }

    if result.trip_occurred {
        println!("Breaker tripped at t={:.3}s", result.trip_time);
    } else {
        println!("Breaker did not trip");
    }
    Ok(())
}

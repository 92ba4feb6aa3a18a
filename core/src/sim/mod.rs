//! Substation equipment simulation models.

mod breaker;

pub use breaker::{
    Breaker, BreakerCallback, BreakerDefinition, BreakerState, SimulationResult,
};

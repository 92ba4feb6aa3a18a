//! Protection relays fed from the subscriber callback.

mod differential;
mod distance;
mod phasor;

pub use differential::{
    DifferentialProtection, DifferentialProtectionResult, DifferentialProtectionSettings,
    DifferentialTripCallback,
};
pub use distance::{
    DistanceProtection, DistanceProtectionResult, DistanceProtectionSettings, DistanceTripCallback,
    DistanceZone,
};
pub use phasor::Phasor;

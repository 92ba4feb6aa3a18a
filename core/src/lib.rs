//! IEC 61850-9-2 sampled values over raw Ethernet, with the substation
//! models that consume them: a circuit-breaker simulation and distance /
//! differential protection relays.

pub mod iec_61850_9_2;
pub mod model;
pub mod network;
pub mod protection;
pub mod sim;

//! Wire types and the frame codec for IEC 61850-9-2 sampled values.

pub mod buffer;
pub mod common;
pub mod frames;
pub mod mac;
pub mod ptp;

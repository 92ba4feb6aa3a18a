//! The IED model tree, control blocks, and the publisher/subscriber pair.

mod client;
mod control_block;
mod ied;
mod server;

pub use client::IedClient;
pub use control_block::{
    PublisherConfig, SampledValueControlBlock, CURRENT_SCALING_DEFAULT, VOLTAGE_SCALING_DEFAULT,
};
pub use ied::{IedModel, LogicalNode};
pub use server::IedServer;

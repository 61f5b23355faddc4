//! Shared building blocks for the lifeline supervisor: configuration,
//! on-disk process/status records, OS process probing and the cooperative
//! shutdown signal used by the host daemon.

pub mod config;
pub mod process;
pub mod shutdown;
pub mod state;

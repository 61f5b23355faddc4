//! Host process for the lifeline supervisor.
//!
//! - `environment`: `.env` loading and config resolution
//! - `logging`: tracing subscriber setup
//! - `host`: startup records, companion supervision and teardown

pub mod environment;
pub mod host;
pub mod logging;

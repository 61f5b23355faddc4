//! Companion-process supervision.
//!
//! A [`Supervisor`] launches a detached companion ("heartbeat") process,
//! polls the OS process table for it from a background task, and when the
//! companion disappears runs the registered shutdown callback with a forced
//! process exit as a bounded fallback.

mod launcher;
mod monitor;
pub mod orchestrator;
pub mod supervisor;
pub mod terminate;

pub use launcher::LaunchError;
pub use orchestrator::{ExitHook, ShutdownCallback, ShutdownOrchestrator};
pub use supervisor::{CleanupFn, CompanionState, CompanionStatus, Supervisor};
pub use terminate::{terminate_child, terminate_process_list, TerminationOutcome, TerminationPolicy};

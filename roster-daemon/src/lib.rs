//! Daemon runtime: bootstrap, then a reconciliation cycle every interval
//! until SIGINT/SIGTERM.

mod error;
pub mod logging;
mod runtime;

pub use error::DaemonError;
pub use logging::{init_tracing, init_tracing_with, LogFormat};
pub use runtime::{
    run, run_scheduler, start_blocking, Cycle, LiveCycle, SchedulerOptions, SchedulerSummary,
};

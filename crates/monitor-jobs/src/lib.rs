//! Priority-driven job engine: a pool of persistent worker processes,
//! each dispatched over a framed IPC pipe, with preemption and
//! per-job timeouts.

pub mod engine;
pub mod priority;
pub mod wire;
pub mod worker;

pub use engine::{JobEngine, JobOutcome, JobSpec, Outcome};
pub use priority::{Priority, QueuedJob};
pub use worker::{WireJobSpec, WireOutcome, WireResult};

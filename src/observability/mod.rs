//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Executor, backends and pipeline produce:
//!     → logging.rs (structured log events, per-run span)
//!     → metrics.rs (call / retry / wait counters)
//!     → usage.rs (daily request count, budget snapshots)
//! ```
//!
//! # Design Decisions
//! - Structured fields (kind, backend, attempt) rather than formatted strings
//! - Every run carries a run id so interleaved logs can be separated
//! - Metrics export is optional and off by default

pub mod logging;
pub mod metrics;
pub mod usage;

//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGINT/SIGTERM → stop the current run → notice about partial output
//! ```

pub mod signals;

pub use signals::{stop_signal, StopSignal};

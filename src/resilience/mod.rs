//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! External call (text-gen / image-gen / pdf-convert):
//!     → rate_budget.rs (block until the API class has a free slot)
//!     → executor.rs (invoke current backend of the chain)
//!     → On throttling: backoff.rs (capped exponential delay), same backend
//!     → On hard failure / retries spent: next backend in chain.rs
//!     → Success, or AllBackendsExhausted (error.rs)
//! ```
//!
//! # Design Decisions
//! - Budgets and policies are values passed in, never globals
//! - All waiting goes through clock.rs so tests run on virtual time
//! - Availability of backends is detected before a chain is built

pub mod backoff;
pub mod chain;
pub mod clock;
pub mod error;
pub mod executor;
pub mod rate_budget;
pub mod retries;

pub use chain::{Backend, FallbackChain};
pub use clock::{Clock, ManualClock, TokioClock};
pub use error::{
    AttemptOutcome, AttemptRecord, CallError, ErrorKind, ExecuteError, OperationKind,
    OperationResult, Success,
};
pub use executor::Executor;
pub use rate_budget::{RateBudget, Reservation};
pub use retries::RetryPolicy;

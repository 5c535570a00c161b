//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → StorybookConfig (validated, immutable)
//!     → Secrets read from the environment
//!     → budgets, policies and chains built once at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Secrets never live in the file, only in the environment

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, ConfigError, Secrets};
pub use schema::{
    ConvertConfig, ConverterKind, ImageConfig, LogFormat, ObservabilityConfig, RateBudgetConfig,
    RateLimitsConfig, RetriesConfig, RetryConfig, StoryConfig, StorybookConfig, TextConfig,
    UsageConfig,
};

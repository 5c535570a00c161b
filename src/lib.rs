//! Illustrated children's storybook generator.
//!
//! # Architecture Overview
//!
//! ```text
//!   topic ──▶ story::pipeline ──────────────────────────────────────▶ StoryReport
//!                  │  outline / chapters      illustrations      conversion
//!                  ▼                          ▼                  ▼
//!          ┌──────────────────────── resilience::Executor ───────────────────────┐
//!          │  rate_budget (per API class) → call → backoff on throttling         │
//!          │  → next backend in the FallbackChain on hard failure                │
//!          └──────────────────────────────────────────────────────────────────────┘
//!                  │                          │                  │
//!                  ▼                          ▼                  ▼
//!          backends::text           backends::image      backends::convert
//!          (Gemini models)          (FLUX inference)     (weasyprint, mdpdf,
//!                                                         wkhtmltopdf, html)
//!
//!   Cross-cutting: config (TOML + env secrets), observability (tracing,
//!   metrics, daily usage), document (markdown → print HTML), lifecycle
//!   (signals)
//! ```

// Core subsystems
pub mod backends;
pub mod config;
pub mod document;
pub mod story;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

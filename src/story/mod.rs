//! Storybook generation.
//!
//! # Data Flow
//! ```text
//! topic.rs      validate the user's topic
//! prompts.rs    outline prompt → text chain
//! outline.rs    parse TITLE / CHAPTER n / CHARACTERS lines
//! prompts.rs    one chapter prompt per chapter → text chain
//! pipeline.rs   scene per chapter → image chain (bounded concurrency)
//! manuscript.rs chapters + illustrations → story.md
//! publish.rs    story.md → conversion chain → PDF, HTML or markdown only
//! ```

pub mod manuscript;
pub mod outline;
pub mod pipeline;
pub mod prompts;
pub mod publish;
pub mod topic;

pub use manuscript::{Chapter, Illustration, Manuscript};
pub use outline::{ChapterPlan, Outline, OutlineError};
pub use pipeline::{Budgets, PipelineError, StoryPipeline, StoryReport};
pub use publish::{publish, DocumentOutcome, PublishOptions};
pub use topic::{validate_topic, TopicError, TOPIC_SUGGESTIONS};

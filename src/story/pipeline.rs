//! End-to-end story generation.
//!
//! # Responsibilities
//! - Drive topic → outline → chapters → illustrations → markdown → document
//! - Route every external call through the executor with its kind's budget
//!   and policy
//! - Degrade instead of failing where a story is still useful: missing
//!   images become placeholders, failed conversion keeps the markdown
//!
//! # Design Decisions
//! - Text failures are fatal, a story without prose is not a story
//! - Illustrations run up to `image.concurrency` at once, sharing one budget
//! - An optional run deadline stops new calls; in-flight ones are dropped

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use crate::backends::image::{illustration_prompt, looks_like_image};
use crate::backends::Chains;
use crate::config::{StoryConfig, StorybookConfig};
use crate::observability::usage::{ApiStatus, UsageTracker};
use crate::resilience::{
    CallError, Clock, Executor, ExecuteError, RateBudget, RetryPolicy, TokioClock,
};
use crate::story::manuscript::{image_file_name, Chapter, Illustration, Manuscript};
use crate::story::outline::{parse_outline, Outline, OutlineError};
use crate::story::prompts::{chapter_prompt, clean_chapter_text, outline_prompt, scene_description};
use crate::story::publish::{publish, DocumentOutcome, PublishOptions};
use crate::story::topic::{validate_topic, TopicError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid topic: {0}")]
    Topic(#[from] TopicError),

    #[error("malformed outline: {0}")]
    Outline(#[from] OutlineError),

    #[error("{stage} failed: {source}")]
    Exhausted {
        stage: &'static str,
        #[source]
        source: ExecuteError,
    },

    #[error("{stage} not started: the run deadline has passed")]
    DeadlineExceeded { stage: &'static str },

    #[error("writing {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct StoryReport {
    pub title: String,
    pub markdown_path: PathBuf,
    pub document: DocumentOutcome,
    pub images_generated: usize,
    pub placeholders: usize,
    pub elapsed: Duration,
}

/// One budget per API class.
#[derive(Debug)]
pub struct Budgets {
    pub text: RateBudget,
    pub image: RateBudget,
    pub convert: RateBudget,
}

impl Budgets {
    pub fn from_config(config: &StorybookConfig) -> Self {
        Self {
            text: RateBudget::from_config("text", &config.rate_limits.text),
            image: RateBudget::from_config("image", &config.rate_limits.image),
            convert: RateBudget::unlimited("convert"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Policies {
    text: RetryPolicy,
    image: RetryPolicy,
    convert: RetryPolicy,
}

/// Generates storybooks through the configured chains.
pub struct StoryPipeline<C: Clock = TokioClock> {
    executor: Executor<C>,
    chains: Chains,
    budgets: Budgets,
    policies: Policies,
    usage: Arc<UsageTracker>,
    story: StoryConfig,
    image_concurrency: usize,
    min_pdf_bytes: u64,
}

impl<C: Clock> StoryPipeline<C> {
    pub fn new(
        executor: Executor<C>,
        chains: Chains,
        config: &StorybookConfig,
        usage: Arc<UsageTracker>,
    ) -> Self {
        Self {
            executor,
            chains,
            budgets: Budgets::from_config(config),
            policies: Policies {
                text: RetryPolicy::from(&config.retries.text),
                image: RetryPolicy::from(&config.retries.image),
                convert: RetryPolicy::from(&config.retries.convert),
            },
            usage,
            story: config.story.clone(),
            image_concurrency: config.image.concurrency.max(1),
            min_pdf_bytes: config.convert.min_pdf_bytes,
        }
    }

    pub fn budgets(&self) -> &Budgets {
        &self.budgets
    }

    pub fn chains(&self) -> &Chains {
        &self.chains
    }

    /// Usage and budget occupancy right now.
    pub fn status(&self) -> ApiStatus {
        ApiStatus::capture(&self.usage, &[&self.budgets.text, &self.budgets.image])
    }

    /// Generate a complete storybook about `topic`.
    pub async fn run(&self, topic: &str) -> Result<StoryReport, PipelineError> {
        let span = tracing::info_span!("story", run_id = %Uuid::new_v4());
        self.run_stages(topic).instrument(span).await
    }

    async fn run_stages(&self, topic: &str) -> Result<StoryReport, PipelineError> {
        let started = self.executor.clock().now();
        let deadline = self
            .story
            .max_duration_secs
            .and_then(|secs| started.checked_add(Duration::from_secs(secs)));

        let topic = validate_topic(topic)?;
        tracing::info!(
            topic = %topic,
            chapters = self.story.chapters,
            text_backends = ?self.chains.text.ids(),
            converters = ?self.chains.convert.ids(),
            "Generating storybook"
        );

        let outline = self.outline(&topic, deadline).await?;
        tracing::info!(title = %outline.title, "Outline ready");

        let texts = self.write_chapters(&topic, &outline, deadline).await?;

        let output_dir = self.story.output_dir.clone();
        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|source| PipelineError::Io {
                path: output_dir.clone(),
                source,
            })?;

        let scenes: Vec<String> = texts
            .iter()
            .map(|text| scene_description(text, &outline.characters))
            .collect();
        let illustrations = self.illustrate(&scenes, &output_dir, deadline).await;

        let manuscript = Manuscript {
            title: outline.title.clone(),
            chapters: outline
                .chapters
                .iter()
                .zip(texts)
                .zip(illustrations)
                .map(|((plan, text), illustration)| Chapter {
                    number: plan.number,
                    title: plan.title.clone(),
                    text,
                    illustration,
                })
                .collect(),
        };

        let markdown_path = output_dir.join(&self.story.markdown_file);
        let markdown = manuscript.to_markdown();
        tokio::fs::write(&markdown_path, &markdown)
            .await
            .map_err(|source| PipelineError::Io {
                path: markdown_path.clone(),
                source,
            })?;
        tracing::info!(path = %markdown_path.display(), "Markdown written");

        let document = self.convert(&markdown_path, &markdown, deadline).await;

        let report = StoryReport {
            title: manuscript.title.clone(),
            markdown_path,
            document,
            images_generated: manuscript.images(),
            placeholders: manuscript.placeholders(),
            elapsed: self.executor.clock().now().saturating_duration_since(started),
        };
        tracing::info!(
            title = %report.title,
            images = report.images_generated,
            placeholders = report.placeholders,
            elapsed = ?report.elapsed,
            "Storybook complete"
        );
        Ok(report)
    }

    async fn outline(&self, topic: &str, deadline: Option<Instant>) -> Result<Outline, PipelineError> {
        let prompt = outline_prompt(topic, self.story.chapters, &self.story.audience);
        let response = self.generate_text("outline", prompt, deadline).await?;
        Ok(parse_outline(&response, self.story.chapters)?)
    }

    async fn write_chapters(
        &self,
        topic: &str,
        outline: &Outline,
        deadline: Option<Instant>,
    ) -> Result<Vec<String>, PipelineError> {
        let mut texts = Vec::with_capacity(outline.chapters.len());
        for chapter in &outline.chapters {
            let prompt = chapter_prompt(
                outline,
                chapter,
                topic,
                self.story.words_per_chapter,
                &self.story.audience,
            );
            let raw = self.generate_text("chapter", prompt, deadline).await?;
            let cleaned = clean_chapter_text(&raw, chapter);
            let text = if cleaned.is_empty() {
                raw.trim().to_string()
            } else {
                cleaned
            };
            tracing::info!(
                chapter = chapter.number,
                words = text.split_whitespace().count(),
                "Chapter written"
            );
            texts.push(text);
        }
        Ok(texts)
    }

    async fn illustrate(
        &self,
        scenes: &[String],
        output_dir: &Path,
        deadline: Option<Instant>,
    ) -> Vec<Illustration> {
        stream::iter(scenes.iter().enumerate())
            .map(|(idx, scene)| self.illustrate_one(idx + 1, scene, output_dir, deadline))
            .buffered(self.image_concurrency)
            .collect()
            .await
    }

    async fn illustrate_one(
        &self,
        chapter: usize,
        scene: &str,
        output_dir: &Path,
        deadline: Option<Instant>,
    ) -> Illustration {
        let prompt = illustration_prompt(scene);
        let usage = &self.usage;
        let call = self.executor.execute(
            &self.chains.image,
            &self.policies.image,
            &self.budgets.image,
            |backend| {
                let backend = Arc::clone(backend);
                let prompt = prompt.clone();
                let usage = Arc::clone(usage);
                async move {
                    usage.track_request();
                    let bytes = backend.generate(&prompt).await?;
                    if !looks_like_image(&bytes) {
                        return Err(CallError::backend("response is not an image"));
                    }
                    Ok(bytes)
                }
            },
        );

        let bytes = match self.before_deadline(deadline, call).await {
            Some(Ok(success)) => success.into_value(),
            Some(Err(err)) => {
                tracing::warn!(chapter, error = %err, "Illustration failed, using placeholder");
                return Illustration::placeholder(scene);
            }
            None => {
                tracing::warn!(chapter, "Run deadline passed, using placeholder");
                return Illustration::placeholder(scene);
            }
        };

        let file_name = image_file_name(chapter, scene);
        let path = output_dir.join(&file_name);
        match tokio::fs::write(&path, &bytes).await {
            Ok(()) => {
                tracing::info!(chapter, path = %path.display(), bytes = bytes.len(), "Illustration saved");
                Illustration::Image(file_name)
            }
            Err(err) => {
                tracing::warn!(chapter, path = %path.display(), error = %err, "Could not save illustration, using placeholder");
                Illustration::placeholder(scene)
            }
        }
    }

    async fn convert(
        &self,
        markdown_path: &Path,
        markdown: &str,
        deadline: Option<Instant>,
    ) -> DocumentOutcome {
        let options = PublishOptions {
            policy: &self.policies.convert,
            budget: &self.budgets.convert,
            min_pdf_bytes: self.min_pdf_bytes,
        };
        let conversion = publish(&self.executor, &self.chains.convert, options, markdown_path, markdown);
        match self.before_deadline(deadline, conversion).await {
            Some(outcome) => outcome,
            None => {
                tracing::warn!("Run deadline passed, skipping conversion");
                DocumentOutcome::MarkdownOnly
            }
        }
    }

    async fn generate_text(
        &self,
        stage: &'static str,
        prompt: String,
        deadline: Option<Instant>,
    ) -> Result<String, PipelineError> {
        let usage = &self.usage;
        let call = self.executor.execute(
            &self.chains.text,
            &self.policies.text,
            &self.budgets.text,
            |backend| {
                let backend = Arc::clone(backend);
                let prompt = prompt.clone();
                let usage = Arc::clone(usage);
                async move {
                    usage.track_request();
                    backend.generate(&prompt).await
                }
            },
        );

        match self.before_deadline(deadline, call).await {
            Some(Ok(success)) => {
                tracing::debug!(stage, backend = %success.backend, attempts = success.attempts.len(), "Text generated");
                Ok(success.into_value())
            }
            Some(Err(source)) => Err(PipelineError::Exhausted { stage, source }),
            None => Err(PipelineError::DeadlineExceeded { stage }),
        }
    }

    /// Run `fut` unless the deadline has passed; drop it if the deadline
    /// arrives first.
    async fn before_deadline<F: Future>(&self, deadline: Option<Instant>, fut: F) -> Option<F::Output> {
        let Some(deadline) = deadline else {
            return Some(fut.await);
        };
        let clock = self.executor.clock();
        if clock.now() >= deadline {
            return None;
        }
        tokio::select! {
            biased;
            out = fut => Some(out),
            _ = clock.sleep_until(deadline) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{image_chain, text_chain};
    use crate::config::Secrets;
    use crate::resilience::{FallbackChain, ManualClock, OperationKind};

    fn pipeline(config: &StorybookConfig) -> StoryPipeline {
        pipeline_on(config, Executor::tokio())
    }

    fn pipeline_on<C: Clock>(config: &StorybookConfig, executor: Executor<C>) -> StoryPipeline<C> {
        let secrets = Secrets {
            text_api_key: "k".into(),
            image_api_key: "k".into(),
        };
        let client = reqwest::Client::new();
        let chains = Chains {
            text: text_chain(&client, &config.text, &secrets),
            image: image_chain(&client, &config.image, &secrets),
            convert: FallbackChain::empty(OperationKind::DocumentConversion),
        };
        StoryPipeline::new(executor, chains, config, Arc::new(UsageTracker::new(1200)))
    }

    #[tokio::test]
    async fn test_invalid_topic_makes_no_calls() {
        let config = StorybookConfig::default();
        let pipeline = pipeline(&config);

        let err = pipeline.run("   ").await.unwrap_err();
        assert!(matches!(err, PipelineError::Topic(TopicError::Empty)));
        assert_eq!(pipeline.status().requests_today, 0);
    }

    #[tokio::test]
    async fn test_elapsed_deadline_stops_text_stage() {
        let mut config = StorybookConfig::default();
        config.story.max_duration_secs = Some(0);
        let pipeline = pipeline(&config);

        let err = pipeline.run("space dogs").await.unwrap_err();
        assert!(matches!(err, PipelineError::DeadlineExceeded { stage: "outline" }));
        assert_eq!(pipeline.status().requests_today, 0);
    }

    #[tokio::test]
    async fn test_unrepresentable_deadline_means_no_deadline() {
        let mut config = StorybookConfig::default();
        config.story.max_duration_secs = Some(u64::MAX);
        let pipeline = pipeline(&config);

        let err = pipeline.run("").await.unwrap_err();
        assert!(matches!(err, PipelineError::Topic(TopicError::Empty)));
    }

    #[tokio::test]
    async fn test_deadline_waits_for_virtual_time() {
        let clock = ManualClock::new();
        let pipeline = pipeline_on(&StorybookConfig::default(), Executor::new(clock.clone()));
        let deadline = clock.now() + Duration::from_secs(30);

        let finished = pipeline.before_deadline(Some(deadline), async { 7 }).await;
        assert_eq!(finished, Some(7));

        let mut stalled = Box::pin(pipeline.before_deadline(Some(deadline), std::future::pending::<()>()));
        assert!(futures_util::poll!(&mut stalled).is_pending());
        clock.advance(Duration::from_secs(29));
        assert!(futures_util::poll!(&mut stalled).is_pending());
        clock.advance(Duration::from_secs(1));
        assert_eq!(stalled.await, None);

        let late = pipeline.before_deadline(Some(deadline), async { 7 }).await;
        assert_eq!(late, None);
    }

    #[test]
    fn test_budgets_follow_config() {
        let config = StorybookConfig::default();
        let budgets = Budgets::from_config(&config);
        assert_eq!(budgets.text.max_operations(), 15);
        assert_eq!(budgets.image.max_operations(), 5);
        assert!(budgets.convert.is_unlimited());
    }
}

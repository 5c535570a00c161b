//! End-to-end story generation against mock APIs.

use std::sync::Arc;

use storybook::backends::Chains;
use storybook::config::StorybookConfig;
use storybook::observability::usage::UsageTracker;
use storybook::resilience::{Clock, ErrorKind, Executor, ManualClock};
use storybook::story::{DocumentOutcome, PipelineError, StoryPipeline};

mod common;
use common::{
    gemini_text, outline_text, png_bytes, start_programmable_backend, test_config, test_secrets,
    MockResponse, MockServer,
};

/// Chapter number from a "Write chapter N," instruction in a request body.
fn requested_chapter(body: &str) -> Option<usize> {
    let rest = body.split("Write chapter ").nth(1)?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

async fn story_text_api() -> MockServer {
    start_programmable_backend(|req| async move {
        if req.body.contains("Plan a storybook") {
            return gemini_text(&outline_text(3));
        }
        match requested_chapter(&req.body) {
            Some(n) => gemini_text(&format!(
                "Pip the fox tiptoed through silver garden number {n}.\n\n\"Hello, moon!\" said Pip."
            )),
            None => MockResponse::json(400, r#"{"error":{"message":"unexpected prompt"}}"#),
        }
    })
    .await
}

async fn pipeline_for(
    text: &MockServer,
    image: &MockServer,
    dir: &std::path::Path,
) -> (StoryPipeline, StorybookConfig) {
    let config = test_config(&text.url(), &image.url(), dir);
    let pipeline = pipeline_with(&config, Executor::tokio()).await;
    (pipeline, config)
}

async fn pipeline_with<C: Clock>(config: &StorybookConfig, executor: Executor<C>) -> StoryPipeline<C> {
    let chains = Chains::from_config(config, &test_secrets()).await.unwrap();
    let usage = Arc::new(UsageTracker::new(config.usage.daily_warning_threshold));
    StoryPipeline::new(executor, chains, config, usage)
}

#[tokio::test]
async fn test_full_story_with_one_missing_illustration() {
    let dir = tempfile::tempdir().unwrap();
    let text = story_text_api().await;
    let image = start_programmable_backend(|req| async move {
        if req.body.contains("garden number 2") {
            MockResponse::json(503, r#"{"error":"Model is currently loading"}"#)
        } else {
            MockResponse::bytes(200, png_bytes())
        }
    })
    .await;
    let (pipeline, config) = pipeline_for(&text, &image, dir.path()).await;

    let report = pipeline.run("a fox who visits the moon").await.unwrap();

    assert_eq!(report.title, "Pip and the Moon Garden");
    assert_eq!(report.images_generated, 2);
    assert_eq!(report.placeholders, 1);
    assert_eq!(report.markdown_path, dir.path().join(&config.story.markdown_file));
    assert_eq!(
        report.document,
        DocumentOutcome::Html(report.markdown_path.with_extension("html"))
    );

    let markdown = std::fs::read_to_string(&report.markdown_path).unwrap();
    assert!(markdown.starts_with("# Pip and the Moon Garden"));
    assert!(markdown.contains("## Chapter 3: Adventure number 3"));
    assert!(markdown.contains("](PLACEHOLDER:"));
    // every chapter opens with the same words; each keeps its own image
    assert!(markdown.contains("](chapter_1_pip_the_fox_tiptoed_through.png)"));
    assert!(markdown.contains("](chapter_3_pip_the_fox_tiptoed_through.png)"));
    assert!(dir.path().join("chapter_1_pip_the_fox_tiptoed_through.png").exists());
    assert!(dir.path().join("chapter_3_pip_the_fox_tiptoed_through.png").exists());
    assert!(!dir.path().join("chapter_2_pip_the_fox_tiptoed_through.png").exists());

    let html = std::fs::read_to_string(report.document.path().unwrap()).unwrap();
    assert!(html.contains("window.print()"));
    assert!(html.contains("image-placeholder"));

    // outline + 3 chapters; 3 images, one retried once
    assert_eq!(text.hits(), 4);
    assert_eq!(image.hits(), 4);
    assert_eq!(pipeline.status().requests_today, 8);
}

#[tokio::test]
async fn test_throttled_text_exhausts_every_model() {
    let dir = tempfile::tempdir().unwrap();
    let text = start_programmable_backend(|_| async move {
        MockResponse::json(429, r#"{"error":{"status":"RESOURCE_EXHAUSTED"}}"#)
    })
    .await;
    let image = start_programmable_backend(|_| async move { MockResponse::bytes(200, png_bytes()) }).await;
    let (pipeline, _) = pipeline_for(&text, &image, dir.path()).await;

    let err = pipeline.run("dragons learning to share").await.unwrap_err();
    match err {
        PipelineError::Exhausted { stage, source } => {
            assert_eq!(stage, "outline");
            assert_eq!(source.kind(), ErrorKind::AllBackendsExhausted);
            let backends: Vec<_> = source.attempts().iter().map(|a| a.backend.as_str()).collect();
            assert_eq!(backends, ["primary", "primary", "fallback", "fallback"]);
        }
        other => panic!("expected exhausted text chain, got {other:?}"),
    }
    // two models, two attempts each
    assert_eq!(text.hits(), 4);
    assert_eq!(image.hits(), 0);
    assert!(!dir.path().join("story.md").exists());
}

#[tokio::test]
async fn test_malformed_outline_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let text = start_programmable_backend(|_| async move {
        gemini_text("Here is a lovely idea for a story about kittens!")
    })
    .await;
    let image = start_programmable_backend(|_| async move { MockResponse::bytes(200, png_bytes()) }).await;
    let (pipeline, _) = pipeline_for(&text, &image, dir.path()).await;

    let err = pipeline.run("kittens").await.unwrap_err();
    assert!(matches!(err, PipelineError::Outline(_)));
    assert_eq!(text.hits(), 1);
}

#[tokio::test]
async fn test_non_image_response_becomes_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let text = story_text_api().await;
    let image = start_programmable_backend(|_| async move {
        MockResponse::json(200, r#"{"error":"not really an image"}"#)
    })
    .await;
    let (pipeline, _) = pipeline_for(&text, &image, dir.path()).await;

    let report = pipeline.run("a fox who visits the moon").await.unwrap();
    assert_eq!(report.images_generated, 0);
    assert_eq!(report.placeholders, 3);
    // hard errors are not retried
    assert_eq!(image.hits(), 3);
}

#[tokio::test]
async fn test_deadline_after_text_skips_images_and_conversion() {
    let dir = tempfile::tempdir().unwrap();
    let text = story_text_api().await;
    let image = start_programmable_backend(|_| async move {
        MockResponse::json(503, r#"{"error":"Model is currently loading"}"#)
    })
    .await;

    let mut config = test_config(&text.url(), &image.url(), dir.path());
    config.story.max_duration_secs = Some(60);
    config.retries.image.max_attempts = 3;
    config.retries.image.base_delay_ms = 120_000;
    config.retries.image.max_delay_ms = 120_000;
    let clock = ManualClock::new();
    let pipeline = pipeline_with(&config, Executor::new(clock.clone())).await;

    let report = pipeline.run("a fox who visits the moon").await.unwrap();

    // text finished in no virtual time; the first image backoff crossed the deadline
    assert_eq!(text.hits(), 4);
    assert_eq!(clock.sleeps()[0], std::time::Duration::from_secs(120));
    assert_eq!(report.images_generated, 0);
    assert_eq!(report.placeholders, 3);
    assert_eq!(report.document, DocumentOutcome::MarkdownOnly);
    assert!(report.markdown_path.exists());
    assert!(!report.markdown_path.with_extension("html").exists());
    assert!(image.hits() <= 2);
}

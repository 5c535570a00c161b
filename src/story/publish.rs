//! Turning the markdown manuscript into a shareable document.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::backends::{ConversionJob, DocumentFormat, SharedConverter};
use crate::resilience::{CallError, Clock, Executor, FallbackChain, RateBudget, RetryPolicy};

/// The best output a run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "format", content = "path", rename_all = "snake_case")]
pub enum DocumentOutcome {
    Pdf(PathBuf),
    Html(PathBuf),
    /// Every converter failed or none ran; only the markdown exists.
    MarkdownOnly,
}

impl DocumentOutcome {
    pub fn path(&self) -> Option<&Path> {
        match self {
            DocumentOutcome::Pdf(p) | DocumentOutcome::Html(p) => Some(p),
            DocumentOutcome::MarkdownOnly => None,
        }
    }
}

/// Conversion settings for one publish call.
#[derive(Debug, Clone, Copy)]
pub struct PublishOptions<'a> {
    pub policy: &'a RetryPolicy,
    pub budget: &'a RateBudget,
    /// PDFs smaller than this count as failed conversions.
    pub min_pdf_bytes: u64,
}

/// Run the conversion chain over `markdown`, stored at `markdown_path`.
///
/// Never fails: an exhausted chain leaves the markdown as the result.
pub async fn publish<C: Clock>(
    executor: &Executor<C>,
    chain: &FallbackChain<SharedConverter>,
    options: PublishOptions<'_>,
    markdown_path: &Path,
    markdown: &str,
) -> DocumentOutcome {
    let job = Arc::new(ConversionJob::new(markdown_path, markdown));
    let min_pdf_bytes = options.min_pdf_bytes;

    let result = executor
        .execute(chain, options.policy, options.budget, |converter| {
            let converter = Arc::clone(converter);
            let job = Arc::clone(&job);
            async move {
                let path = converter.convert(&job).await?;
                let format = converter.format();
                if format == DocumentFormat::Pdf {
                    check_pdf_size(&path, min_pdf_bytes).await?;
                }
                Ok((format, path))
            }
        })
        .await;

    match result {
        Ok(success) => {
            let backend = success.backend.clone();
            let (format, path) = success.into_value();
            tracing::info!(converter = %backend, path = %path.display(), "Document written");
            match format {
                DocumentFormat::Pdf => DocumentOutcome::Pdf(path),
                DocumentFormat::Html => DocumentOutcome::Html(path),
            }
        }
        Err(err) => {
            tracing::warn!(
                markdown = %markdown_path.display(),
                error = %err,
                "No converter succeeded, keeping markdown only"
            );
            DocumentOutcome::MarkdownOnly
        }
    }
}

async fn check_pdf_size(path: &Path, min_bytes: u64) -> Result<(), CallError> {
    let size = tokio::fs::metadata(path).await.map(|m| m.len()).unwrap_or(0);
    if size < min_bytes {
        return Err(CallError::backend(format!(
            "{} is only {size} bytes (minimum {min_bytes})",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::convert::{CommandConverter, HtmlExport};
    use crate::config::ConverterKind;
    use crate::resilience::{ManualClock, OperationKind};

    const STORY: &str = "# Moon\n\n## Chapter 1: Up\n\n![Chapter 1 Image](PLACEHOLDER: a moon)\n\nHigh.\n";

    #[tokio::test]
    async fn test_falls_back_to_html() {
        let dir = tempfile::tempdir().unwrap();
        let md = dir.path().join("story.md");
        let missing: SharedConverter = Arc::new(CommandConverter::with_program(
            ConverterKind::Weasyprint,
            "storybook-missing",
        ));
        let html: SharedConverter = Arc::new(HtmlExport);
        let chain = FallbackChain::new(OperationKind::DocumentConversion, vec![missing, html]);
        let executor = Executor::new(ManualClock::new());
        let policy = RetryPolicy::no_retry();
        let budget = RateBudget::unlimited("convert");
        let options = PublishOptions {
            policy: &policy,
            budget: &budget,
            min_pdf_bytes: 1000,
        };

        let outcome = publish(&executor, &chain, options, &md, STORY).await;
        assert_eq!(outcome, DocumentOutcome::Html(dir.path().join("story.html")));
        assert!(outcome.path().unwrap().exists());
    }

    #[tokio::test]
    async fn test_exhausted_chain_keeps_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let chain: FallbackChain<SharedConverter> =
            FallbackChain::empty(OperationKind::DocumentConversion);
        let executor = Executor::new(ManualClock::new());
        let policy = RetryPolicy::no_retry();
        let budget = RateBudget::unlimited("convert");
        let options = PublishOptions {
            policy: &policy,
            budget: &budget,
            min_pdf_bytes: 1000,
        };

        let md = dir.path().join("story.md");
        let outcome = publish(&executor, &chain, options, &md, STORY).await;
        assert_eq!(outcome, DocumentOutcome::MarkdownOnly);
        assert_eq!(outcome.path(), None);
    }

    #[tokio::test]
    async fn test_small_pdf_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("tiny.pdf");
        std::fs::write(&pdf, b"%PDF-1.4").unwrap();

        let err = check_pdf_size(&pdf, 1000).await.unwrap_err();
        assert!(err.to_string().contains("only 8 bytes"));
        assert!(check_pdf_size(&pdf, 8).await.is_ok());
    }
}

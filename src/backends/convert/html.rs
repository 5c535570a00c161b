//! Standalone HTML export. Needs nothing installed, so it is always
//! available.

use std::path::PathBuf;

use futures_util::future::{BoxFuture, FutureExt};

use crate::backends::convert::{ConversionJob, Converter, DocumentFormat};
use crate::resilience::{Backend, CallError};

#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlExport;

impl Backend for HtmlExport {
    fn id(&self) -> &str {
        "html"
    }
}

impl Converter for HtmlExport {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Html
    }

    fn detect(&self) -> BoxFuture<'_, bool> {
        async { true }.boxed()
    }

    fn convert<'a>(&'a self, job: &'a ConversionJob) -> BoxFuture<'a, Result<PathBuf, CallError>> {
        async move {
            tokio::fs::write(&job.html_path, &job.browser_html)
                .await
                .map_err(|e| {
                    CallError::backend(format!("writing {}: {e}", job.html_path.display()))
                })?;
            Ok(job.html_path.clone())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_writes_browser_document() {
        let dir = tempfile::tempdir().unwrap();
        let md = dir.path().join("story.md");
        let job = ConversionJob::new(&md, "# Moon\n\n## Chapter 1: Up\n\nHigh.\n");

        let path = HtmlExport.convert(&job).await.unwrap();
        assert_eq!(path, dir.path().join("story.html"));

        let written = std::fs::read_to_string(path).unwrap();
        assert!(written.contains("<title>Moon</title>"));
        assert!(written.contains("print-button"));
    }

    #[tokio::test]
    async fn test_unwritable_target_is_backend_error() {
        let job = ConversionJob::new(std::path::Path::new("/nonexistent/dir/story.md"), "# T\n");
        let err = HtmlExport.convert(&job).await.unwrap_err();
        assert_eq!(err.kind(), crate::resilience::ErrorKind::BackendError);
    }
}

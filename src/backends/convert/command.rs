//! PDF engines driven as external processes.

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use futures_util::future::{BoxFuture, FutureExt};
use tempfile::NamedTempFile;
use tokio::process::Command;

use crate::backends::convert::{ConversionJob, Converter, DocumentFormat};
use crate::config::ConverterKind;
use crate::document::PRINT_CSS;
use crate::resilience::{Backend, CallError};

/// Longest stderr excerpt carried into error messages.
const STDERR_EXCERPT: usize = 300;

/// weasyprint, mdpdf or wkhtmltopdf.
#[derive(Debug, Clone)]
pub struct CommandConverter {
    kind: ConverterKind,
    program: String,
}

impl CommandConverter {
    pub fn new(kind: ConverterKind) -> Self {
        Self::with_program(kind, kind.as_str())
    }

    /// Same engine, different executable (a full path or a wrapper).
    pub fn with_program(kind: ConverterKind, program: impl Into<String>) -> Self {
        Self {
            kind,
            program: program.into(),
        }
    }

    fn version_arg(&self) -> &'static str {
        match self.kind {
            ConverterKind::Mdpdf => "--help",
            _ => "--version",
        }
    }

    async fn run_job(&self, job: &ConversionJob) -> Result<PathBuf, CallError> {
        // A stale file from an earlier run must not pass for fresh output.
        let _ = tokio::fs::remove_file(&job.pdf_path).await;

        // Temp inputs live next to the markdown so relative image paths resolve.
        let mut keep = Vec::new();
        let args: Vec<OsString> = match self.kind {
            ConverterKind::Weasyprint => {
                let input = temp_file(&job.base_dir, ".html", &job.print_html)?;
                let args = vec![
                    "--base-url".into(),
                    job.base_dir.clone().into(),
                    input.path().into(),
                    job.pdf_path.clone().into(),
                ];
                keep.push(input);
                args
            }
            ConverterKind::Mdpdf => {
                let input = temp_file(&job.base_dir, ".md", &job.preprocessed)?;
                let css = temp_file(&job.base_dir, ".css", PRINT_CSS)?;
                let args = vec![
                    "--output".into(),
                    job.pdf_path.clone().into(),
                    "--css".into(),
                    css.path().into(),
                    "--format".into(),
                    "A4".into(),
                    "--margin".into(),
                    "2cm".into(),
                    input.path().into(),
                ];
                keep.push(input);
                keep.push(css);
                args
            }
            ConverterKind::Wkhtmltopdf => {
                let input = temp_file(&job.base_dir, ".html", &job.print_html)?;
                let mut args: Vec<OsString> = [
                    "--quiet",
                    "--page-size",
                    "A4",
                    "--margin-top",
                    "2cm",
                    "--margin-right",
                    "2cm",
                    "--margin-bottom",
                    "2cm",
                    "--margin-left",
                    "2cm",
                    "--encoding",
                    "UTF-8",
                    "--print-media-type",
                    "--enable-local-file-access",
                    "--load-error-handling",
                    "ignore",
                ]
                .iter()
                .map(OsString::from)
                .collect();
                args.push(input.path().into());
                args.push(job.pdf_path.clone().into());
                keep.push(input);
                args
            }
            ConverterKind::Html => {
                return Err(CallError::unavailable("html export is not a command"));
            }
        };

        run(&self.program, &args).await?;
        drop(keep);

        match tokio::fs::metadata(&job.pdf_path).await {
            Ok(meta) if meta.is_file() => Ok(job.pdf_path.clone()),
            _ => Err(CallError::backend(format!(
                "{} exited cleanly but wrote no {}",
                self.program,
                job.pdf_path.display()
            ))),
        }
    }
}

impl Backend for CommandConverter {
    fn id(&self) -> &str {
        self.kind.as_str()
    }
}

impl Converter for CommandConverter {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    fn detect(&self) -> BoxFuture<'_, bool> {
        async move {
            Command::new(&self.program)
                .arg(self.version_arg())
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .map(|status| status.success())
                .unwrap_or(false)
        }
        .boxed()
    }

    fn convert<'a>(&'a self, job: &'a ConversionJob) -> BoxFuture<'a, Result<PathBuf, CallError>> {
        self.run_job(job).boxed()
    }
}

fn temp_file(dir: &Path, suffix: &str, contents: &str) -> Result<NamedTempFile, CallError> {
    let write = || -> io::Result<NamedTempFile> {
        let mut file = tempfile::Builder::new()
            .prefix(".storybook-")
            .suffix(suffix)
            .tempfile_in(dir)?;
        file.write_all(contents.as_bytes())?;
        file.flush()?;
        Ok(file)
    };
    write().map_err(|e| CallError::backend(format!("writing temp file in {}: {e}", dir.display())))
}

async fn run(program: &str, args: &[OsString]) -> Result<(), CallError> {
    tracing::debug!(program, args = ?args, "Running converter");

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await;

    match output {
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(CallError::unavailable(format!("{program} is not installed")))
        }
        Err(e) => Err(CallError::backend(format!("failed to start {program}: {e}"))),
        Ok(out) if !out.status.success() => {
            let stderr = String::from_utf8_lossy(&out.stderr);
            let stderr = stderr.trim();
            let excerpt = match stderr.char_indices().nth(STDERR_EXCERPT) {
                Some((idx, _)) => &stderr[..idx],
                None => stderr,
            };
            Err(CallError::backend(format!("{program} failed ({}): {excerpt}", out.status)))
        }
        Ok(_) => Ok(()),
    }
}

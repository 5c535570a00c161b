//! `storybook` command-line entry point.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};

use storybook::backends::{conversion_chain, Chains};
use storybook::config::{load_or_default, Secrets, StorybookConfig};
use storybook::lifecycle::stop_signal;
use storybook::observability::logging::init_logging;
use storybook::observability::metrics::init_metrics;
use storybook::observability::usage::{ApiStatus, UsageTracker};
use storybook::resilience::{Executor, RetryPolicy};
use storybook::story::{
    publish, validate_topic, Budgets, DocumentOutcome, PipelineError, PublishOptions,
    StoryPipeline, StoryReport, TOPIC_SUGGESTIONS,
};

#[derive(Parser)]
#[command(name = "storybook")]
#[command(about = "Generate illustrated children's storybooks", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level for this crate (overridden by RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a storybook
    Generate {
        /// Story topic (asked interactively when omitted)
        #[arg(short, long)]
        topic: Option<String>,

        /// Skip confirmation prompts
        #[arg(short, long)]
        yes: bool,

        /// Directory for the markdown, images and document
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Check configuration, API keys and installed converters
    Check,
    /// Convert an existing story markdown file to PDF or HTML
    Convert {
        /// Markdown file to convert
        markdown: PathBuf,
    },
    /// Show configured rate limits and today's API request count
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_or_default(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }
    init_logging(&config.observability);

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    match cli.command {
        Commands::Generate {
            topic,
            yes,
            output_dir,
        } => {
            if let Some(dir) = output_dir {
                config.story.output_dir = dir;
            }
            generate(&config, topic, yes).await
        }
        Commands::Check => check(&config).await,
        Commands::Convert { markdown } => convert(&config, &markdown).await,
        Commands::Status => status(&config),
    }
}

async fn generate(
    config: &StorybookConfig,
    topic: Option<String>,
    yes: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let secrets = Secrets::from_env(config)?;

    let topic = match topic {
        Some(topic) => validate_topic(&topic)?,
        None => ask_topic()?,
    };

    let chains = Chains::from_config(config, &secrets).await?;
    if chains.convert.ids() == ["html"] {
        println!("No PDF converter found (weasyprint, mdpdf, wkhtmltopdf); the story will be exported as HTML.");
    }

    println!("\nCreating a storybook about '{topic}'.");
    println!(
        "Text: {} request(s) per {}s, images: {} per {}s, with automatic backoff on throttling.",
        config.rate_limits.text.max_operations,
        config.rate_limits.text.window_secs,
        config.rate_limits.image.max_operations,
        config.rate_limits.image.window_secs,
    );
    if !yes && !confirm("Ready to start generation? This might take 5-15 minutes.")? {
        println!("Generation cancelled.");
        return Ok(());
    }

    let usage = Arc::new(UsageTracker::load(
        &config.usage.state_file,
        config.usage.daily_warning_threshold,
    ));
    let pipeline = StoryPipeline::new(Executor::tokio(), chains, config, Arc::clone(&usage));

    let result = tokio::select! {
        result = pipeline.run(&topic) => result,
        signal = stop_signal() => {
            save_usage(&usage, config);
            eprintln!(
                "\nGeneration stopped ({signal}). Partial files may exist in {}.",
                config.story.output_dir.display()
            );
            std::process::exit(130);
        }
    };
    save_usage(&usage, config);

    match result {
        Ok(report) => {
            print_report(&report);
            print_status(&pipeline.status())?;
            Ok(())
        }
        Err(err) => {
            if matches!(err, PipelineError::Exhausted { .. }) {
                print_quota_help();
            }
            Err(err.into())
        }
    }
}

async fn check(config: &StorybookConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("Configuration: ok");
    println!("  text models:  {}", config.text.models.join(", "));
    println!("  image model:  {}", config.image.api_url);
    println!("  output:       {}", config.story.output_dir.join(&config.story.markdown_file).display());

    let converters = conversion_chain(&config.convert).await;
    println!("  converters:   {}", converters.ids().join(", "));

    match Secrets::from_env(config) {
        Ok(_) => {
            println!("API keys: ok");
            Ok(())
        }
        Err(err) => {
            println!("API keys: {err}");
            Err(err.into())
        }
    }
}

async fn convert(config: &StorybookConfig, markdown_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let markdown = tokio::fs::read_to_string(markdown_path).await?;

    let chain = conversion_chain(&config.convert).await;
    let policy = RetryPolicy::from(&config.retries.convert);
    let budgets = Budgets::from_config(config);
    let options = PublishOptions {
        policy: &policy,
        budget: &budgets.convert,
        min_pdf_bytes: config.convert.min_pdf_bytes,
    };

    let outcome = publish(&Executor::tokio(), &chain, options, markdown_path, &markdown).await;
    print_document(&outcome, markdown_path);
    Ok(())
}

fn status(config: &StorybookConfig) -> Result<(), Box<dyn std::error::Error>> {
    let usage = UsageTracker::load(&config.usage.state_file, config.usage.daily_warning_threshold);
    // Budget windows live only inside a run; this shows their limits.
    let budgets = Budgets::from_config(config);
    print_status(&ApiStatus::capture(&usage, &[&budgets.text, &budgets.image]))
}

fn save_usage(usage: &UsageTracker, config: &StorybookConfig) {
    if let Err(e) = usage.save(&config.usage.state_file) {
        tracing::warn!(
            path = %config.usage.state_file.display(),
            error = %e,
            "Could not save API usage"
        );
    }
}

fn print_report(report: &StoryReport) {
    println!("\nYour storybook \"{}\" is ready!", report.title);
    println!("  markdown:     {}", report.markdown_path.display());
    println!(
        "  images:       {} generated, {} placeholder(s)",
        report.images_generated, report.placeholders
    );
    print_document(&report.document, &report.markdown_path);
    println!("  elapsed:      {:.1}s", report.elapsed.as_secs_f64());
}

fn print_document(outcome: &DocumentOutcome, markdown_path: &Path) {
    match outcome {
        DocumentOutcome::Pdf(path) => println!("  document:     {}", path.display()),
        DocumentOutcome::Html(path) => {
            println!("  document:     {} (open it in a browser and use Print to PDF)", path.display());
            println!("                install weasyprint, mdpdf or wkhtmltopdf for direct PDF output");
        }
        DocumentOutcome::MarkdownOnly => println!(
            "  document:     conversion failed; the story is safe in {}",
            markdown_path.display()
        ),
    }
}

fn print_status(status: &ApiStatus) -> Result<(), Box<dyn std::error::Error>> {
    println!("\nAPI usage:\n{}", serde_json::to_string_pretty(status)?);
    Ok(())
}

fn print_quota_help() {
    eprintln!("\nIf you keep hitting quota limits:");
    eprintln!("  1. Wait for the quota window to reset and run again");
    eprintln!("  2. Check your usage in Google AI Studio: https://aistudio.google.com/");
    eprintln!("  3. Lower rate_limits.text.max_operations or add fallback models in text.models");
}

fn ask_topic() -> io::Result<String> {
    println!("What topic would you like your children's storybook to be about?");
    println!("\nSome ideas:");
    for suggestion in TOPIC_SUGGESTIONS {
        println!("  - {suggestion}");
    }

    loop {
        let answer = ask("\nEnter your story topic: ")?;
        match validate_topic(&answer) {
            Ok(topic) => {
                if confirm(&format!("You chose '{topic}'. Is this correct?"))? {
                    return Ok(topic);
                }
            }
            Err(err) => println!("Please try again: {err}."),
        }
    }
}

fn confirm(question: &str) -> io::Result<bool> {
    let answer = ask(&format!("{question} (y/n): "))?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn ask(prompt: &str) -> io::Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no input on stdin"));
    }
    Ok(line.trim().to_string())
}

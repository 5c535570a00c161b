//! Story document rendering.
//!
//! # Data Flow
//! ```text
//! story.md
//!     → preprocess.rs (placeholders, image tags, chapter breaks)
//!     → pulldown-cmark (HTML body)
//!     → print document (A4 print CSS) for the PDF engines
//!     → browser document (print CSS + screen CSS + print button)
//! ```

pub mod preprocess;

use pulldown_cmark::{html, Options, Parser};

pub use preprocess::{preprocess, PLACEHOLDER_PREFIX};

use preprocess::escape_html;

/// A4 print stylesheet shared by every output.
pub const PRINT_CSS: &str = include_str!("print.css");

/// Extra styling for on-screen reading of the HTML export.
pub const SCREEN_CSS: &str = include_str!("screen.css");

const DEFAULT_TITLE: &str = "Children's Storybook";

/// Render preprocessed markdown to an HTML fragment.
pub fn render_body(preprocessed: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(preprocessed, options);
    let mut out = String::with_capacity(preprocessed.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Text of the first `# ` heading, if any.
pub fn title_of(markdown: &str) -> Option<&str> {
    markdown
        .lines()
        .find_map(|line| line.strip_prefix("# "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Complete HTML document for the PDF engines.
pub fn print_document(markdown: &str) -> String {
    let body = render_body(&preprocess(markdown));
    let title = escape_html(title_of(markdown).unwrap_or(DEFAULT_TITLE));
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{title}</title>\n<style>\n{PRINT_CSS}</style>\n</head>\n<body>\n{body}</body>\n</html>\n"
    )
}

/// Standalone HTML for reading in a browser, with a print-to-PDF button.
pub fn browser_document(markdown: &str) -> String {
    let body = render_body(&preprocess(markdown));
    let title = escape_html(title_of(markdown).unwrap_or(DEFAULT_TITLE));
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{title}</title>\n<style>\n{PRINT_CSS}\n{SCREEN_CSS}</style>\n</head>\n<body>\n\
         <button class=\"print-button\" onclick=\"window.print()\">Print to PDF</button>\n\
         {body}</body>\n</html>\n"
    )
}

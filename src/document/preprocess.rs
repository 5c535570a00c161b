//! Markdown rewrites applied before rendering.
//!
//! - `![alt](PLACEHOLDER: text)` becomes a styled placeholder block
//! - `![alt](path)` becomes an `<img class="chapter-image">`
//! - every `## Chapter n` heading is preceded by a page break marker

use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Image source prefix marking a description instead of a file.
pub const PLACEHOLDER_PREFIX: &str = "PLACEHOLDER:";

fn image_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"!\[([^\]]*)\]\(([^)]+)\)").ok())
        .as_ref()
}

fn chapter_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?m)^## (Chapter \d+[^#\n]*)").ok())
        .as_ref()
}

/// Apply every rewrite to `markdown`.
pub fn preprocess(markdown: &str) -> String {
    let with_images = match image_pattern() {
        Some(pattern) => pattern.replace_all(markdown, rewrite_image).into_owned(),
        None => markdown.to_string(),
    };

    match chapter_pattern() {
        Some(pattern) => pattern
            .replace_all(&with_images, "<div class=\"chapter-break\"></div>\n\n## $1")
            .into_owned(),
        None => with_images,
    }
}

fn rewrite_image(caps: &Captures<'_>) -> String {
    let alt = match caps.get(1).map(|m| m.as_str().trim()) {
        Some(alt) if !alt.is_empty() => alt,
        _ => "Chapter Image",
    };
    let src = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();

    match src.strip_prefix(PLACEHOLDER_PREFIX) {
        Some(description) => format!(
            "<div class=\"image-placeholder\"><em>{}</em></div>",
            escape_html(description.trim())
        ),
        None => format!(
            "<img src=\"{}\" alt=\"{}\" class=\"chapter-image\">",
            escape_html(src),
            escape_html(alt)
        ),
    }
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_becomes_styled_block() {
        let out = preprocess("![Chapter 1 Image](PLACEHOLDER: A fox & a hen)");
        assert_eq!(
            out,
            "<div class=\"image-placeholder\"><em>A fox &amp; a hen</em></div>"
        );
    }

    #[test]
    fn test_real_image_gets_chapter_class() {
        let out = preprocess("![Chapter 2 Image](images/a_fox.png)");
        assert_eq!(
            out,
            "<img src=\"images/a_fox.png\" alt=\"Chapter 2 Image\" class=\"chapter-image\">"
        );
        assert!(preprocess("![](x.png)").contains("alt=\"Chapter Image\""));
    }

    #[test]
    fn test_chapter_breaks_inserted() {
        let out = preprocess("# Title\n\n## Chapter 1: Start\n\ntext\n\n## Chapter 2: End\n\n## Epilogue");
        assert_eq!(out.matches("chapter-break").count(), 2);
        assert!(out.contains("<div class=\"chapter-break\"></div>\n\n## Chapter 1: Start"));
        assert!(!out.contains("chapter-break\"></div>\n\n## Epilogue"));
    }
}

//! The finished story and its markdown form.

use serde::Serialize;

use crate::document::PLACEHOLDER_PREFIX;

/// Longest placeholder text, in characters of the scene description.
pub const PLACEHOLDER_CHARS: usize = 100;

/// What sits above a chapter's prose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Illustration {
    /// Image file, relative to the markdown file.
    Image(String),
    /// Description shown when no image could be generated.
    Placeholder(String),
}

impl Illustration {
    /// Placeholder built from the start of a scene description.
    pub fn placeholder(scene: &str) -> Self {
        let text: String = scene
            .chars()
            .take(PLACEHOLDER_CHARS)
            .map(|c| match c {
                // keep the markdown image syntax intact
                '(' | ')' | '[' | ']' => ' ',
                '\n' | '\r' => ' ',
                c => c,
            })
            .collect();
        Illustration::Placeholder(text.trim().to_string())
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Illustration::Image(_))
    }

    fn target(&self) -> String {
        match self {
            Illustration::Image(path) => path.clone(),
            Illustration::Placeholder(text) => format!("{PLACEHOLDER_PREFIX} {text}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chapter {
    pub number: usize,
    pub title: String,
    pub text: String,
    pub illustration: Illustration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Manuscript {
    pub title: String,
    pub chapters: Vec<Chapter>,
}

impl Manuscript {
    /// Markdown layout understood by the document renderer.
    pub fn to_markdown(&self) -> String {
        let mut out = format!("# {}\n\n", self.title);
        for chapter in &self.chapters {
            out.push_str(&format!(
                "## Chapter {}: {}\n\n![Chapter {} Image]({})\n\n{}\n\n",
                chapter.number,
                chapter.title,
                chapter.number,
                chapter.illustration.target(),
                chapter.text.trim()
            ));
        }
        out
    }

    pub fn images(&self) -> usize {
        self.chapters.iter().filter(|c| c.illustration.is_image()).count()
    }

    pub fn placeholders(&self) -> usize {
        self.chapters.len() - self.images()
    }
}

/// File name for a chapter's image: `chapter_<n>_` followed by the scene's
/// first five words, reduced to `[a-z0-9_]` and joined by underscores.
pub fn image_file_name(chapter: usize, scene: &str) -> String {
    let stem = scene
        .split_whitespace()
        .take(5)
        .map(|word| {
            word.chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase();

    if stem.is_empty() {
        format!("chapter_{chapter}.png")
    } else {
        format!("chapter_{chapter}_{stem}.png")
    }
}

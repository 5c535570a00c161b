//! Story outline and its line-oriented wire format.
//!
//! The model is asked to answer with exactly these lines:
//! ```text
//! TITLE: <story title>
//! CHAPTER 1: <chapter title>
//! ...
//! CHAPTER n: <chapter title>
//! CHARACTERS: <main characters and how they look>
//! ```
//! Markdown emphasis, bullets and surrounding chatter are tolerated; a
//! missing title or a chapter list that is not exactly `1..=n` is not.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterPlan {
    pub number: usize,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outline {
    pub title: String,
    pub chapters: Vec<ChapterPlan>,
    pub characters: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutlineError {
    #[error("outline has no TITLE line")]
    MissingTitle,
    #[error("outline has {found} chapters, expected {expected}")]
    ChapterCount { expected: usize, found: usize },
    #[error("outline chapter {found} appears where chapter {expected} belongs")]
    ChapterOrder { expected: usize, found: usize },
    #[error("outline chapter {0} has no title")]
    UntitledChapter(usize),
}

/// Parse a model response into an outline with exactly `expected` chapters.
pub fn parse_outline(text: &str, expected: usize) -> Result<Outline, OutlineError> {
    let mut title = None;
    let mut chapters = Vec::new();
    let mut characters = Vec::new();

    for raw in text.lines() {
        let line = clean(raw);
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = strip_key(line, "TITLE") {
            if title.is_none() && !rest.is_empty() {
                title = Some(rest.to_string());
            }
        } else if let Some(rest) = strip_key(line, "CHARACTERS") {
            if !rest.is_empty() {
                characters.push(rest.to_string());
            }
        } else if let Some((number, chapter_title)) = chapter_line(line) {
            chapters.push((number, chapter_title.to_string()));
        }
    }

    let title = title.ok_or(OutlineError::MissingTitle)?;

    if chapters.len() != expected {
        return Err(OutlineError::ChapterCount {
            expected,
            found: chapters.len(),
        });
    }

    let chapters = chapters
        .into_iter()
        .enumerate()
        .map(|(idx, (number, chapter_title))| {
            if number != idx + 1 {
                return Err(OutlineError::ChapterOrder {
                    expected: idx + 1,
                    found: number,
                });
            }
            if chapter_title.is_empty() {
                return Err(OutlineError::UntitledChapter(number));
            }
            Ok(ChapterPlan {
                number,
                title: chapter_title,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Outline {
        title,
        chapters,
        characters: characters.join(" "),
    })
}

/// Drop bullets, heading marks and emphasis around a line.
fn clean(line: &str) -> &str {
    line.trim()
        .trim_start_matches(['-', '*', '#', '>'])
        .trim()
        .trim_matches('*')
        .trim()
}

/// `KEY: rest`, case-insensitive on the key, tolerating `**KEY:**`.
fn strip_key<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let head = line.get(..key.len())?;
    if !head.eq_ignore_ascii_case(key) {
        return None;
    }
    let rest = line[key.len()..].trim_start_matches('*').trim_start();
    let rest = rest.strip_prefix(':')?;
    Some(rest.trim_start_matches('*').trim())
}

/// `CHAPTER n: title`.
fn chapter_line(line: &str) -> Option<(usize, &str)> {
    let rest = strip_prefix_ignore_case(line, "CHAPTER")?.trim_start();
    let digits_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    let number: usize = rest[..digits_end].parse().ok()?;
    let title = rest[digits_end..]
        .trim_start_matches('*')
        .trim_start()
        .strip_prefix(':')?
        .trim_start_matches('*')
        .trim()
        .trim_matches('"');
    Some((number, title))
}

fn strip_prefix_ignore_case<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &line[prefix.len()..])
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = "Here is your outline!\n\n\
        **TITLE:** Luna and the Star Garden\n\
        CHAPTER 1: The Falling Star\n\
        - Chapter 2: A Garden in the Sky\n\
        CHAPTER 3: \"Home Again\"\n\
        CHARACTERS: Luna, a curious girl with a yellow raincoat;\n\
        CHARACTERS: Pip, a tiny glowing star.\n";

    #[test]
    fn test_parses_tolerant_format() {
        let outline = parse_outline(RESPONSE, 3).unwrap();
        assert_eq!(outline.title, "Luna and the Star Garden");
        assert_eq!(outline.chapters.len(), 3);
        assert_eq!(outline.chapters[1].title, "A Garden in the Sky");
        assert_eq!(outline.chapters[2].title, "Home Again");
        assert_eq!(
            outline.characters,
            "Luna, a curious girl with a yellow raincoat; Pip, a tiny glowing star."
        );
    }

    #[test]
    fn test_missing_title() {
        let err = parse_outline("CHAPTER 1: Start", 1).unwrap_err();
        assert_eq!(err, OutlineError::MissingTitle);
    }

    #[test]
    fn test_wrong_chapter_count() {
        let err = parse_outline(RESPONSE, 5).unwrap_err();
        assert_eq!(err, OutlineError::ChapterCount { expected: 5, found: 3 });
    }

    #[test]
    fn test_chapters_out_of_order() {
        let text = "TITLE: T\nCHAPTER 1: a\nCHAPTER 3: c\n";
        let err = parse_outline(text, 2).unwrap_err();
        assert_eq!(err, OutlineError::ChapterOrder { expected: 2, found: 3 });
    }

    #[test]
    fn test_untitled_chapter() {
        let err = parse_outline("TITLE: T\nCHAPTER 1:   \n", 1).unwrap_err();
        assert_eq!(err, OutlineError::UntitledChapter(1));
    }

    #[test]
    fn test_characters_optional() {
        let outline = parse_outline("TITLE: T\nCHAPTER 1: a", 1).unwrap();
        assert!(outline.characters.is_empty());
    }
}

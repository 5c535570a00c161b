//! Prompts sent to the text model.

use crate::story::outline::{ChapterPlan, Outline};

/// Longest scene handed to the image model, in words of chapter prose.
const SCENE_WORDS: usize = 60;

pub fn outline_prompt(topic: &str, chapters: usize, audience: &str) -> String {
    format!(
        "You are an experienced children's book author. Plan a storybook about {topic} \
         for children aged {audience}.\n\n\
         The story needs a compelling title related to {topic}, exactly {chapters} chapters \
         that flow logically, and a short list of recurring characters with how they look, \
         so an illustrator can draw them consistently.\n\n\
         Answer with these lines and nothing else:\n\
         TITLE: <story title>\n\
         CHAPTER 1: <chapter title>\n\
         ... one CHAPTER line per chapter, numbered 1 to {chapters} ...\n\
         CHARACTERS: <one line describing the main characters' names and appearance>"
    )
}

pub fn chapter_prompt(
    outline: &Outline,
    chapter: &ChapterPlan,
    topic: &str,
    words: usize,
    audience: &str,
) -> String {
    let characters = if outline.characters.is_empty() {
        "(as you see fit)"
    } else {
        outline.characters.as_str()
    };
    let plan: String = outline
        .chapters
        .iter()
        .map(|c| format!("{}. {}\n", c.number, c.title))
        .collect();
    format!(
        "You are writing \"{title}\", a children's storybook about {topic} for ages {audience}.\n\n\
         Characters: {characters}\n\n\
         Chapters:\n{plan}\n\
         Write chapter {number}, \"{chapter_title}\", in about {words} words. Use simple, \
         age-appropriate language with some dialogue and vivid description, keep the \
         characters consistent, and give the chapter a clear beginning, middle and end.\n\
         Return only the chapter prose: no heading, no chapter number, no notes.",
        title = outline.title,
        number = chapter.number,
        chapter_title = chapter.title,
    )
}

/// Strip headings and title echoes a model sometimes adds around the prose.
pub fn clean_chapter_text(text: &str, chapter: &ChapterPlan) -> String {
    text.lines()
        .skip_while(|line| {
            let t = line.trim();
            t.is_empty() || t.starts_with('#') || t.trim_matches('*').trim() == chapter.title
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// What the illustrator should draw for a chapter: the opening of its prose
/// plus the character sheet.
pub fn scene_description(chapter_text: &str, characters: &str) -> String {
    let words: Vec<&str> = chapter_text.split_whitespace().collect();
    let mut scene = words[..words.len().min(SCENE_WORDS)].join(" ");
    if words.len() > SCENE_WORDS {
        scene.push_str("...");
    }
    if !characters.is_empty() {
        scene.push_str(" Characters: ");
        scene.push_str(characters);
    }
    scene
}

//! Story topic validation.

use thiserror::Error;

/// Longest accepted topic, in whitespace-separated words.
pub const MAX_TOPIC_WORDS: usize = 10;

/// Suggestions shown when prompting for a topic.
pub const TOPIC_SUGGESTIONS: &[&str] = &[
    "Animals (farm animals, jungle animals, pets)",
    "Space and planets",
    "Friendship and kindness",
    "Ocean and sea creatures",
    "Magic and fairy tales",
    "Dinosaurs",
    "Transportation (cars, trains, airplanes)",
    "Family and home",
    "Nature and environment",
    "Superheroes",
    "Food and cooking",
    "Sports and games",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopicError {
    #[error("topic is empty")]
    Empty,
    #[error("topic has {words} words; keep it to 10 or fewer")]
    TooLong { words: usize },
}

/// Trim and check `topic`; returns the normalized topic.
pub fn validate_topic(topic: &str) -> Result<String, TopicError> {
    let words: Vec<&str> = topic.split_whitespace().collect();
    if words.is_empty() {
        return Err(TopicError::Empty);
    }
    if words.len() > MAX_TOPIC_WORDS {
        return Err(TopicError::TooLong { words: words.len() });
    }
    Ok(words.join(" "))
}

//! Reading-time estimation for post bodies.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

pub const WORDS_PER_MINUTE: u32 = 200;

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag pattern"));
static NON_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s]").expect("valid punctuation pattern"));
static MARKDOWN_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").expect("valid image pattern"));
static MARKDOWN_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\]]*\]\([^)]*\)").expect("valid link pattern"));
static MARKDOWN_FORMATTING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[#*_~`>|]").expect("valid formatting pattern"));

/// Detailed estimate rendered next to post titles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadingTime {
    pub text: String,
    pub minutes: u32,
    /// Estimated reading duration in milliseconds.
    pub time_ms: u64,
    pub words: u32,
}

impl ReadingTime {
    fn from_words(words: u32) -> Self {
        let minutes = minutes_for(words);
        Self {
            text: format!("{minutes} min read"),
            minutes,
            time_ms: u64::from(minutes) * 60 * 1000,
            words,
        }
    }
}

/// Estimate reading time in whole minutes after removing HTML tags and punctuation.
///
/// Non-empty content always reads in at least one minute; empty content reads in zero.
pub fn calculate_reading_time(content: &str) -> u32 {
    let without_tags = HTML_TAG.replace_all(content, "");
    let cleaned = NON_WORD.replace_all(&without_tags, "");
    minutes_for(count_words(&cleaned))
}

/// Estimate reading time for markdown or HTML, reporting words and duration as well.
pub fn calculate_detailed_reading_time(content: &str) -> ReadingTime {
    let without_images = MARKDOWN_IMAGE.replace_all(content, " ");
    let without_links = MARKDOWN_LINK.replace_all(&without_images, " ");
    let without_tags = HTML_TAG.replace_all(&without_links, " ");
    let cleaned = MARKDOWN_FORMATTING.replace_all(&without_tags, "");
    ReadingTime::from_words(count_words(&cleaned))
}

fn count_words(text: &str) -> u32 {
    let count = text
        .split_whitespace()
        .filter(|word| word.chars().any(char::is_alphanumeric))
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

fn minutes_for(words: u32) -> u32 {
    if words == 0 {
        0
    } else {
        words.div_ceil(WORDS_PER_MINUTE).max(1)
    }
}

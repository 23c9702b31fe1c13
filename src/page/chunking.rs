//! Sentence chunking for the speech engine.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_SENTENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^.!?]*[.!?]+").unwrap());

/// Split `text` into speakable chunks.
///
/// Sentences end at runs of `.`, `!` or `?`; trailing text without terminal
/// punctuation becomes its own chunk. Chunks are trimmed and empty ones
/// dropped. A sentence longer than `max_chars` characters is packed word by
/// word, so a piece only exceeds the limit when a single token does. Input
/// with nothing to speak comes back as a single chunk equal to the input.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut consumed = 0;

    for sentence in RE_SENTENCE.find_iter(text) {
        push_sentence(&mut chunks, sentence.as_str(), max_chars);
        consumed = sentence.end();
    }
    push_sentence(&mut chunks, &text[consumed..], max_chars);

    if chunks.is_empty() {
        return vec![text.to_string()];
    }
    chunks
}

fn push_sentence(chunks: &mut Vec<String>, sentence: &str, max_chars: usize) {
    let trimmed = sentence.trim();
    if trimmed.is_empty() {
        return;
    }
    if trimmed.chars().count() <= max_chars {
        chunks.push(trimmed.to_string());
        return;
    }

    let mut current = String::new();
    let mut current_chars = 0;
    for word in trimmed.split_whitespace() {
        let word_chars = word.chars().count();
        if current_chars > 0 && current_chars + 1 + word_chars > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        if current_chars > 0 {
            current.push(' ');
            current_chars += 1;
        }
        current.push_str(word);
        current_chars += word_chars;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
}

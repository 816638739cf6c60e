//! Phonetic normalization for fuzzy comparison.
//!
//! Han characters become their toneless pinyin syllable, runs of other
//! letters and digits become lowercase words. Everything else separates
//! units and is dropped.

use pinyin::ToPinyin;

/// Phonetic units of `text`, in order.
pub fn units(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut word = String::new();

    for c in text.chars() {
        if let Some(syllable) = c.to_pinyin() {
            flush(&mut word, &mut out);
            out.push(syllable.plain().to_string());
        } else if c.is_alphanumeric() {
            word.extend(c.to_lowercase());
        } else {
            flush(&mut word, &mut out);
        }
    }
    flush(&mut word, &mut out);
    out
}

fn flush(word: &mut String, out: &mut Vec<String>) {
    if !word.is_empty() {
        out.push(std::mem::take(word));
    }
}

/// Normalized comparison text: units joined by single spaces.
pub fn normalize(text: &str) -> String {
    units(text).join(" ")
}

/// Number of characters in a normalized text, not counting separators.
pub fn char_count(normalized: &str) -> usize {
    normalized.chars().filter(|c| *c != ' ').count()
}

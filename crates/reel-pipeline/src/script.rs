//! Script analysis: title, statistics, slug and length budget.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use reel_models::encoding::{SPOKEN_WORDS_PER_SECOND, WORDS_PER_MINUTE};
use reel_models::ScriptStats;

/// Title and slug used when the script yields nothing usable.
pub const UNTITLED: &str = "untitled";

/// Longest slug produced.
pub const MAX_SLUG_LEN: usize = 64;

static NON_ALNUM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// First non-empty line, trimmed.
pub fn derive_title(script: &str) -> String {
    script
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or(UNTITLED)
        .to_string()
}

/// Filesystem-safe identifier: `[a-z0-9_]`, no leading or trailing `_`.
pub fn slugify(title: &str) -> String {
    let lower = title.to_lowercase();
    let slug = NON_ALNUM.replace_all(&lower, "_");
    let slug = slug.trim_matches('_');
    let slug: String = slug.chars().take(MAX_SLUG_LEN).collect();
    let slug = slug.trim_end_matches('_');
    if slug.is_empty() {
        UNTITLED.to_string()
    } else {
        slug.to_string()
    }
}

pub fn compute_stats(script: &str) -> ScriptStats {
    let word_count = script.split_whitespace().count();
    let char_count = script.chars().count();
    let est_read_time = round2(word_count as f64 / WORDS_PER_MINUTE * 60.0);

    ScriptStats {
        word_count,
        char_count,
        est_read_time,
        language: detect_language(script),
    }
}

/// Word budget for a target spoken length.
pub fn word_budget(max_length_secs: u32) -> usize {
    max_length_secs as usize * SPOKEN_WORDS_PER_SECOND as usize
}

/// Keep the first `max_words` words. Returns `None` when nothing was cut.
pub fn truncate_words(script: &str, max_words: usize) -> Option<String> {
    let words: Vec<&str> = script.split_whitespace().collect();
    if words.len() <= max_words {
        return None;
    }
    Some(words[..max_words].join(" "))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

const MIN_WORDS_FOR_DETECTION: usize = 3;

static STOPWORDS: LazyLock<Vec<(&'static str, HashSet<&'static str>)>> = LazyLock::new(|| {
    vec![
        (
            "en",
            [
                "the", "and", "is", "are", "was", "to", "of", "in", "that", "it", "you", "this", "with", "for",
                "on", "not", "be", "have", "what", "your",
            ]
            .into_iter()
            .collect(),
        ),
        (
            "es",
            [
                "el", "la", "los", "las", "que", "y", "es", "en", "un", "una", "por", "con", "para", "como",
                "pero", "del", "su", "no", "se", "lo",
            ]
            .into_iter()
            .collect(),
        ),
        (
            "fr",
            [
                "le", "la", "les", "et", "est", "un", "une", "des", "que", "qui", "dans", "pour", "pas", "sur",
                "avec", "ce", "il", "elle", "vous", "nous",
            ]
            .into_iter()
            .collect(),
        ),
        (
            "de",
            [
                "der", "die", "das", "und", "ist", "nicht", "ein", "eine", "zu", "mit", "sich", "auf", "für",
                "ich", "sie", "es", "den", "dem", "auch", "wir",
            ]
            .into_iter()
            .collect(),
        ),
    ]
});

/// Best-effort language code from stopword frequency; `"unknown"` when
/// the text is too short or no language clearly dominates.
pub fn detect_language(text: &str) -> String {
    let words: Vec<String> = text
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect();
    if words.len() < MIN_WORDS_FOR_DETECTION {
        return "unknown".to_string();
    }

    let mut scores: Vec<(&str, usize)> = STOPWORDS
        .iter()
        .map(|(code, set)| (*code, words.iter().filter(|w| set.contains(w.as_str())).count()))
        .collect();
    scores.sort_by(|a, b| b.1.cmp(&a.1));

    let (best, best_score) = scores[0];
    let runner_up = scores.get(1).map(|s| s.1).unwrap_or(0);
    // Needs a clear lead and a meaningful share of the text
    if best_score >= 2 && best_score > runner_up && best_score * 10 >= words.len() {
        best.to_string()
    } else {
        "unknown".to_string()
    }
}

//! Heuristic entity and keyword extraction
//!
//! Pulls capitalized multi-word phrases, acronyms and salient long tokens out
//! of a sentence or abstract. No model is involved; short or degenerate input
//! yields an empty list.

use crate::text::{is_stopword, strip_latex};

/// Upper bound on entities returned for one text
const MAX_ENTITIES: usize = 12;

/// Tokens at least this long count as salient
const SALIENT_MIN_LEN: usize = 9;

/// Entities in order of first appearance, case-insensitively distinct
pub fn extract_entities(text: &str) -> Vec<String> {
    let plain = strip_latex(text);
    let words: Vec<&str> = plain
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '-'))
        .filter(|w| !w.is_empty())
        .collect();

    let mut found: Vec<String> = Vec::new();
    let mut push = |candidate: String| {
        let lower = candidate.to_lowercase();
        if !found.iter().any(|f| f.to_lowercase() == lower) {
            found.push(candidate);
        }
    };

    // Capitalized runs of two or more words
    let mut run: Vec<&str> = Vec::new();
    for word in words.iter().copied().chain(std::iter::once("")) {
        if is_capitalized(word) && !is_acronym(word) {
            run.push(word);
            continue;
        }
        while run.first().is_some_and(|w| is_stopword(&w.to_lowercase())) {
            run.remove(0);
        }
        if run.len() >= 2 {
            push(run.join(" "));
        }
        run.clear();
    }

    for word in &words {
        if is_acronym(word) {
            push(word.to_string());
        }
    }

    for word in &words {
        let lower = word.to_lowercase();
        if lower.chars().count() >= SALIENT_MIN_LEN && !is_stopword(&lower) && !is_acronym(word) {
            push(lower);
        }
    }

    found.truncate(MAX_ENTITIES);
    found
}

/// All-caps tokens of two or more letters, e.g. "NLP", "GPT4"
pub fn count_acronyms(text: &str) -> usize {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| is_acronym(w))
        .count()
}

fn is_acronym(word: &str) -> bool {
    let letters = word.chars().filter(|c| c.is_alphabetic()).count();
    letters >= 2
        && word
            .chars()
            .all(|c| c.is_ascii_digit() || c == '-' || (c.is_alphabetic() && c.is_uppercase()))
}

fn is_capitalized(word: &str) -> bool {
    word.chars().next().is_some_and(|c| c.is_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capitalized_phrases_and_acronyms() {
        let entities =
            extract_entities("The Big Five traits predict trust in NLP systems at New York University.");
        assert!(entities.contains(&"Big Five".to_string()));
        assert!(entities.contains(&"New York University".to_string()));
        assert!(entities.contains(&"NLP".to_string()));
    }

    #[test]
    fn test_salient_tokens() {
        let entities = extract_entities("we measured heterogeneity across participants");
        assert!(entities.contains(&"heterogeneity".to_string()));
        assert!(entities.contains(&"participants".to_string()));
        assert!(!entities.contains(&"measured".to_string()));
    }

    #[test]
    fn test_citations_are_not_entities() {
        let entities = extract_entities(r"Prior work \cite{SmithJones2020} agrees.");
        assert!(entities.iter().all(|e| !e.contains("Smith")));
    }

    #[test]
    fn test_degenerate_input() {
        assert!(extract_entities("").is_empty());
        assert!(extract_entities("a b c").is_empty());
        assert!(extract_entities("!!! ???").is_empty());
    }

    #[test]
    fn test_count_acronyms() {
        assert_eq!(count_acronyms("We used BERT and GPT4 on the US-based MTurk panel."), 3);
        assert_eq!(count_acronyms("no caps here"), 0);
    }
}

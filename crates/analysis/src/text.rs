//! Text utilities shared by the parsers, scorers and query builders

use crate::parser::latex::CITE_RE;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::collections::HashSet;

/// English function words ignored when building term sets and queries
pub static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and",
        "any", "are", "as", "at", "be", "because", "been", "before", "being", "below",
        "between", "both", "but", "by", "can", "could", "did", "do", "does", "doing", "down",
        "during", "each", "few", "for", "from", "further", "had", "has", "have", "having", "he",
        "her", "here", "hers", "him", "his", "how", "however", "i", "if", "in", "into", "is",
        "it", "its", "itself", "just", "may", "me", "might", "more", "most", "must", "my", "no",
        "nor", "not", "now", "of", "off", "on", "once", "only", "or", "other", "our", "ours",
        "out", "over", "own", "same", "she", "should", "so", "some", "such", "than", "that",
        "the", "their", "theirs", "them", "then", "there", "these", "they", "this", "those",
        "through", "thus", "to", "too", "under", "until", "up", "us", "very", "was", "we",
        "were", "what", "when", "where", "whether", "which", "while", "who", "whom", "why",
        "will", "with", "would", "you", "your", "yours",
    ]
    .into_iter()
    .collect()
});

static COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(^|[^\\])%[^\n]*").unwrap());
static ESCAPED_CHAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\([%&$#_{}])").unwrap());
static COMMAND_WITH_ARG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\[a-zA-Z]+\*?(?:\[[^\]]*\])?\{([^{}]*)\}").unwrap());
static CONTROL_WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\[a-zA-Z]+\*?").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}

/// Lower-cased alphanumeric runs
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Tokens longer than two characters that are not stop words
pub fn content_tokens(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| t.chars().count() > 2 && !is_stopword(t))
        .collect()
}

/// Distinct content tokens
pub fn token_set(text: &str) -> HashSet<String> {
    content_tokens(text).into_iter().collect()
}

/// Plain text of a LaTeX fragment: comments and citation commands removed,
/// `\cmd{arg}` unwrapped to `arg`, other control words and braces dropped,
/// whitespace collapsed.
pub fn strip_latex(text: &str) -> String {
    let without_comments = COMMENT_RE.replace_all(text, "$1");
    let without_cites = CITE_RE.replace_all(&without_comments, " ");
    let mut plain = ESCAPED_CHAR_RE.replace_all(&without_cites, "$1").into_owned();

    // Innermost arguments first, then their parents
    loop {
        let unwrapped = COMMAND_WITH_ARG_RE.replace_all(&plain, "$1").into_owned();
        if unwrapped == plain {
            break;
        }
        plain = unwrapped;
    }

    let plain = CONTROL_WORD_RE.replace_all(&plain, " ");
    let plain = plain.replace(['{', '}'], "").replace('~', " ");
    let plain = WHITESPACE_RE.replace_all(&plain, " ");
    // Removing a command before punctuation leaves "word ."
    plain
        .trim()
        .replace(" .", ".")
        .replace(" ,", ",")
}

pub fn has_digit(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit())
}

/// Whether `phrase` occurs in `text` on token boundaries, case-insensitively
pub fn contains_phrase(text: &str, phrase: &str) -> bool {
    let haystack = format!(" {} ", tokenize(text).join(" "));
    let needle = tokenize(phrase).join(" ");
    !needle.is_empty() && haystack.contains(&format!(" {} ", needle))
}

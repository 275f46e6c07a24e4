//! LaTeX manuscript parsing
//!
//! Splits a manuscript into sentences carrying their byte spans and the
//! citation keys they reference.

use crate::text::strip_latex;
use once_cell::sync::Lazy;
use refscore_common::models::ParsedSentence;
use regex_lite::Regex;

/// Citation commands with up to two `[..]` qualifiers; group 1 is the key list
pub static CITE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\\(?:cite|parencite|textcite|footcite|citep|citet)\*?(?:\s*\[[^\]]*\]){0,2}\s*\{([^}]*)\}",
    )
    .unwrap()
});

/// Whole lines that carry document structure rather than prose
static STRUCTURAL_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*\\(?:documentclass|usepackage|section|subsection|subsubsection|chapter|paragraph|begin|end|label|title|author|date|maketitle|tableofcontents|bibliography|bibliographystyle|printbibliography|addbibresource|newcommand|renewcommand|includegraphics|centering)\*?(?:\[[^\]]*\])?(?:\{[^}]*\})*\s*$",
    )
    .unwrap()
});

/// Words ending in a period that do not end a sentence
const ABBREVIATIONS: &[&str] = &["al.", "e.g.", "i.e.", "cf.", "fig.", "eq.", "vs.", "etc."];

/// Parse LaTeX source into sentences in document order
pub fn parse_latex(source: &str) -> Vec<ParsedSentence> {
    let masked = mask(source);
    let bytes = masked.as_bytes();
    let mut sentences = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut i = 0usize;

    while i < bytes.len() {
        match bytes[i] {
            // Escaped character or control word start; never a terminator
            b'\\' => {
                i += 2;
                continue;
            }
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b'.' | b'?' | b'!' if depth == 0 => {
                let at_boundary = bytes.get(i + 1).map_or(true, |c| c.is_ascii_whitespace());
                if at_boundary && !(bytes[i] == b'.' && ends_with_abbreviation(&masked[start..=i])) {
                    push_sentence(source, &masked, start, i + 1, &mut sentences);
                    start = i + 1;
                }
            }
            b'\n' if paragraph_break_follows(source, i) => {
                push_sentence(source, &masked, start, i, &mut sentences);
                start = i + 1;
                depth = 0;
            }
            _ => {}
        }
        i += 1;
    }
    push_sentence(source, &masked, start, bytes.len(), &mut sentences);

    sentences
}

/// Citation keys in order of first appearance
pub fn extract_citation_keys(text: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for key in CITE_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .flat_map(|m| m.as_str().split(','))
        .map(str::trim)
        .filter(|k| !k.is_empty())
    {
        if !keys.iter().any(|k| k == key) {
            keys.push(key.to_string());
        }
    }
    keys
}

/// Whether any citation command in `text` lists `key`
pub fn cites_key(text: &str, key: &str) -> bool {
    citation_command_end(text, key).is_some()
}

/// Byte offset just past the first citation command listing `key`
pub fn citation_command_end(text: &str, key: &str) -> Option<usize> {
    CITE_RE.captures_iter(text).find_map(|c| {
        let listed = c.get(1)?.as_str().split(',').any(|k| k.trim() == key);
        if listed {
            c.get(0).map(|m| m.end())
        } else {
            None
        }
    })
}

/// Copy of `source` with comments and structural lines blanked out. Byte
/// offsets are preserved so spans index the original text.
fn mask(source: &str) -> String {
    let mut masked = String::with_capacity(source.len());

    for line in source.split_inclusive('\n') {
        let (body, newline) = match line.strip_suffix('\n') {
            Some(body) => (body, "\n"),
            None => (line, ""),
        };

        if STRUCTURAL_LINE_RE.is_match(body) {
            masked.push_str(&" ".repeat(body.len()));
        } else {
            let cut = comment_start(body).unwrap_or(body.len());
            masked.push_str(&body[..cut]);
            masked.push_str(&" ".repeat(body.len() - cut));
        }
        masked.push_str(newline);
    }

    masked
}

/// Offset of the first `%` not escaped as `\%`
fn comment_start(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'%' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// The newline at `pos` starts a blank line or a structural line
fn paragraph_break_follows(source: &str, pos: usize) -> bool {
    let rest = &source[pos + 1..];
    let next_line = rest.split('\n').next().unwrap_or("");
    next_line.trim().is_empty() || STRUCTURAL_LINE_RE.is_match(next_line)
}

fn ends_with_abbreviation(segment: &str) -> bool {
    let word = segment
        .rsplit(|c: char| c.is_whitespace() || c == '(' || c == '~')
        .next()
        .unwrap_or("");
    let lower = word.to_lowercase();

    if ABBREVIATIONS.contains(&lower.as_str()) {
        return true;
    }

    // Single-letter initial such as "J."
    let mut chars = word.chars();
    matches!((chars.next(), chars.next(), chars.next()), (Some(c), Some('.'), None) if c.is_uppercase())
}

/// Bounds come from the masked copy; the text is sliced from `source` so it
/// always equals `source[span]`, inline comments included.
fn push_sentence(source: &str, masked: &str, start: usize, end: usize, out: &mut Vec<ParsedSentence>) {
    let raw = &masked[start..end];
    let visible = raw.trim();
    if visible.is_empty() || strip_latex(visible).is_empty() {
        return;
    }

    let offset = start + (raw.len() - raw.trim_start().len());
    let span = (offset, offset + visible.len());
    out.push(ParsedSentence {
        text: source[span.0..span.1].to_string(),
        citations: extract_citation_keys(visible),
        span,
    });
}

//! Citation edits applied to manuscript and bibliography text

use crate::parser::{bibtex, latex};
use refscore_common::models::Reference;
use std::ops::Range;

/// Heading of the block appended when a sentence cannot be located
pub const ANNOTATION_HEADER: &str = "% RefScore: suggested citation";

/// Manuscript and bibliography after an edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEdit {
    pub manuscript: String,
    pub bibliography: String,
}

/// Deterministic BibTeX `@article` entry for `reference`
pub fn generate_bibtex(reference: &Reference) -> String {
    bibtex::render_entry(reference)
}

/// Replace whole-word uses of `old_key` with `new_ref.id` and upsert `new_ref`
/// into the bibliography.
pub fn update_files(old_key: &str, new_ref: &Reference, manuscript: &str, bibliography: &str) -> FileEdit {
    FileEdit {
        manuscript: replace_whole_word(manuscript, old_key, &new_ref.id),
        bibliography: bibtex::upsert_bibtex(bibliography, new_ref),
    }
}

/// Cite `new_ref` for a gap sentence.
///
/// The citation goes right after `trigger_phrase` inside the sentence, else
/// before the sentence's closing punctuation; a sentence that cannot be found
/// gets an annotation block at the end of the document. Nothing is inserted
/// when the key is already cited anywhere. The bibliography is always upserted.
pub fn auto_add_for_gap(
    sentence: &str,
    trigger_phrase: Option<&str>,
    new_ref: &Reference,
    manuscript: &str,
    bibliography: &str,
) -> FileEdit {
    let range = (!sentence.trim().is_empty())
        .then(|| manuscript.find(sentence).map(|start| start..start + sentence.len()))
        .flatten();

    match range {
        Some(range) => auto_add_at(range, trigger_phrase, new_ref, manuscript, bibliography),
        None => {
            let bibliography = bibtex::upsert_bibtex(bibliography, new_ref);
            if latex::cites_key(manuscript, &new_ref.id) {
                return FileEdit {
                    manuscript: manuscript.to_string(),
                    bibliography,
                };
            }
            FileEdit {
                manuscript: append_annotation(manuscript, sentence, &new_ref.id),
                bibliography,
            }
        }
    }
}

/// `auto_add_for_gap` for a sentence already located at `range`
pub fn auto_add_at(
    range: Range<usize>,
    trigger_phrase: Option<&str>,
    new_ref: &Reference,
    manuscript: &str,
    bibliography: &str,
) -> FileEdit {
    let bibliography = bibtex::upsert_bibtex(bibliography, new_ref);
    if latex::cites_key(manuscript, &new_ref.id) {
        return FileEdit {
            manuscript: manuscript.to_string(),
            bibliography,
        };
    }

    let citation = format!(" \\cite{{{}}}", new_ref.id);
    let at = insertion_point(manuscript, range, trigger_phrase);

    let mut edited = String::with_capacity(manuscript.len() + citation.len());
    edited.push_str(&manuscript[..at]);
    edited.push_str(&citation);
    edited.push_str(&manuscript[at..]);

    FileEdit {
        manuscript: edited,
        bibliography,
    }
}

/// Insert `marker` right after the citation command citing `key` within
/// `range`. `None` when no such command exists or the marker is already there.
pub fn append_marker(manuscript: &str, range: Range<usize>, key: &str, marker: &str) -> Option<String> {
    let sentence = manuscript.get(range.clone())?;
    let at = range.start + latex::citation_command_end(sentence, key)?;
    if manuscript[at..].starts_with(marker) {
        return None;
    }

    let mut edited = String::with_capacity(manuscript.len() + marker.len());
    edited.push_str(&manuscript[..at]);
    edited.push_str(marker);
    edited.push_str(&manuscript[at..]);
    Some(edited)
}

/// Replace occurrences of `old` not embedded in a longer key
pub fn replace_whole_word(text: &str, old: &str, new: &str) -> String {
    if old.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (start, _) in text.match_indices(old) {
        let end = start + old.len();
        let before_ok = text[..start].chars().next_back().map_or(true, |c| !is_key_char(c));
        let after_ok = text[end..].chars().next().map_or(true, |c| !is_key_char(c));
        if before_ok && after_ok && start >= last {
            out.push_str(&text[last..start]);
            out.push_str(new);
            last = end;
        }
    }
    out.push_str(&text[last..]);
    out
}

fn is_key_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | ':')
}

/// Byte offset for the new citation inside `range`
fn insertion_point(manuscript: &str, range: Range<usize>, trigger_phrase: Option<&str>) -> usize {
    let sentence = &manuscript[range.clone()];

    if let Some(trigger) = trigger_phrase.map(str::trim).filter(|t| !t.is_empty()) {
        if let Some(end) = find_bounded(sentence, trigger) {
            return range.start + end;
        }
    }

    let trimmed = sentence.trim_end();
    match trimmed.chars().next_back() {
        Some('.' | '?' | '!') => range.start + trimmed.len() - 1,
        _ => range.start + trimmed.len(),
    }
}

/// End offset of the first case-insensitive `phrase` match in `text` that is
/// not part of a longer word
fn find_bounded(text: &str, phrase: &str) -> Option<usize> {
    // ASCII lower-casing keeps byte offsets aligned with the original
    let haystack = text.to_ascii_lowercase();
    let needle = phrase.to_ascii_lowercase();
    haystack.match_indices(&needle).find_map(|(start, _)| {
        let end = start + needle.len();
        let before_ok = haystack[..start].chars().next_back().map_or(true, |c| !c.is_alphanumeric());
        let after_ok = haystack[end..].chars().next().map_or(true, |c| !c.is_alphanumeric());
        (before_ok && after_ok).then_some(end)
    })
}

fn append_annotation(manuscript: &str, sentence: &str, key: &str) -> String {
    let excerpt: String = sentence.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut edited = manuscript.trim_end().to_string();
    edited.push_str("\n\n");
    edited.push_str(ANNOTATION_HEADER);
    edited.push('\n');
    if !excerpt.is_empty() {
        edited.push_str(&format!("% for: {}\n", excerpt));
    }
    edited.push_str(&format!("\\cite{{{}}}\n", key));
    edited
}

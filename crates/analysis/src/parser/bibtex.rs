//! BibTeX parsing, rendering and upsert

use once_cell::sync::Lazy;
use refscore_common::models::Reference;
use refscore_common::provider::normalize_doi;
use regex_lite::Regex;
use std::collections::HashMap;
use tracing::debug;

static AUTHOR_SEPARATOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s+and\s+").unwrap());
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Entry types that carry no reference
const NON_REFERENCE_TYPES: &[&str] = &["comment", "string", "preamble"];

/// One `@type{...}` block as it appears in the source
#[derive(Debug, Clone)]
struct RawEntry<'a> {
    kind: String,
    key: Option<String>,
    text: &'a str,
    body: Option<&'a str>,
}

/// Parse BibTeX source. Malformed entries are skipped.
pub fn parse_bibtex(source: &str) -> Vec<Reference> {
    scan_entries(source)
        .into_iter()
        .filter(|e| !NON_REFERENCE_TYPES.contains(&e.kind.as_str()))
        .filter_map(|entry| {
            let key = entry.key?;
            match parse_fields(entry.body.unwrap_or("")) {
                Some(fields) => Some(to_reference(key, fields)),
                None => {
                    debug!(key = %key, "Skipping malformed BibTeX entry");
                    None
                }
            }
        })
        .collect()
}

/// Render a deterministic `@article` entry
pub fn render_entry(reference: &Reference) -> String {
    let mut fields: Vec<(&str, String)> = Vec::new();

    if !reference.authors.is_empty() {
        fields.push(("author", reference.authors.join(" and ")));
    }
    if !reference.title.is_empty() {
        fields.push(("title", reference.title.clone()));
    }
    if !reference.venue.is_empty() {
        fields.push(("journal", reference.venue.clone()));
    }
    if reference.has_year() {
        fields.push(("year", reference.year.to_string()));
    }
    if let Some(doi) = reference.doi.as_deref().filter(|d| !d.is_empty()) {
        fields.push(("doi", doi.to_string()));
    }
    if !reference.abstract_text.is_empty() {
        fields.push(("abstract", reference.abstract_text.clone()));
    }

    let body = fields
        .into_iter()
        .map(|(name, value)| format!("  {} = {{{}}}", name, sanitize(&value)))
        .collect::<Vec<_>>()
        .join(",\n");

    if body.is_empty() {
        format!("@article{{{},\n}}", reference.id)
    } else {
        format!("@article{{{},\n{}\n}}", reference.id, body)
    }
}

/// Insert or replace `reference` in `existing`, then re-sort entries by key.
///
/// Entries other than the one being upserted are kept verbatim. Blocks without
/// a key (`@string`, `@preamble`, unparseable text) stay at the top in their
/// original order.
pub fn upsert_bibtex(existing: &str, reference: &Reference) -> String {
    let mut unkeyed: Vec<String> = Vec::new();
    let mut keyed: Vec<(String, String)> = Vec::new();

    for entry in scan_entries(existing) {
        match entry.key {
            Some(key) if !NON_REFERENCE_TYPES.contains(&entry.kind.as_str()) => {
                if key != reference.id {
                    keyed.push((key, entry.text.trim().to_string()));
                }
            }
            _ => {
                let text = entry.text.trim();
                if !text.is_empty() {
                    unkeyed.push(text.to_string());
                }
            }
        }
    }

    keyed.push((reference.id.clone(), render_entry(reference)));
    keyed.sort_by(|a, b| a.0.to_lowercase().cmp(&b.0.to_lowercase()).then_with(|| a.0.cmp(&b.0)));

    let mut blocks = unkeyed;
    blocks.extend(keyed.into_iter().map(|(_, text)| text));
    format!("{}\n", blocks.join("\n\n"))
}

/// Plain-text bibliography, sorted by first author then year
pub fn format_bibliography(references: &[Reference]) -> String {
    let mut sorted: Vec<&Reference> = references.iter().collect();
    sorted.sort_by(|a, b| {
        sort_name(a)
            .cmp(&sort_name(b))
            .then_with(|| a.year.cmp(&b.year))
            .then_with(|| a.id.cmp(&b.id))
    });

    sorted
        .into_iter()
        .map(format_reference)
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_reference(reference: &Reference) -> String {
    let names: Vec<String> = reference.authors.iter().map(|a| apa_name(a)).collect();
    let authors = match names.len() {
        0 => String::new(),
        1 => names[0].clone(),
        n => format!("{}, & {}", names[..n - 1].join(", "), names[n - 1]),
    };
    let year = if reference.has_year() {
        reference.year.to_string()
    } else {
        "n.d.".to_string()
    };

    let mut line = if authors.is_empty() {
        format!("{} ({}).", reference.title, year)
    } else {
        format!("{} ({}). {}.", authors, year, reference.title)
    };
    if !reference.venue.is_empty() {
        line.push_str(&format!(" {}.", reference.venue));
    }
    if let Some(doi) = &reference.doi {
        line.push_str(&format!(" https://doi.org/{}", doi));
    }
    line
}

/// "Jane Q. Smith" or "Smith, Jane Q." -> "Smith, J. Q."
fn apa_name(name: &str) -> String {
    let (surname, given) = split_name(name);
    let initials: Vec<String> = given
        .split(|c: char| c.is_whitespace() || c == '.')
        .filter_map(|part| part.chars().next())
        .map(|c| format!("{}.", c))
        .collect();

    if initials.is_empty() {
        surname.to_string()
    } else {
        format!("{}, {}", surname, initials.join(" "))
    }
}

fn split_name(name: &str) -> (&str, &str) {
    let name = name.trim();
    if let Some((surname, given)) = name.split_once(',') {
        return (surname.trim(), given.trim());
    }
    match name.rsplit_once(char::is_whitespace) {
        Some((given, surname)) => (surname.trim(), given.trim()),
        None => (name, ""),
    }
}

fn sort_name(reference: &Reference) -> String {
    reference
        .authors
        .first()
        .map(|a| split_name(a).0.to_lowercase())
        .unwrap_or_else(|| reference.title.to_lowercase())
}

/// Split source into `@` blocks. Text before the first `@` is dropped; an
/// unterminated block runs to the end of input and carries no key.
fn scan_entries(source: &str) -> Vec<RawEntry<'_>> {
    let bytes = source.as_bytes();
    let mut entries = Vec::new();
    let mut pos = 0;

    while let Some(offset) = source[pos..].find('@') {
        let at = pos + offset;
        let kind_end = source[at + 1..]
            .find(|c: char| !c.is_ascii_alphabetic())
            .map_or(source.len(), |i| at + 1 + i);
        let kind = source[at + 1..kind_end].to_lowercase();

        let open = kind_end + source[kind_end..].len() - source[kind_end..].trim_start().len();
        let close_char = match bytes.get(open) {
            Some(b'{') => b'}',
            Some(b'(') => b')',
            _ => {
                // Stray '@' in free text
                pos = at + 1;
                continue;
            }
        };

        let Some(close) = matching_close(bytes, open, close_char) else {
            entries.push(RawEntry {
                kind,
                key: None,
                text: &source[at..],
                body: None,
            });
            break;
        };

        let inner = &source[open + 1..close];
        let (key, body) = match inner.split_once(',') {
            Some((key, body)) => (key.trim(), Some(body)),
            None => (inner.trim(), None),
        };
        let key = (!key.is_empty() && !key.contains(char::is_whitespace) && body.is_some())
            .then(|| key.to_string());

        entries.push(RawEntry {
            kind,
            key,
            text: &source[at..=close],
            body,
        });
        pos = close + 1;
    }

    entries
}

fn matching_close(bytes: &[u8], open: usize, close_char: u8) -> Option<usize> {
    let open_char = bytes[open];
    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if b == open_char {
            depth += 1;
        } else if b == close_char {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// `name = value` pairs, names lower-cased. `None` on a syntax error.
fn parse_fields(body: &str) -> Option<HashMap<String, String>> {
    let bytes = body.as_bytes();
    let mut fields = HashMap::new();
    let mut i = 0;

    loop {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b',') {
            i += 1;
        }
        if i >= bytes.len() {
            return Some(fields);
        }

        let name_start = i;
        while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || matches!(bytes[i], b'_' | b'-')) {
            i += 1;
        }
        if i == name_start {
            return None;
        }
        let name = body[name_start..i].to_lowercase();

        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if bytes.get(i) != Some(&b'=') {
            return None;
        }
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }

        let value = match bytes.get(i)? {
            b'{' => {
                let close = matching_close(bytes, i, b'}')?;
                let value = &body[i + 1..close];
                i = close + 1;
                value
            }
            b'"' => {
                let mut depth = 0usize;
                let mut j = i + 1;
                loop {
                    match bytes.get(j)? {
                        b'{' => depth += 1,
                        b'}' => depth = depth.saturating_sub(1),
                        b'"' if depth == 0 && bytes[j - 1] != b'\\' => break,
                        _ => {}
                    }
                    j += 1;
                }
                let value = &body[i + 1..j];
                i = j + 1;
                value
            }
            _ => {
                let start = i;
                while i < bytes.len() && !matches!(bytes[i], b',' | b'\n') {
                    i += 1;
                }
                body[start..i].trim()
            }
        };

        fields.insert(name, clean_value(value));
    }
}

fn to_reference(key: String, mut fields: HashMap<String, String>) -> Reference {
    let authors = fields
        .remove("author")
        .map(|a| {
            AUTHOR_SEPARATOR_RE
                .split(&a)
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    let venue = ["journal", "booktitle", "publisher"]
        .iter()
        .find_map(|name| fields.get(*name).filter(|v| !v.is_empty()).cloned())
        .unwrap_or_default();

    let year = fields
        .get("year")
        .and_then(|y| YEAR_RE.find(y))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);

    Reference {
        id: key,
        title: fields.remove("title").unwrap_or_default(),
        authors,
        year,
        venue,
        abstract_text: fields.remove("abstract").unwrap_or_default(),
        doi: fields
            .remove("doi")
            .map(|d| normalize_doi(&d))
            .filter(|d| !d.is_empty()),
        citation_count: None,
        embedding: None,
        scores: None,
    }
}

fn clean_value(value: &str) -> String {
    let value = value.replace(['{', '}'], "").replace("\\&", "&");
    WHITESPACE_RE.replace_all(value.trim(), " ").into_owned()
}

fn sanitize(value: &str) -> String {
    let value = value.replace(['{', '}'], "");
    WHITESPACE_RE.replace_all(value.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
@comment{generated}
@article{Smith2020,
  author = {Smith, Jane and Raj Patel},
  title = {Quiet {Luxury} and Trust},
  journal = {Journal of Marketing},
  year = 2020,
  doi = {https://doi.org/10.1000/QL},
  abstract = "Consumers respond to {subtle} cues."
}

@inproceedings{Lee2019,
  author = "Lee, Min",
  title = {Signals},
  booktitle = {Proc. CHI},
  year = {circa 2019}
}

@article{Broken2021,
  title = {Missing equals}
  author {Nobody}
}
"#;

    #[test]
    fn test_parse_fields_and_venue() {
        let refs = parse_bibtex(SAMPLE);
        assert_eq!(refs.len(), 2);

        let smith = &refs[0];
        assert_eq!(smith.id, "Smith2020");
        assert_eq!(smith.authors, vec!["Smith, Jane", "Raj Patel"]);
        assert_eq!(smith.title, "Quiet Luxury and Trust");
        assert_eq!(smith.venue, "Journal of Marketing");
        assert_eq!(smith.year, 2020);
        assert_eq!(smith.doi.as_deref(), Some("10.1000/ql"));
        assert_eq!(smith.abstract_text, "Consumers respond to subtle cues.");

        let lee = &refs[1];
        assert_eq!(lee.venue, "Proc. CHI");
        assert_eq!(lee.year, 2019);
    }

    #[test]
    fn test_unterminated_entry_is_skipped() {
        let refs = parse_bibtex("@article{Ok1, title={A}}\n@article{Bad, title={B}");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].id, "Ok1");
    }

    #[test]
    fn test_render_entry_field_order() {
        let reference = Reference {
            id: "Smith2020Trust".into(),
            title: "Trust".into(),
            authors: vec!["Jane Smith".into(), "Raj Patel".into()],
            year: 2020,
            venue: "JM".into(),
            doi: Some("10.1/x".into()),
            ..Default::default()
        };
        assert_eq!(
            render_entry(&reference),
            "@article{Smith2020Trust,\n  author = {Jane Smith and Raj Patel},\n  title = {Trust},\n  journal = {JM},\n  year = {2020},\n  doi = {10.1/x}\n}"
        );
    }

    #[test]
    fn test_upsert_replaces_appends_and_sorts() {
        let existing = "@article{Zed2001,\n  title = {Z}\n}\n\n@article{Abe1999,\n  title = {Old}\n}\n";
        let updated = upsert_bibtex(
            existing,
            &Reference {
                id: "Abe1999".into(),
                title: "New".into(),
                ..Default::default()
            },
        );
        assert!(updated.contains("title = {New}"));
        assert!(!updated.contains("{Old}"));
        assert!(updated.find("Abe1999").unwrap() < updated.find("Zed2001").unwrap());

        let appended = upsert_bibtex(
            &updated,
            &Reference {
                id: "Mid2010".into(),
                ..Default::default()
            },
        );
        let order: Vec<String> = parse_bibtex(&appended).into_iter().map(|r| r.id).collect();
        assert_eq!(order, vec!["Abe1999", "Mid2010", "Zed2001"]);
        // Untouched entry kept verbatim
        assert!(appended.contains("@article{Zed2001,\n  title = {Z}\n}"));
    }

    #[test]
    fn test_upsert_into_empty() {
        let bib = upsert_bibtex(
            "",
            &Reference {
                id: "Smith2020Trust".into(),
                title: "Trust".into(),
                ..Default::default()
            },
        );
        assert!(bib.starts_with("@article{Smith2020Trust,"));
    }

    #[test]
    fn test_format_bibliography() {
        let refs = vec![
            Reference {
                id: "b".into(),
                title: "Later".into(),
                authors: vec!["Zoe Young".into()],
                year: 2021,
                ..Default::default()
            },
            Reference {
                id: "a".into(),
                title: "Trust".into(),
                authors: vec!["Jane Q. Smith".into(), "Patel, Raj".into()],
                year: 2020,
                venue: "JM".into(),
                doi: Some("10.1/x".into()),
                ..Default::default()
            },
        ];
        let text = format_bibliography(&refs);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "Smith, J. Q., & Patel, R. (2020). Trust. JM. https://doi.org/10.1/x"
        );
        assert_eq!(lines[1], "Young, Z. (2021). Later.");
    }
}

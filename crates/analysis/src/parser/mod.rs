//! Lexical parsers for manuscripts and bibliographies
//!
//! - LaTeX: sentences with spans and citation keys
//! - BibTeX: reference records, entry rendering, upsert

pub mod bibtex;
pub mod latex;

pub use bibtex::{format_bibliography, parse_bibtex, render_entry, upsert_bibtex};
pub use latex::{cites_key, extract_citation_keys, parse_latex};

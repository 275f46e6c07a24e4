//! Search query construction

use crate::entities::extract_entities;
use crate::text::{is_stopword, strip_latex, tokenize};

/// Terms kept in one query
const MAX_QUERY_TERMS: usize = 8;

/// Distinct non-stop-word tokens longer than four characters
pub fn keyword_terms(sentence: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for token in tokenize(&strip_latex(sentence)) {
        if token.chars().count() > 4 && !is_stopword(&token) && !terms.contains(&token) {
            terms.push(token);
        }
    }
    terms.truncate(MAX_QUERY_TERMS);
    terms
}

/// Query for a gap search: keywords, else entities, else the cleaned
/// sentence when it still has a word longer than four characters. Empty when
/// nothing usable remains.
pub fn gap_query(sentence: &str) -> String {
    let keywords = keyword_terms(sentence);
    if !keywords.is_empty() {
        return keywords.join(" ");
    }

    let entities = extract_entities(sentence);
    if !entities.is_empty() {
        return entities
            .into_iter()
            .take(MAX_QUERY_TERMS)
            .collect::<Vec<_>>()
            .join(" ");
    }

    // Only stop words can be long here
    let cleaned = strip_latex(sentence);
    let tokens = tokenize(&cleaned);
    if tokens.iter().any(|t| t.chars().count() > 4) {
        return tokens.join(" ");
    }
    String::new()
}

/// Queries for a better-source search: sentence keywords, sentence entities,
/// and the non-generic part of the current reference's title. Empty and
/// duplicate queries are dropped.
pub fn better_source_queries(sentence: &str, current_title: &str, generic_titles: &[String]) -> Vec<String> {
    let generic_words: Vec<String> = generic_titles.iter().flat_map(|g| tokenize(g)).collect();

    let title_terms: Vec<String> = tokenize(&strip_latex(current_title))
        .into_iter()
        .filter(|t| t.chars().count() > 2 && !is_stopword(t) && !generic_words.contains(t))
        .take(MAX_QUERY_TERMS)
        .collect();

    let entities: Vec<String> = extract_entities(sentence)
        .into_iter()
        .take(MAX_QUERY_TERMS)
        .collect();

    let mut queries: Vec<String> = Vec::new();
    for query in [
        keyword_terms(sentence).join(" "),
        entities.join(" "),
        title_terms.join(" "),
    ] {
        let query = query.trim().to_string();
        if !query.is_empty() && !queries.contains(&query) {
            queries.push(query);
        }
    }
    queries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_terms() {
        assert_eq!(
            keyword_terms(r"It remains unknown whether quiet luxury cues affect trust \cite{X1}."),
            vec!["remains", "unknown", "quiet", "luxury", "affect", "trust"]
        );
    }

    #[test]
    fn test_gap_query_fallbacks() {
        assert_eq!(gap_query("Quiet luxury matters."), "quiet luxury matters");
        // No long words: entities
        assert_eq!(gap_query("We saw NLP do it."), "NLP");
        // Long words are all stop words: the cleaned sentence
        assert_eq!(gap_query("However, where were they?"), "however where were they");
        // No long words, no entities
        assert_eq!(gap_query("Cats eat fish."), "");
        assert_eq!(gap_query("It is so."), "");
        assert_eq!(gap_query(""), "");
    }

    #[test]
    fn test_better_source_queries() {
        let generic = vec!["editorial".to_string(), "table of contents".to_string()];
        let queries = better_source_queries(
            "Consumer trust in NLP chatbots declined.",
            "Editorial: trust and chatbots",
            &generic,
        );
        assert_eq!(queries, vec!["consumer trust chatbots declined", "NLP", "trust chatbots"]);
    }

    #[test]
    fn test_duplicate_queries_collapse() {
        let queries = better_source_queries("Loyalty programs.", "Loyalty programs", &[]);
        assert_eq!(queries, vec!["loyalty programs"]);
    }
}

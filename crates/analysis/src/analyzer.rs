//! Full analysis pass
//!
//! parse -> enrich -> vectorize -> score -> flag -> aggregate

use crate::entities::extract_entities;
use crate::parser::{parse_bibtex, parse_latex};
use crate::scoring::{compute_weighted_total, ScoringEngine};
use crate::text::{contains_phrase, has_digit, strip_latex};
use crate::vector::{cosine, TfIdfModel};
use refscore_common::errors::Result;
use refscore_common::metrics;
use refscore_common::models::{AnalysisResult, AnalyzedSentence, DimensionScores, Reference};
use refscore_common::provider::normalize_doi;
use refscore_common::MetadataProvider;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Phrases marking an open research question. Longer phrases come first so
/// the most specific marker becomes the trigger.
pub const GAP_MARKERS: &[&str] = &[
    "not well understood",
    "little is known",
    "remains unknown",
    "remains unclear",
    "remains to be",
    "further research",
    "has not been",
    "few studies",
    "unexplored",
    "lack of",
    "unknown",
    "unclear",
    "gap",
];

/// Phrases marking a claim that needs support
pub const CLAIM_MARKERS: &[&str] = &[
    "studies show",
    "research suggests",
    "has been shown",
    "evidence",
    "demonstrated",
    "significant",
    "significantly",
    "increase",
    "increased",
    "decrease",
    "decreased",
];

pub struct Analyzer {
    provider: Arc<dyn MetadataProvider>,
    engine: ScoringEngine,
}

impl Analyzer {
    pub fn new(provider: Arc<dyn MetadataProvider>, engine: ScoringEngine) -> Self {
        Self { provider, engine }
    }

    /// Analyze a LaTeX manuscript against its BibTeX bibliography.
    ///
    /// Fails only when the DOI batch lookup fails.
    #[instrument(skip_all, fields(manuscript_len = manuscript.len(), provider = self.provider.name()))]
    pub async fn analyze(&self, manuscript: &str, bibliography: &str) -> Result<AnalysisResult> {
        let start = Instant::now();

        let parsed = parse_latex(manuscript);
        let mut references: BTreeMap<String, Reference> = BTreeMap::new();
        for reference in parse_bibtex(bibliography) {
            references.entry(reference.id.clone()).or_insert(reference);
        }

        self.enrich(&mut references).await?;

        let mut sentences: Vec<AnalyzedSentence> = parsed.iter().map(AnalyzedSentence::from_parsed).collect();
        let plain: Vec<String> = sentences.iter().map(|s| strip_latex(&s.text)).collect();

        let mut corpus: Vec<String> = plain.clone();
        corpus.extend(references.values().map(Reference::searchable_text));
        let model = TfIdfModel::fit(&corpus);

        let reference_vectors: BTreeMap<&str, _> = references
            .iter()
            .map(|(key, r)| (key.as_str(), model.transform(&r.searchable_text())))
            .collect();

        let mut all_scores: Vec<DimensionScores> = Vec::new();
        let mut unresolved: BTreeSet<String> = BTreeSet::new();

        for (sentence, text) in sentences.iter_mut().zip(&plain) {
            sentence.entities = extract_entities(&sentence.text);
            sentence.has_numbers = has_digit(text);
            sentence.trigger_phrase = GAP_MARKERS
                .iter()
                .find(|marker| contains_phrase(text, marker))
                .map(|m| m.to_string());
            sentence.gap_identified = sentence.trigger_phrase.is_some();
            sentence.is_high_impact =
                sentence.has_numbers || CLAIM_MARKERS.iter().any(|marker| contains_phrase(text, marker));
            sentence.is_missing_citation = sentence.is_high_impact && sentence.citations.is_empty();

            if sentence.citations.is_empty() {
                continue;
            }

            let sentence_vector = model.transform(text);
            let mut scores = BTreeMap::new();
            for key in &sentence.citations {
                let (Some(reference), Some(vector)) = (references.get(key), reference_vectors.get(key.as_str()))
                else {
                    unresolved.insert(key.clone());
                    continue;
                };
                let alignment = cosine(&sentence_vector, vector);
                let pair = self
                    .engine
                    .score_citation(&sentence.text, &sentence.entities, reference, alignment);
                all_scores.push(pair);
                scores.insert(key.clone(), pair);
            }
            if !scores.is_empty() {
                sentence.scores = Some(scores);
            }
        }

        for reference in references.values_mut() {
            reference.embedding = Some(model.transform_dense(&reference.searchable_text()));
        }

        let dimension_scores = DimensionScores::mean(&all_scores).unwrap_or_default();
        let overall_score = if all_scores.is_empty() {
            0.0
        } else {
            compute_weighted_total(&dimension_scores, self.engine.weights()) * 100.0
        };

        let gaps: Vec<String> = sentences
            .iter()
            .filter(|s| s.gap_identified)
            .map(|s| s.text.clone())
            .collect();
        let missing = sentences.iter().filter(|s| s.is_missing_citation).count();
        let unresolved_citations: Vec<String> = unresolved.into_iter().collect();

        let summary = format!(
            "{} sentences analyzed, {} citations scored, {} missing citations, {} research gaps, {} unresolved citation keys",
            sentences.len(),
            all_scores.len(),
            missing,
            gaps.len(),
            unresolved_citations.len()
        );

        let elapsed = start.elapsed();
        metrics::record_analysis(elapsed.as_secs_f64(), sentences.len());
        info!(
            sentences = sentences.len(),
            references = references.len(),
            scored = all_scores.len(),
            overall_score,
            duration_ms = elapsed.as_millis() as u64,
            "Analysis complete"
        );

        Ok(AnalysisResult {
            analyzed_sentences: sentences,
            references,
            overall_score,
            dimension_scores,
            summary,
            gaps,
            unresolved_citations,
        })
    }

    /// Fill missing metadata from the provider for references with a DOI
    async fn enrich(&self, references: &mut BTreeMap<String, Reference>) -> Result<()> {
        let dois: Vec<String> = references.values().filter_map(|r| r.doi.clone()).collect();
        if dois.is_empty() {
            return Ok(());
        }

        let found = self.provider.batch_lookup(&dois).await?;
        let mut enriched = 0usize;

        for reference in references.values_mut() {
            let Some(doi) = reference.doi.as_deref() else {
                continue;
            };
            let Some(remote) = found.get(&normalize_doi(doi)) else {
                continue;
            };

            if reference.title.is_empty() {
                reference.title = remote.title.clone();
            }
            if reference.authors.is_empty() {
                reference.authors = remote.authors.clone();
            }
            if reference.abstract_text.is_empty() {
                reference.abstract_text = remote.abstract_text.clone();
            }
            if reference.venue.is_empty() {
                reference.venue = remote.venue.clone();
            }
            if reference.citation_count.is_none() {
                reference.citation_count = remote.citation_count;
            }
            if !reference.has_year() {
                reference.year = remote.year;
            }
            enriched += 1;
        }

        debug!(requested = dois.len(), enriched, "References enriched");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refscore_common::config::ScoringWeights;
    use refscore_common::provider::StaticProvider;
    use refscore_common::AppError;

    const MANUSCRIPT: &str = r"Consumers trust quiet luxury brands \cite{Smith2020}.
Studies show that sales increased by 40\% in 2021.
It remains unknown whether resale markets matter.
Older work agrees \cite{Old1990, Ghost2000}.";

    const BIBLIOGRAPHY: &str = r"@article{Smith2020,
  author = {Jane Smith},
  title = {Quiet luxury and consumer trust},
  year = {2020},
  doi = {10.1000/ql}
}

@article{Old1990,
  author = {Ann Old},
  title = {Catalogue retail},
  year = {1990}
}";

    fn analyzer(provider: StaticProvider) -> Analyzer {
        Analyzer::new(Arc::new(provider), ScoringEngine::with_year(ScoringWeights::equal(), 2025))
    }

    fn remote() -> StaticProvider {
        StaticProvider::new(vec![Reference {
            id: "Smith2020".into(),
            title: "Quiet luxury and consumer trust".into(),
            abstract_text: "Consumers trust quiet luxury brands more than loud ones.".into(),
            citation_count: Some(300),
            doi: Some("10.1000/ql".into()),
            ..Default::default()
        }])
    }

    #[tokio::test]
    async fn test_flags_and_scores() {
        let result = analyzer(remote()).analyze(MANUSCRIPT, BIBLIOGRAPHY).await.unwrap();
        assert_eq!(result.analyzed_sentences.len(), 4);

        let cited = &result.analyzed_sentences[0];
        let scores = cited.score_for("Smith2020").unwrap();
        assert!(scores.alignment > 0.4);
        assert!(!cited.is_missing_citation);

        let claim = &result.analyzed_sentences[1];
        assert!(claim.is_high_impact);
        assert!(claim.has_numbers);
        assert!(claim.is_missing_citation);

        let gap = &result.analyzed_sentences[2];
        assert!(gap.gap_identified);
        assert_eq!(gap.trigger_phrase.as_deref(), Some("remains unknown"));
        assert_eq!(result.gaps, vec![gap.text.clone()]);

        let old = &result.analyzed_sentences[3];
        assert!(old.score_for("Old1990").unwrap().recency < 0.2);
        assert!(old.score_for("Ghost2000").is_none());
        assert_eq!(result.unresolved_citations, vec!["Ghost2000".to_string()]);
    }

    #[tokio::test]
    async fn test_enrichment_fills_missing_fields() {
        let result = analyzer(remote()).analyze(MANUSCRIPT, BIBLIOGRAPHY).await.unwrap();
        let smith = result.reference("Smith2020").unwrap();
        assert_eq!(smith.citation_count, Some(300));
        assert!(smith.abstract_text.starts_with("Consumers trust"));
        assert!(smith.embedding.is_some());
    }

    #[tokio::test]
    async fn test_aggregate_scores_are_unit_scale() {
        let result = analyzer(remote()).analyze(MANUSCRIPT, BIBLIOGRAPHY).await.unwrap();
        assert!(result.overall_score > 0.0 && result.overall_score <= 100.0);
        assert!(result.dimension_scores.alignment <= 1.0);
        assert!(result.summary.contains("4 sentences analyzed"));
        assert!(result.summary.contains("1 unresolved"));
    }

    #[tokio::test]
    async fn test_batch_lookup_failure_is_hard_error() {
        let err = analyzer(StaticProvider::failing())
            .analyze(MANUSCRIPT, BIBLIOGRAPHY)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BatchLookup { .. }));
    }

    #[tokio::test]
    async fn test_no_dois_skips_lookup() {
        let result = analyzer(StaticProvider::failing())
            .analyze("Plain text here.", "")
            .await
            .unwrap();
        assert_eq!(result.overall_score, 0.0);
        assert!(result.references.is_empty());
    }
}

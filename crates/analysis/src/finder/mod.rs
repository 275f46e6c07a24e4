//! Citation finder
//!
//! Builds search queries from a sentence, fans them out to the metadata
//! provider, filters and deduplicates candidates, and ranks them with the
//! scoring engine. Provider failures degrade to an empty result.

mod edit;
mod query;

pub use edit::{
    append_marker, auto_add_at, auto_add_for_gap, generate_bibtex, replace_whole_word, update_files,
    FileEdit, ANNOTATION_HEADER,
};
pub use query::{better_source_queries, gap_query, keyword_terms};

use crate::scoring::ScoringEngine;
use crate::vector::TfIdfModel;
use refscore_common::config::FinderConfig;
use refscore_common::metrics;
use refscore_common::models::{DimensionScores, Reference};
use refscore_common::MetadataProvider;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// A scored candidate
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    /// Reference with `scores` and `embedding` attached
    pub reference: Reference,
    pub scores: DimensionScores,
    /// Weighted total on the 0-100 scale
    pub total: f64,
}

pub struct CitationFinder {
    provider: Arc<dyn MetadataProvider>,
    engine: ScoringEngine,
    config: FinderConfig,
}

impl CitationFinder {
    pub fn new(provider: Arc<dyn MetadataProvider>, engine: ScoringEngine, config: FinderConfig) -> Self {
        Self {
            provider,
            engine,
            config,
        }
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    /// Sources for a sentence that lacks support, best first
    pub async fn find_sources_for_gap(&self, sentence: &str) -> Vec<Reference> {
        self.find_sources_for_gap_capped(sentence, self.config.gap_candidate_cap)
            .await
    }

    /// `find_sources_for_gap` retrieving at most `cap` candidates
    #[instrument(skip(self, sentence), fields(provider = self.provider.name()))]
    pub async fn find_sources_for_gap_capped(&self, sentence: &str, cap: usize) -> Vec<Reference> {
        let query = gap_query(sentence);
        if query.is_empty() {
            debug!("No usable query for gap search");
            return vec![];
        }

        let candidates = match self.provider.search(&query, cap).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, query = %query, "Gap search failed, continuing without sources");
                return vec![];
            }
        };
        debug!(query = %query, retrieved = candidates.len(), "Gap candidates retrieved");

        let candidates = dedupe(candidates);
        let ranked = self.score_and_rank_candidates(sentence, candidates);
        metrics::record_candidates_ranked("gap", ranked.len());

        ranked.into_iter().map(|c| c.reference).collect()
    }

    /// Sources likely to support `sentence` better than `current_ref`.
    ///
    /// With a `baseline_total` (0-100 scale), only candidates beating it by the
    /// configured margin are returned. When nothing qualifies the gap search
    /// is tried before giving up.
    #[instrument(skip(self, current_ref, sentence), fields(current = %current_ref.id, provider = self.provider.name()))]
    pub async fn find_better_sources(
        &self,
        current_ref: &Reference,
        sentence: &str,
        baseline_total: Option<f64>,
    ) -> Vec<Reference> {
        let queries = better_source_queries(sentence, &current_ref.title, &self.config.generic_titles);
        if queries.is_empty() {
            return self.find_sources_for_gap(sentence).await;
        }

        // One query at a time, each with an even share of the budget
        let per_query = (self.config.better_sources_budget / queries.len()).max(1);
        let mut candidates = Vec::new();
        for query in &queries {
            match self.provider.search(query, per_query).await {
                Ok(found) => {
                    debug!(query = %query, retrieved = found.len(), "Better-source candidates retrieved");
                    candidates.extend(found);
                }
                Err(e) => warn!(error = %e, query = %query, "Better-source query failed"),
            }
        }

        let candidates: Vec<Reference> = self
            .filter_candidates(candidates)
            .into_iter()
            .filter(|c| !is_same_work(c, current_ref))
            .collect();

        let mut ranked = self.rank(sentence, candidates);
        if let Some(baseline) = baseline_total {
            let threshold = baseline + self.config.min_improvement;
            ranked.retain(|c| c.total > threshold);
        }
        ranked.truncate(self.config.top_k);
        metrics::record_candidates_ranked("better", ranked.len());

        if ranked.is_empty() {
            info!("No better source qualified, falling back to gap search");
            return self
                .find_sources_for_gap(sentence)
                .await
                .into_iter()
                .filter(|c| !is_same_work(c, current_ref))
                .collect();
        }

        ranked.into_iter().map(|c| c.reference).collect()
    }

    /// Weighted total of `reference` for `sentence` on the ranking scale
    pub fn baseline_total(&self, sentence: &str, reference: &Reference) -> f64 {
        self.engine
            .weighted_total(&self.engine.calculate_score(sentence, reference))
    }

    /// Score every candidate against `sentence` and keep the top K. Ties keep
    /// input order.
    pub fn score_and_rank_candidates(&self, sentence: &str, candidates: Vec<Reference>) -> Vec<RankedCandidate> {
        let mut ranked = self.rank(sentence, candidates);
        ranked.truncate(self.config.top_k);
        ranked
    }

    /// Drop generic titles and short abstracts, then dedupe
    pub fn filter_candidates(&self, candidates: Vec<Reference>) -> Vec<Reference> {
        let kept: Vec<Reference> = candidates
            .into_iter()
            .filter(|c| !is_generic_title(&c.title, &self.config.generic_titles))
            .filter(|c| c.abstract_text.trim().chars().count() >= self.config.min_abstract_len)
            .collect();
        dedupe(kept)
    }

    /// Every candidate scored and stably sorted by descending total. A fresh
    /// vector space is fit over this call's corpus only.
    fn rank(&self, sentence: &str, candidates: Vec<Reference>) -> Vec<RankedCandidate> {
        if candidates.is_empty() {
            return vec![];
        }

        let mut corpus: Vec<String> = Vec::with_capacity(candidates.len() + 1);
        corpus.push(sentence.to_string());
        corpus.extend(candidates.iter().map(|c| c.abstract_text.clone()));
        let model = TfIdfModel::fit(&corpus);

        let mut ranked: Vec<RankedCandidate> = candidates
            .into_iter()
            .map(|mut reference| {
                let scores = self.engine.calculate_score(sentence, &reference);
                let total = self.engine.weighted_total(&scores);
                reference.scores = Some(scores);
                RankedCandidate {
                    reference,
                    scores,
                    total,
                }
            })
            .collect();

        ranked.sort_by(|a, b| b.total.partial_cmp(&a.total).unwrap_or(std::cmp::Ordering::Equal));

        for candidate in ranked.iter_mut().take(self.config.top_k) {
            candidate.reference.embedding =
                Some(model.transform_dense(&candidate.reference.abstract_text));
        }

        ranked
    }
}

/// Keep the first candidate for each (lower-cased DOI, lower-cased title)
pub fn dedupe(candidates: Vec<Reference>) -> Vec<Reference> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| {
            let doi = c.doi.as_deref().unwrap_or("").trim().to_lowercase();
            let title = c.title.trim().to_lowercase();
            seen.insert((doi, title))
        })
        .collect()
}

/// Title equals a generic pattern or starts with one followed by a
/// non-alphanumeric character
pub fn is_generic_title(title: &str, patterns: &[String]) -> bool {
    let title = title.trim().to_lowercase();
    if title.is_empty() {
        return true;
    }
    patterns.iter().any(|pattern| {
        let pattern = pattern.trim().to_lowercase();
        !pattern.is_empty()
            && title.strip_prefix(&pattern).is_some_and(|rest| {
                rest.chars().next().map_or(true, |c| !c.is_alphanumeric())
            })
    })
}

fn is_same_work(candidate: &Reference, current: &Reference) -> bool {
    match (&candidate.doi, &current.doi) {
        (Some(a), Some(b)) if a.eq_ignore_ascii_case(b) => true,
        _ => {
            !current.title.trim().is_empty()
                && candidate.title.trim().eq_ignore_ascii_case(current.title.trim())
        }
    }
}

//! Six-dimension relevance scoring
//!
//! Two producers share the `DimensionScores` shape on different scales:
//! - `calculate_score` ranks search candidates on a 0-100 scale
//! - `score_citation` rates the manuscript's own citations on a 0-1 scale
//!
//! Thresholds written against one scale must not be applied to the other.

use crate::entities::count_acronyms;
use crate::text::{has_digit, strip_latex, token_set};
use chrono::Datelike;
use refscore_common::config::ScoringWeights;
use refscore_common::models::{Dimension, DimensionScores, Reference};

/// Keywords signalling methodological content
pub const METHOD_KEYWORDS: &[&str] = &[
    "method",
    "approach",
    "algorithm",
    "framework",
    "model",
    "experiment",
    "evaluation",
    "metric",
    "pipeline",
    "procedure",
    "randomized",
];

/// Citation count mapping to a unit authority of 1.0
const AUTHORITY_SATURATION: f64 = 10_000.0;

/// Age in years at which unit recency reaches 0
const RECENCY_HORIZON_YEARS: f64 = 20.0;

#[derive(Debug, Clone)]
pub struct ScoringEngine {
    weights: ScoringWeights,
    current_year: i32,
}

impl ScoringEngine {
    pub fn new(weights: ScoringWeights) -> Self {
        Self::with_year(weights, chrono::Utc::now().year())
    }

    /// Engine with a fixed reference year for recency
    pub fn with_year(weights: ScoringWeights, current_year: i32) -> Self {
        Self {
            weights,
            current_year,
        }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    pub fn current_year(&self) -> i32 {
        self.current_year
    }

    /// Candidate-ranking scores, each dimension in [0, 100]
    pub fn calculate_score(&self, sentence: &str, candidate: &Reference) -> DimensionScores {
        let context = token_set(&strip_latex(sentence));
        let candidate_tokens = token_set(&candidate.searchable_text());
        let union = context.union(&candidate_tokens).count();
        let alignment = if union == 0 {
            0.0
        } else {
            context.intersection(&candidate_tokens).count() as f64 / union as f64 * 100.0
        };

        let numbers = if has_digit(&candidate.abstract_text) { 100.0 } else { 40.0 };
        let entities = (50.0 + 10.0 * count_acronyms(&candidate.abstract_text) as f64).min(100.0);
        let methods = (50.0 + 10.0 * method_matches(&candidate.searchable_text()) as f64).min(100.0);

        let recency = if candidate.has_year() {
            match self.current_year - candidate.year {
                age if age <= 2 => 100.0,
                age if age <= 5 => 90.0,
                age if age <= 10 => 70.0,
                _ => 50.0,
            }
        } else {
            50.0
        };

        let authority = match candidate.citation_count.unwrap_or(0) {
            c if c > 1000 => 100.0,
            c if c > 100 => 90.0,
            c if c > 50 => 80.0,
            c if c > 10 => 70.0,
            _ => 60.0,
        };

        DimensionScores {
            alignment,
            numbers,
            entities,
            methods,
            recency,
            authority,
        }
        .clamped(0.0, 100.0)
    }

    /// Unit-scale scores for a citation already in the manuscript.
    ///
    /// `alignment` is the TF-IDF cosine between the sentence and the
    /// reference, computed by the caller's fitted model.
    pub fn score_citation(
        &self,
        sentence: &str,
        sentence_entities: &[String],
        reference: &Reference,
        alignment: f64,
    ) -> DimensionScores {
        let plain = strip_latex(sentence);
        let reference_text = reference.searchable_text();
        let reference_lower = reference_text.to_lowercase();

        let numbers = match (has_digit(&plain), has_digit(&reference.abstract_text)) {
            (true, true) => 1.0,
            (false, false) => 0.5,
            _ => 0.3,
        };

        let entities = if sentence_entities.is_empty() {
            0.5
        } else {
            let matched = sentence_entities
                .iter()
                .filter(|e| reference_lower.contains(&e.to_lowercase()))
                .count();
            matched as f64 / sentence_entities.len() as f64
        };

        let methods = (0.5 + 0.1 * method_matches(&reference_text) as f64).min(1.0);

        let recency = if reference.has_year() {
            let age = (self.current_year - reference.year).max(0) as f64;
            1.0 - age / RECENCY_HORIZON_YEARS
        } else {
            0.5
        };

        let authority = match reference.citation_count {
            Some(count) => (1.0 + count as f64).ln() / (1.0 + AUTHORITY_SATURATION).ln(),
            None => 0.5,
        };

        DimensionScores {
            alignment,
            numbers,
            entities,
            methods,
            recency,
            authority,
        }
        .clamped(0.0, 1.0)
    }

    /// Weighted total under this engine's weights
    pub fn weighted_total(&self, scores: &DimensionScores) -> f64 {
        compute_weighted_total(scores, &self.weights)
    }
}

/// Weight-normalized sum over the six dimensions; 0 when the weights do not
/// sum to a positive value
pub fn compute_weighted_total(scores: &DimensionScores, weights: &ScoringWeights) -> f64 {
    let total_weight = weights.sum();
    if !(total_weight > 0.0) {
        return 0.0;
    }

    let weighted: f64 = Dimension::ALL
        .iter()
        .map(|&d| weight_of(weights, d) * scores.get(d))
        .sum();
    weighted / total_weight
}

fn weight_of(weights: &ScoringWeights, dimension: Dimension) -> f64 {
    match dimension {
        Dimension::Alignment => weights.alignment,
        Dimension::Numbers => weights.numbers,
        Dimension::Entities => weights.entities,
        Dimension::Methods => weights.methods,
        Dimension::Recency => weights.recency,
        Dimension::Authority => weights.authority,
    }
}

fn method_matches(text: &str) -> usize {
    let lower = text.to_lowercase();
    METHOD_KEYWORDS.iter().filter(|k| lower.contains(*k)).count()
}

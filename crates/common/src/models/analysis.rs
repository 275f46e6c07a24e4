//! Aggregate result of one analysis pass

use super::{AnalyzedSentence, DimensionScores, Reference};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub analyzed_sentences: Vec<AnalyzedSentence>,

    /// Bibliography keyed by citation key
    pub references: BTreeMap<String, Reference>,

    /// Weighted total of the aggregate scores, 0-100
    pub overall_score: f64,

    /// Per-dimension mean over every scored sentence/citation pair, 0-1
    pub dimension_scores: DimensionScores,

    pub summary: String,

    /// Text of every sentence flagged as a research gap
    pub gaps: Vec<String>,

    /// Keys cited in the manuscript but absent from the bibliography
    #[serde(default)]
    pub unresolved_citations: Vec<String>,
}

impl AnalysisResult {
    pub fn sentence(&self, index: usize) -> Option<&AnalyzedSentence> {
        self.analyzed_sentences.get(index)
    }

    pub fn reference(&self, key: &str) -> Option<&Reference> {
        self.references.get(key)
    }
}

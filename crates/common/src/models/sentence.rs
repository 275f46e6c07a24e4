//! Manuscript sentences

use super::{DimensionScores, Reference};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// A sentence as produced by the LaTeX parser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedSentence {
    /// Raw source text of the sentence
    pub text: String,

    /// Citation keys in order of first appearance
    pub citations: Vec<String>,

    /// Byte offsets `(start, end)` in the parsed manuscript
    pub span: (usize, usize),
}

/// One manuscript sentence after an analysis pass.
///
/// Identity is positional: `AnalysisResult::analyzed_sentences[i]`. The span and
/// fingerprint let later edits re-resolve the sentence when the text moved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedSentence {
    pub text: String,

    pub span: (usize, usize),

    /// SHA-256 of `text`, hex encoded
    pub fingerprint: String,

    pub citations: Vec<String>,

    #[serde(default)]
    pub entities: Vec<String>,

    #[serde(default)]
    pub has_numbers: bool,

    #[serde(default)]
    pub is_missing_citation: bool,

    #[serde(default)]
    pub is_high_impact: bool,

    #[serde(default)]
    pub gap_identified: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_phrase: Option<String>,

    /// Unit-scale scores keyed by citation key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<BTreeMap<String, DimensionScores>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_references: Option<Vec<Reference>>,
}

impl AnalyzedSentence {
    /// Start an analyzed sentence from its parsed form
    pub fn from_parsed(parsed: &ParsedSentence) -> Self {
        Self {
            fingerprint: fingerprint(&parsed.text),
            text: parsed.text.clone(),
            span: parsed.span,
            citations: parsed.citations.clone(),
            ..Default::default()
        }
    }

    /// Scores for one cited key, if computed
    pub fn score_for(&self, key: &str) -> Option<&DimensionScores> {
        self.scores.as_ref().and_then(|scores| scores.get(key))
    }
}

/// Hex SHA-256 of a sentence's text
pub fn fingerprint(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

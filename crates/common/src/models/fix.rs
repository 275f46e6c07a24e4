//! Fix actions emitted by the guided fix planner

use super::{fingerprint, AnalyzedSentence, Reference};
use serde::{Deserialize, Serialize};
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixType {
    MissingCitation,
    LowRelevance,
    Formatting,
    Gap,
    Outdated,
}

impl FixType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FixType::MissingCitation => "missing_citation",
            FixType::LowRelevance => "low_relevance",
            FixType::Formatting => "formatting",
            FixType::Gap => "gap",
            FixType::Outdated => "outdated",
        }
    }
}

/// Ordered high < medium < low
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    High,
    Medium,
    Low,
}

/// How an action changes the manuscript, interpreted by the planner's
/// `apply_fix`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FixMutation {
    /// Regex substitution confined to the target sentence
    RegexReplace { pattern: String, replacement: String },

    /// Cite a chosen source after `anchor` (or at the sentence end)
    InsertCitation { anchor: Option<String> },

    /// Swap every use of `old_key` for a chosen source
    ReplaceCitation { old_key: String },

    /// Put `marker` directly after the citation command citing `key`
    AppendMarker { key: String, marker: String },

    /// Needs a human
    Manual,
}

impl FixMutation {
    /// Whether applying needs a source picked from the suggestions
    pub fn requires_source(&self) -> bool {
        matches!(
            self,
            FixMutation::InsertCitation { .. } | FixMutation::ReplaceCitation { .. }
        )
    }
}

/// The sentence an action was planned against, as it looked at analysis time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceTarget {
    pub text: String,
    pub span: (usize, usize),
    pub fingerprint: String,
}

impl SentenceTarget {
    pub fn of(sentence: &AnalyzedSentence) -> Self {
        Self {
            text: sentence.text.clone(),
            span: sentence.span,
            fingerprint: sentence.fingerprint.clone(),
        }
    }

    /// Locate the sentence in the current manuscript: the recorded span if its
    /// content still hashes the same, else the first exact occurrence of the text.
    pub fn resolve(&self, manuscript: &str) -> Option<Range<usize>> {
        let (start, end) = self.span;
        if let Some(slice) = manuscript.get(start..end) {
            if fingerprint(slice) == self.fingerprint {
                return Some(start..end);
            }
        }
        if self.text.is_empty() {
            return None;
        }
        manuscript
            .find(&self.text)
            .map(|found| found..found + self.text.len())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixAction {
    pub id: String,

    pub sentence_index: usize,

    pub target: SentenceTarget,

    #[serde(rename = "type")]
    pub fix_type: FixType,

    pub severity: Severity,

    pub description: String,

    pub suggestion: String,

    pub auto_fix_available: bool,

    pub mutation: FixMutation,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_references: Option<Vec<Reference>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation_key: Option<String>,
}

/// Result of applying one action to the current texts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ApplyOutcome {
    Applied {
        manuscript: String,
        bibliography: String,
    },
    NoOp {
        notice: String,
    },
}

impl ApplyOutcome {
    pub fn no_op(notice: impl Into<String>) -> Self {
        ApplyOutcome::NoOp {
            notice: notice.into(),
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied { .. })
    }
}

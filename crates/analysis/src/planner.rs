//! Guided fix planner
//!
//! Turns an analysis result into a severity-ordered list of fix actions and
//! applies a chosen action to the current manuscript and bibliography.

use crate::finder::{self, CitationFinder};
use futures::future::join_all;
use once_cell::sync::Lazy;
use refscore_common::config::PlannerConfig;
use refscore_common::metrics;
use refscore_common::models::{
    AnalysisResult, AnalyzedSentence, ApplyOutcome, FixAction, FixMutation, FixType, Reference,
    SentenceTarget, Severity,
};
use regex_lite::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// "et al" without its period
pub const ET_AL_PATTERN: &str = r"\bet al([^.a-zA-Z]|$)";
pub const ET_AL_REPLACEMENT: &str = "et al.$1";

/// Two or more spaces after a non-space character
pub const MULTI_SPACE_PATTERN: &str = r"(\S) {2,}";
pub const MULTI_SPACE_REPLACEMENT: &str = "$1 ";

/// Inserted after the citation of an outdated source
pub const OUTDATED_MARKER: &str = r"\textsuperscript{[outdated]}";

static ET_AL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(ET_AL_PATTERN).unwrap());
static MULTI_SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(MULTI_SPACE_PATTERN).unwrap());

pub struct GuidedFixPlanner {
    finder: Arc<CitationFinder>,
    config: PlannerConfig,
}

impl GuidedFixPlanner {
    pub fn new(finder: Arc<CitationFinder>, config: PlannerConfig) -> Self {
        Self { finder, config }
    }

    /// Fix actions for every sentence, high severity first. Sentences are
    /// evaluated concurrently; order within a severity follows sentence order.
    #[instrument(skip_all, fields(sentences = analysis.analyzed_sentences.len()))]
    pub async fn generate_plan(&self, analysis: &AnalysisResult) -> Vec<FixAction> {
        let per_sentence = join_all(
            analysis
                .analyzed_sentences
                .iter()
                .enumerate()
                .map(|(index, sentence)| self.evaluate_sentence(index, sentence, analysis)),
        )
        .await;

        let mut missing_seen: HashSet<usize> = HashSet::new();
        let mut actions: Vec<FixAction> = per_sentence
            .into_iter()
            .flatten()
            .filter(|a| a.fix_type != FixType::MissingCitation || missing_seen.insert(a.sentence_index))
            .collect();

        // Stable: equal severities keep their relative order
        actions.sort_by_key(|a| a.severity);

        for action in &actions {
            metrics::record_fix_action(action.fix_type.as_str());
        }
        info!(actions = actions.len(), "Fix plan generated");
        actions
    }

    async fn evaluate_sentence(
        &self,
        index: usize,
        sentence: &AnalyzedSentence,
        analysis: &AnalysisResult,
    ) -> Vec<FixAction> {
        let target = SentenceTarget::of(sentence);
        let mut actions = Vec::new();

        let gap_suggestions = if sentence.is_missing_citation || sentence.gap_identified {
            self.gap_suggestions(sentence).await
        } else {
            vec![]
        };

        if sentence.is_missing_citation {
            actions.push(FixAction {
                id: format!("fix-{}-missing_citation", index),
                sentence_index: index,
                target: target.clone(),
                fix_type: FixType::MissingCitation,
                severity: Severity::High,
                description: "Claim without a supporting citation".into(),
                suggestion: "Cite one of the suggested sources".into(),
                auto_fix_available: true,
                mutation: FixMutation::InsertCitation {
                    anchor: sentence.trigger_phrase.clone(),
                },
                suggested_references: Some(gap_suggestions.clone()),
                citation_key: None,
            });
        }

        for key in &sentence.citations {
            let Some(scores) = sentence.score_for(key) else {
                continue;
            };

            if scores.alignment < self.config.low_relevance_threshold {
                let suggestions = match analysis.reference(key) {
                    Some(current) => {
                        let baseline = self.finder.baseline_total(&sentence.text, current);
                        self.limit(
                            self.finder
                                .find_better_sources(current, &sentence.text, Some(baseline))
                                .await,
                        )
                    }
                    None => vec![],
                };
                actions.push(FixAction {
                    id: format!("fix-{}-low_relevance-{}", index, key),
                    sentence_index: index,
                    target: target.clone(),
                    fix_type: FixType::LowRelevance,
                    severity: Severity::Medium,
                    description: format!("Citation {} is weakly aligned with the claim", key),
                    suggestion: "Replace it with a better-aligned source".into(),
                    auto_fix_available: true,
                    mutation: FixMutation::ReplaceCitation { old_key: key.clone() },
                    suggested_references: Some(suggestions),
                    citation_key: Some(key.clone()),
                });
            }

            if scores.recency < self.config.outdated_threshold {
                actions.push(FixAction {
                    id: format!("fix-{}-outdated-{}", index, key),
                    sentence_index: index,
                    target: target.clone(),
                    fix_type: FixType::Outdated,
                    severity: Severity::Low,
                    description: format!("Citation {} is outdated", key),
                    suggestion: "Mark it for an update or add a recent source".into(),
                    auto_fix_available: true,
                    mutation: FixMutation::AppendMarker {
                        key: key.clone(),
                        marker: OUTDATED_MARKER.into(),
                    },
                    suggested_references: None,
                    citation_key: Some(key.clone()),
                });
            }
        }

        if sentence.gap_identified {
            let auto = !gap_suggestions.is_empty();
            actions.push(FixAction {
                id: format!("fix-{}-gap", index),
                sentence_index: index,
                target: target.clone(),
                fix_type: FixType::Gap,
                severity: Severity::Medium,
                description: format!(
                    "Research gap signalled by \"{}\"",
                    sentence.trigger_phrase.as_deref().unwrap_or("gap marker")
                ),
                suggestion: "Support the gap statement with prior work".into(),
                auto_fix_available: auto,
                mutation: if auto {
                    FixMutation::InsertCitation {
                        anchor: sentence.trigger_phrase.clone(),
                    }
                } else {
                    FixMutation::Manual
                },
                suggested_references: Some(gap_suggestions),
                citation_key: None,
            });
        }

        if ET_AL_RE.is_match(&sentence.text) {
            actions.push(formatting_action(
                index,
                &target,
                "et_al",
                "\"et al\" is missing its period",
                ET_AL_PATTERN,
                ET_AL_REPLACEMENT,
            ));
        }

        if MULTI_SPACE_RE.is_match(&sentence.text) {
            actions.push(formatting_action(
                index,
                &target,
                "spacing",
                "Repeated spaces",
                MULTI_SPACE_PATTERN,
                MULTI_SPACE_REPLACEMENT,
            ));
        }

        debug!(index, actions = actions.len(), "Sentence evaluated");
        actions
    }

    /// Suggestions already on the sentence, else a fresh gap search
    async fn gap_suggestions(&self, sentence: &AnalyzedSentence) -> Vec<Reference> {
        match &sentence.suggested_references {
            Some(existing) if !existing.is_empty() => self.limit(existing.clone()),
            _ => self.limit(self.finder.find_sources_for_gap(&sentence.text).await),
        }
    }

    fn limit(&self, mut references: Vec<Reference>) -> Vec<Reference> {
        references.truncate(self.config.max_suggestions);
        references
    }
}

fn formatting_action(
    index: usize,
    target: &SentenceTarget,
    rule: &str,
    description: &str,
    pattern: &str,
    replacement: &str,
) -> FixAction {
    FixAction {
        id: format!("fix-{}-formatting-{}", index, rule),
        sentence_index: index,
        target: target.clone(),
        fix_type: FixType::Formatting,
        severity: Severity::Low,
        description: description.into(),
        suggestion: "Apply the formatting correction".into(),
        auto_fix_available: true,
        mutation: FixMutation::RegexReplace {
            pattern: pattern.into(),
            replacement: replacement.into(),
        },
        suggested_references: None,
        citation_key: None,
    }
}

/// Apply `action` to the current texts.
///
/// The target sentence is re-resolved first; when it can no longer be found,
/// or the mutation needs a source and none is available, nothing changes and
/// a notice is returned.
pub fn apply_fix(
    action: &FixAction,
    manuscript: &str,
    bibliography: &str,
    chosen: Option<&Reference>,
) -> ApplyOutcome {
    if action.mutation == FixMutation::Manual {
        return ApplyOutcome::no_op("This fix needs a manual edit");
    }

    let Some(range) = action.target.resolve(manuscript) else {
        return ApplyOutcome::no_op("The target sentence changed since the plan was generated");
    };

    let source = chosen.or_else(|| {
        action
            .suggested_references
            .as_ref()
            .and_then(|refs| refs.first())
    });
    if action.mutation.requires_source() && source.is_none() {
        return ApplyOutcome::no_op("Select a source to apply this fix");
    }

    match &action.mutation {
        FixMutation::RegexReplace { pattern, replacement } => {
            let re = match Regex::new(pattern) {
                Ok(re) => re,
                Err(e) => return ApplyOutcome::no_op(format!("Invalid fix pattern: {}", e)),
            };
            let sentence = &manuscript[range.clone()];
            let fixed = re.replace_all(sentence, replacement.as_str());
            if fixed == sentence {
                return ApplyOutcome::no_op("Nothing to change");
            }
            ApplyOutcome::Applied {
                manuscript: splice(manuscript, range, &fixed),
                bibliography: bibliography.to_string(),
            }
        }
        FixMutation::InsertCitation { anchor } => match source {
            Some(source) => {
                let edit = finder::auto_add_at(range, anchor.as_deref(), source, manuscript, bibliography);
                ApplyOutcome::Applied {
                    manuscript: edit.manuscript,
                    bibliography: edit.bibliography,
                }
            }
            None => ApplyOutcome::no_op("Select a source to apply this fix"),
        },
        FixMutation::ReplaceCitation { old_key } => match source {
            Some(source) => {
                let edit = finder::update_files(old_key, source, manuscript, bibliography);
                ApplyOutcome::Applied {
                    manuscript: edit.manuscript,
                    bibliography: edit.bibliography,
                }
            }
            None => ApplyOutcome::no_op("Select a source to apply this fix"),
        },
        FixMutation::AppendMarker { key, marker } => {
            match finder::append_marker(manuscript, range, key, marker) {
                Some(edited) => ApplyOutcome::Applied {
                    manuscript: edited,
                    bibliography: bibliography.to_string(),
                },
                None => ApplyOutcome::no_op(format!("Citation {} is already marked or missing", key)),
            }
        }
        FixMutation::Manual => ApplyOutcome::no_op("This fix needs a manual edit"),
    }
}

fn splice(text: &str, range: std::ops::Range<usize>, replacement: &str) -> String {
    let mut out = String::with_capacity(text.len() + replacement.len());
    out.push_str(&text[..range.start]);
    out.push_str(replacement);
    out.push_str(&text[range.end..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::ScoringEngine;
    use refscore_common::config::{FinderConfig, ScoringWeights};
    use refscore_common::models::{fingerprint, DimensionScores};
    use refscore_common::provider::StaticProvider;
    use std::collections::BTreeMap;

    fn planner(provider: StaticProvider) -> GuidedFixPlanner {
        let finder = CitationFinder::new(
            Arc::new(provider),
            ScoringEngine::with_year(ScoringWeights::equal(), 2025),
            FinderConfig::default(),
        );
        GuidedFixPlanner::new(Arc::new(finder), PlannerConfig::default())
    }

    fn sentence(text: &str, start: usize) -> AnalyzedSentence {
        AnalyzedSentence {
            text: text.into(),
            span: (start, start + text.len()),
            fingerprint: fingerprint(text),
            ..Default::default()
        }
    }

    fn scored(text: &str, key: &str, scores: DimensionScores) -> AnalyzedSentence {
        let mut s = sentence(text, 0);
        s.citations = vec![key.into()];
        s.scores = Some(BTreeMap::from([(key.to_string(), scores)]));
        s
    }

    fn suggestion() -> Reference {
        Reference {
            id: "Smith2020Trust".into(),
            title: "Quiet luxury and trust".into(),
            year: 2020,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_severity_ordering() {
        let outdated = scored(
            r"Old claim \cite{Old1990}.",
            "Old1990",
            DimensionScores { alignment: 0.9, recency: 0.0, ..Default::default() },
        );
        let weak = scored(
            r"Weak claim \cite{Weak2020}.",
            "Weak2020",
            DimensionScores { alignment: 0.1, recency: 0.9, ..Default::default() },
        );
        let mut missing = sentence("Sales rose 40 percent.", 0);
        missing.is_missing_citation = true;
        missing.suggested_references = Some(vec![suggestion()]);

        let analysis = AnalysisResult {
            analyzed_sentences: vec![outdated, weak, missing],
            ..Default::default()
        };

        let actions = planner(StaticProvider::default()).generate_plan(&analysis).await;
        let types: Vec<FixType> = actions.iter().map(|a| a.fix_type).collect();
        assert_eq!(
            types,
            vec![FixType::MissingCitation, FixType::LowRelevance, FixType::Outdated]
        );
        assert_eq!(actions[0].suggested_references.as_ref().unwrap()[0].id, "Smith2020Trust");
    }

    #[tokio::test]
    async fn test_formatting_actions() {
        let analysis = AnalysisResult {
            analyzed_sentences: vec![sentence("Smith et al claims  a  b.", 0)],
            ..Default::default()
        };
        let actions = planner(StaticProvider::default()).generate_plan(&analysis).await;
        assert_eq!(actions.len(), 2);
        assert!(actions.iter().all(|a| a.fix_type == FixType::Formatting && a.auto_fix_available));

        let manuscript = "Smith et al claims  a  b.";
        let ApplyOutcome::Applied { manuscript: fixed, .. } = apply_fix(&actions[0], manuscript, "", None) else {
            panic!("et al fix not applied");
        };
        assert_eq!(fixed, "Smith et al. claims  a  b.");

        let ApplyOutcome::Applied { manuscript: spaced, .. } = apply_fix(&actions[1], manuscript, "", None) else {
            panic!("spacing fix not applied");
        };
        assert_eq!(spaced, "Smith et al claims a b.");

        // The first edit changed the sentence, so the second no longer resolves
        assert!(!apply_fix(&actions[1], &fixed, "", None).is_applied());
    }

    #[test]
    fn test_et_al_pattern() {
        let re = Regex::new(ET_AL_PATTERN).unwrap();
        assert_eq!(re.replace_all("Lee et al claims", ET_AL_REPLACEMENT), "Lee et al. claims");
        assert_eq!(re.replace_all("Lee et al", ET_AL_REPLACEMENT), "Lee et al.");
        assert!(!re.is_match("Lee et al. claims"));
        assert!(!re.is_match("et alia"));
    }

    #[tokio::test]
    async fn test_one_missing_citation_per_sentence() {
        let mut missing = sentence("It remains unknown whether demand 40 rises.", 0);
        missing.is_missing_citation = true;
        missing.gap_identified = true;
        missing.trigger_phrase = Some("remains unknown".into());

        let analysis = AnalysisResult {
            analyzed_sentences: vec![missing],
            ..Default::default()
        };
        let actions = planner(StaticProvider::default()).generate_plan(&analysis).await;

        let missing_count = actions
            .iter()
            .filter(|a| a.fix_type == FixType::MissingCitation)
            .count();
        assert_eq!(missing_count, 1);
        let gap = actions.iter().find(|a| a.fix_type == FixType::Gap).unwrap();
        // No suggestions available: the gap needs a manual edit
        assert!(!gap.auto_fix_available);
        assert_eq!(gap.mutation, FixMutation::Manual);
    }

    #[test]
    fn test_apply_insert_citation() {
        let text = "It remains unknown whether quiet luxury cues affect trust.";
        let mut s = sentence(text, 0);
        s.trigger_phrase = Some("unknown".into());
        let action = FixAction {
            id: "fix-0-gap".into(),
            sentence_index: 0,
            target: SentenceTarget::of(&s),
            fix_type: FixType::Gap,
            severity: Severity::Medium,
            description: String::new(),
            suggestion: String::new(),
            auto_fix_available: true,
            mutation: FixMutation::InsertCitation { anchor: Some("unknown".into()) },
            suggested_references: Some(vec![suggestion()]),
            citation_key: None,
        };

        let ApplyOutcome::Applied { manuscript, bibliography } = apply_fix(&action, text, "", None) else {
            panic!("citation not inserted");
        };
        assert!(manuscript.contains(r"unknown \cite{Smith2020Trust} whether"));
        assert!(bibliography.contains("@article{Smith2020Trust"));

        // Applying again is a no-op on the manuscript
        let again = apply_fix(&action, &manuscript, &bibliography, None);
        match again {
            ApplyOutcome::Applied { manuscript: twice, .. } => {
                assert_eq!(twice.matches(r"\cite{Smith2020Trust}").count(), 1)
            }
            ApplyOutcome::NoOp { .. } => {}
        }
    }

    #[test]
    fn test_apply_without_source_or_target_is_no_op() {
        let text = "Sales rose 40 percent.";
        let action = FixAction {
            id: "fix-0-missing_citation".into(),
            sentence_index: 0,
            target: SentenceTarget::of(&sentence(text, 0)),
            fix_type: FixType::MissingCitation,
            severity: Severity::High,
            description: String::new(),
            suggestion: String::new(),
            auto_fix_available: true,
            mutation: FixMutation::InsertCitation { anchor: None },
            suggested_references: Some(vec![]),
            citation_key: None,
        };

        assert!(!apply_fix(&action, text, "", None).is_applied());
        assert!(!apply_fix(&action, "Completely rewritten.", "", Some(&suggestion())).is_applied());
        assert!(apply_fix(&action, text, "", Some(&suggestion())).is_applied());
    }

    #[test]
    fn test_apply_replace_and_marker() {
        let text = r"Weak claim \cite{Weak2020}.";
        let target = SentenceTarget::of(&sentence(text, 0));
        let base = FixAction {
            id: "fix-0".into(),
            sentence_index: 0,
            target,
            fix_type: FixType::LowRelevance,
            severity: Severity::Medium,
            description: String::new(),
            suggestion: String::new(),
            auto_fix_available: true,
            mutation: FixMutation::ReplaceCitation { old_key: "Weak2020".into() },
            suggested_references: None,
            citation_key: Some("Weak2020".into()),
        };

        let ApplyOutcome::Applied { manuscript, bibliography } =
            apply_fix(&base, text, "", Some(&suggestion()))
        else {
            panic!("replacement not applied");
        };
        assert_eq!(manuscript, r"Weak claim \cite{Smith2020Trust}.");
        assert!(bibliography.contains("Smith2020Trust"));

        let marker = FixAction {
            mutation: FixMutation::AppendMarker {
                key: "Weak2020".into(),
                marker: OUTDATED_MARKER.into(),
            },
            ..base
        };
        let ApplyOutcome::Applied { manuscript, .. } = apply_fix(&marker, text, "", None) else {
            panic!("marker not applied");
        };
        assert_eq!(manuscript, r"Weak claim \cite{Weak2020}\textsuperscript{[outdated]}.");
    }
}

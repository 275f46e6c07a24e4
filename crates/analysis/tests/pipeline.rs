//! End-to-end scenarios across parsing, analysis, planning, and repair

use async_trait::async_trait;
use refscore_analysis::{
    apply_fix, Analyzer, CitationFinder, GuidedFixPlanner, RefineOptions, Refiner, ScoringEngine,
};
use refscore_common::config::{AppConfig, FinderConfig, PlannerConfig, ScoringWeights};
use refscore_common::models::{ApplyOutcome, FixAction, FixMutation, FixType, Reference};
use refscore_common::provider::StaticProvider;
use refscore_common::refine::ProgressEvent;
use refscore_common::{AppError, MetadataProvider, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

const GAP_SENTENCE: &str = "It remains unknown whether quiet luxury cues affect trust.";

fn smith() -> Reference {
    Reference {
        id: "Smith2020Trust".into(),
        title: "Quiet luxury cues and consumer trust".into(),
        authors: vec!["Jane Smith".into()],
        year: 2020,
        venue: "Journal of Retail".into(),
        abstract_text: "We study how quiet luxury cues affect consumer trust in three experiments with 900 shoppers."
            .into(),
        citation_count: Some(150),
        doi: Some("10.1000/trust".into()),
        ..Default::default()
    }
}

fn engine() -> ScoringEngine {
    ScoringEngine::with_year(ScoringWeights::equal(), 2025)
}

struct Pipeline {
    analyzer: Analyzer,
    finder: Arc<CitationFinder>,
    planner: GuidedFixPlanner,
}

fn pipeline(provider: Arc<dyn MetadataProvider>) -> Pipeline {
    let finder = Arc::new(CitationFinder::new(provider.clone(), engine(), FinderConfig::default()));
    Pipeline {
        analyzer: Analyzer::new(provider, engine()),
        planner: GuidedFixPlanner::new(finder.clone(), PlannerConfig::default()),
        finder,
    }
}

fn applied(outcome: ApplyOutcome) -> (String, String) {
    match outcome {
        ApplyOutcome::Applied {
            manuscript,
            bibliography,
        } => (manuscript, bibliography),
        ApplyOutcome::NoOp { notice } => panic!("expected an edit, got notice: {}", notice),
    }
}

/// Search always fails, DOI lookups succeed with nothing
struct SearchDown;

#[async_trait]
impl MetadataProvider for SearchDown {
    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<Reference>> {
        Err(AppError::provider("search-down", "503 Service Unavailable"))
    }

    async fn batch_lookup(&self, _dois: &[String]) -> Result<HashMap<String, Reference>> {
        Ok(HashMap::new())
    }

    fn name(&self) -> &str {
        "search-down"
    }
}

#[tokio::test]
async fn gap_sentence_gets_cited_once() {
    let p = pipeline(Arc::new(StaticProvider::new(vec![smith()])));

    let analysis = p.analyzer.analyze(GAP_SENTENCE, "").await.unwrap();
    assert!(analysis.analyzed_sentences[0].gap_identified);

    let actions = p.planner.generate_plan(&analysis).await;
    let gap = actions
        .iter()
        .find(|a| a.fix_type == FixType::Gap)
        .expect("gap action");
    assert!(gap.auto_fix_available);
    assert_eq!(gap.suggested_references.as_ref().unwrap()[0].id, "Smith2020Trust");

    let (manuscript, bibliography) = applied(apply_fix(gap, GAP_SENTENCE, "", None));
    assert!(manuscript.contains(r"\cite{Smith2020Trust}"));
    assert!(bibliography.contains("@article{Smith2020Trust"));

    // Re-applying never duplicates the citation
    if let ApplyOutcome::Applied { manuscript: again, .. } = apply_fix(gap, &manuscript, &bibliography, None) {
        assert_eq!(again.matches(r"\cite{Smith2020Trust}").count(), 1);
    }
}

#[tokio::test]
async fn plan_is_ordered_by_severity() {
    let manuscript = r"Consumers trust quiet luxury brands \cite{Old1990}.
Loyalty is driven by krill \cite{Weak2021}.
Sales increased by 40\% in 2021.";
    let bibliography = r"@article{Old1990,
  author = {Ann Old},
  title = {Quiet luxury brands and consumer trust},
  year = {1990}
}

@article{Weak2021,
  author = {Bo Weak},
  title = {Deep ocean sediment chemistry},
  year = {2021}
}";

    let p = pipeline(Arc::new(StaticProvider::new(vec![smith()])));
    let analysis = p.analyzer.analyze(manuscript, bibliography).await.unwrap();
    let actions = p.planner.generate_plan(&analysis).await;

    assert_eq!(actions[0].fix_type, FixType::MissingCitation);
    assert!(actions.windows(2).all(|w| w[0].severity <= w[1].severity));

    let types: Vec<FixType> = actions.iter().map(|a| a.fix_type).collect();
    assert!(types.contains(&FixType::LowRelevance));
    assert!(types.contains(&FixType::Outdated));

    let outdated = actions
        .iter()
        .find(|a| a.fix_type == FixType::Outdated)
        .unwrap();
    assert_eq!(outdated.citation_key.as_deref(), Some("Old1990"));
    let (marked, _) = applied(apply_fix(outdated, manuscript, bibliography, None));
    assert!(marked.contains(r"\cite{Old1990}\textsuperscript{[outdated]}"));
    assert!(!apply_fix(outdated, &marked, bibliography, None).is_applied());
}

#[tokio::test]
async fn formatting_fixes_apply_within_sentence() {
    let manuscript = "Smith et al claims  this works.";
    let p = pipeline(Arc::new(StaticProvider::default()));

    let analysis = p.analyzer.analyze(manuscript, "").await.unwrap();
    let actions = p.planner.generate_plan(&analysis).await;
    let et_al = actions
        .iter()
        .find(|a| a.id.ends_with("et_al"))
        .expect("et al action");

    let (fixed, bibliography) = applied(apply_fix(et_al, manuscript, "", None));
    assert_eq!(fixed, "Smith et al. claims  this works.");
    assert!(bibliography.is_empty());
}

#[test]
fn empty_gap_query_skips_provider() {
    let provider = Arc::new(StaticProvider::new(vec![smith()]));
    let finder = CitationFinder::new(provider.clone(), engine(), FinderConfig::default());

    let found = tokio_test::block_on(finder.find_sources_for_gap("It is so."));
    assert!(found.is_empty());
    assert!(provider.queries().is_empty());
}

#[tokio::test]
async fn short_word_gap_gets_no_suggestions() {
    let provider = Arc::new(StaticProvider::new(vec![smith()]));
    let p = pipeline(provider.clone());

    let found = p.finder.find_sources_for_gap("Cats eat fish.").await;
    assert!(found.is_empty());
    assert!(provider.queries().is_empty());
}

#[tokio::test]
async fn search_outage_degrades_to_manual_gap() {
    let p = pipeline(Arc::new(SearchDown));

    let analysis = p.analyzer.analyze(GAP_SENTENCE, "").await.unwrap();
    let actions = p.planner.generate_plan(&analysis).await;

    let gap = actions
        .iter()
        .find(|a| a.fix_type == FixType::Gap)
        .unwrap();
    assert!(!gap.auto_fix_available);
    assert_eq!(gap.mutation, FixMutation::Manual);
    assert!(!apply_fix(gap, GAP_SENTENCE, "", None).is_applied());
    assert!(p.finder.find_sources_for_gap(GAP_SENTENCE).await.is_empty());
}

#[tokio::test]
async fn actions_survive_json_boundary() {
    let p = pipeline(Arc::new(StaticProvider::new(vec![smith()])));
    let analysis = p.analyzer.analyze(GAP_SENTENCE, "").await.unwrap();
    let actions = p.planner.generate_plan(&analysis).await;

    let json = serde_json::to_string(&actions).unwrap();
    let decoded: Vec<FixAction> = serde_json::from_str(&json).unwrap();
    let ids = |list: &[FixAction]| list.iter().map(|a| a.id.clone()).collect::<Vec<_>>();
    assert_eq!(ids(&decoded), ids(&actions));

    let gap = decoded.iter().find(|a| a.fix_type == FixType::Gap).unwrap();
    assert!(apply_fix(gap, GAP_SENTENCE, "", None).is_applied());
}

#[tokio::test]
async fn refine_reports_progress_on_broadcast() {
    let refiner = Refiner::new(
        Arc::new(StaticProvider::new(vec![smith()])),
        &AppConfig::default(),
    );
    let (tx, mut rx) = broadcast::channel::<ProgressEvent>(64);

    let response = refiner
        .refine(GAP_SENTENCE, RefineOptions::default(), &tx)
        .await
        .unwrap();
    assert!(response.processed_text.contains(r"\cite{Smith2020Trust}"));
    assert!(response.bibtex.contains("@article{Smith2020Trust"));
    assert!(response.bibliography_text.contains("https://doi.org/10.1000/trust"));

    let mut progress = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let ProgressEvent::Progress { progress: p, .. } = event {
            progress.push(p);
        }
    }
    assert_eq!(progress.first(), Some(&0.0));
    assert_eq!(progress.last(), Some(&1.0));
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
}

//! Refine pass
//!
//! Analyzes a bare manuscript, cites the best available source for every
//! unsupported claim or research gap, and renders the resulting bibliography.

use crate::analyzer::Analyzer;
use crate::finder::{self, CitationFinder};
use crate::parser::format_bibliography;
use crate::scoring::ScoringEngine;
use refscore_common::config::AppConfig;
use refscore_common::errors::Result;
use refscore_common::metrics;
use refscore_common::models::{Reference, SentenceTarget};
use refscore_common::provider::{normalize_doi, unique_key};
use refscore_common::refine::{ProgressEvent, RefineResponse};
use refscore_common::MetadataProvider;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument};

/// Receives progress events from a refine pass
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

impl ProgressSink for broadcast::Sender<ProgressEvent> {
    fn report(&self, event: ProgressEvent) {
        // No subscribers is fine
        let _ = self.send(event);
    }
}

/// Discards progress
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RefineOptions {
    /// Candidate cap per sentence; `None` or zero uses the finder default
    pub max_results: Option<usize>,
    /// Bypass the provider cache
    pub no_cache: bool,
}

pub struct Refiner {
    provider: Arc<dyn MetadataProvider>,
    uncached: Arc<dyn MetadataProvider>,
    config: AppConfig,
}

impl Refiner {
    pub fn new(provider: Arc<dyn MetadataProvider>, config: &AppConfig) -> Self {
        Self {
            uncached: provider.clone(),
            provider,
            config: config.clone(),
        }
    }

    /// Provider used when a request asks to bypass the cache
    pub fn with_uncached(mut self, provider: Arc<dyn MetadataProvider>) -> Self {
        self.uncached = provider;
        self
    }

    #[instrument(skip_all, fields(manuscript_len = manuscript.len(), no_cache = options.no_cache))]
    pub async fn refine(
        &self,
        manuscript: &str,
        options: RefineOptions,
        progress: &dyn ProgressSink,
    ) -> Result<RefineResponse> {
        if manuscript.trim().is_empty() {
            return Ok(RefineResponse::empty());
        }

        progress.report(ProgressEvent::progress(0.0, "Starting refinement..."));

        match self.run(manuscript, options, progress).await {
            Ok(response) => {
                progress.report(ProgressEvent::progress(1.0, "Refinement complete"));
                metrics::record_refine(true);
                Ok(response)
            }
            Err(e) => {
                error!(error = %e, "Refinement failed");
                progress.report(ProgressEvent::error(e.to_string()));
                metrics::record_refine(false);
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        manuscript: &str,
        options: RefineOptions,
        progress: &dyn ProgressSink,
    ) -> Result<RefineResponse> {
        let provider = if options.no_cache {
            self.uncached.clone()
        } else {
            self.provider.clone()
        };
        let engine = ScoringEngine::new(self.config.scoring);
        let analyzer = Analyzer::new(provider.clone(), engine.clone());
        let finder = CitationFinder::new(provider, engine, self.config.finder.clone());

        let analysis = analyzer.analyze(manuscript, "").await?;
        let cap = options
            .max_results
            .filter(|&n| n > 0)
            .unwrap_or(self.config.finder.gap_candidate_cap);

        let targets: Vec<_> = analysis
            .analyzed_sentences
            .iter()
            .filter(|s| s.is_missing_citation || s.gap_identified)
            .collect();
        let total = targets.len().max(1);

        let mut text = manuscript.to_string();
        let mut bibtex = String::new();
        let mut added: Vec<Reference> = Vec::new();
        // Work identity (DOI, else title) -> assigned key
        let mut assigned: HashMap<String, String> = HashMap::new();
        let mut taken: HashSet<String> = HashSet::new();

        for (done, sentence) in targets.iter().enumerate() {
            let fraction = 0.05 + 0.9 * (done as f64 / total as f64);
            progress.report(ProgressEvent::progress(
                fraction,
                format!("Finding sources for sentence {} of {}", done + 1, targets.len()),
            ));

            let candidates = finder.find_sources_for_gap_capped(&sentence.text, cap).await;
            let Some(mut top) = candidates.into_iter().next() else {
                debug!(sentence = %sentence.text, "No source found");
                continue;
            };

            let identity = work_identity(&top);
            match assigned.get(&identity) {
                Some(key) => top.id = key.clone(),
                None => {
                    top.id = unique_key(&top.id, &taken);
                    taken.insert(top.id.clone());
                    assigned.insert(identity, top.id.clone());
                    added.push(top.clone());
                }
            }

            let trigger = sentence.trigger_phrase.as_deref();
            let edit = match SentenceTarget::of(sentence).resolve(&text) {
                Some(range) => finder::auto_add_at(range, trigger, &top, &text, &bibtex),
                None => finder::auto_add_for_gap(&sentence.text, trigger, &top, &text, &bibtex),
            };
            text = edit.manuscript;
            bibtex = edit.bibliography;
        }

        progress.report(ProgressEvent::progress(0.98, "Generating bibliography and BibTeX..."));

        let bibliography_text = format_bibliography(&added);

        info!(
            sentences = analysis.analyzed_sentences.len(),
            targeted = targets.len(),
            cited = added.len(),
            "Refinement finished"
        );

        Ok(RefineResponse {
            processed_text: text,
            bibliography_text,
            bibtex,
        })
    }
}

fn work_identity(reference: &Reference) -> String {
    match reference.doi.as_deref() {
        Some(doi) if !doi.is_empty() => normalize_doi(doi),
        _ => reference.title.trim().to_lowercase(),
    }
}

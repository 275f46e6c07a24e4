//! Bibliographic metadata provider abstraction
//!
//! Provides a unified interface over metadata sources:
//! - OpenAlex (paginated search, DOI batch lookup)
//! - A caching decorator for repeated searches
//! - A static in-memory provider for offline runs and tests

mod cache;
mod fixture;
mod openalex;

pub use cache::CachedProvider;
pub use fixture::StaticProvider;
pub use openalex::OpenAlexClient;

use crate::config::ProviderConfig;
use crate::errors::Result;
use crate::models::Reference;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Trait for bibliographic metadata lookups
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Search works matching `query`, up to `limit` records, paginating internally
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Reference>>;

    /// Fetch records by DOI, keyed by normalized DOI
    async fn batch_lookup(&self, dois: &[String]) -> Result<HashMap<String, Reference>>;

    /// Provider name for logs and metrics
    fn name(&self) -> &str;
}

/// Create a provider based on configuration
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn MetadataProvider>> {
    match config.kind.as_str() {
        "openalex" => Ok(Arc::new(OpenAlexClient::new(config)?)),
        "static" => Ok(Arc::new(StaticProvider::default())),
        other => {
            tracing::warn!(provider = other, "Unknown metadata provider, using static");
            Ok(Arc::new(StaticProvider::default()))
        }
    }
}

/// Normalize a DOI: strip `doi:` or `https://doi.org/` prefixes, trim, lower-case
pub fn normalize_doi(doi: &str) -> String {
    let trimmed = doi.trim();
    let lower = trimmed.to_lowercase();
    let stripped = ["https://doi.org/", "http://doi.org/", "https://dx.doi.org/", "doi:"]
        .iter()
        .find_map(|prefix| lower.strip_prefix(*prefix))
        .unwrap_or(lower.as_str());
    stripped.trim().to_string()
}

/// Derive a `<firstAuthorSurname><year>` citation key
pub fn derive_citation_key(authors: &[String], year: i32) -> String {
    let surname = authors
        .first()
        .map(|author| {
            let author = author.trim();
            let raw = match author.split_once(',') {
                Some((family, _)) => family,
                None => author.split_whitespace().last().unwrap_or(""),
            };
            raw.chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Unknown".to_string());

    if year > 0 {
        format!("{}{}", surname, year)
    } else {
        surname
    }
}

/// Make `base` unique against `taken` by appending a, b, c, ...
pub fn unique_key(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    for suffix in 'a'..='z' {
        let candidate = format!("{}{}", base, suffix);
        if !taken.contains(&candidate) {
            return candidate;
        }
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}_{}", base, n);
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Rebuild abstract text from a word -> positions inverted index
pub fn reconstruct_abstract(index: &HashMap<String, Vec<usize>>) -> String {
    let positioned: BTreeMap<usize, &str> = index
        .iter()
        .flat_map(|(word, positions)| positions.iter().map(move |&p| (p, word.as_str())))
        .collect();
    positioned.into_values().collect::<Vec<_>>().join(" ")
}

//! OpenAlex works API client

use super::{derive_citation_key, normalize_doi, reconstruct_abstract, MetadataProvider};
use crate::config::ProviderConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::models::Reference;
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::Deserialize;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::time::Instant;
use tracing::{debug, warn};

const PROVIDER_NAME: &str = "openalex";

/// Rate-limited OpenAlex client
pub struct OpenAlexClient {
    client: reqwest::Client,
    base_url: String,
    mailto: Option<String>,
    per_page: usize,
    batch_chunk_size: usize,
    limiter: DefaultDirectRateLimiter,
}

#[derive(Debug, Deserialize)]
struct WorksPage {
    #[serde(default)]
    results: Vec<Work>,
}

#[derive(Debug, Deserialize)]
struct Work {
    display_name: Option<String>,
    title: Option<String>,
    #[serde(default)]
    authorships: Vec<Authorship>,
    publication_year: Option<i32>,
    primary_location: Option<Location>,
    abstract_inverted_index: Option<HashMap<String, Vec<usize>>>,
    doi: Option<String>,
    cited_by_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Authorship {
    author: Option<AuthorRef>,
}

#[derive(Debug, Deserialize)]
struct AuthorRef {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Location {
    source: Option<Source>,
}

#[derive(Debug, Deserialize)]
struct Source {
    display_name: Option<String>,
}

impl Work {
    fn into_reference(self) -> Reference {
        let authors: Vec<String> = self
            .authorships
            .into_iter()
            .filter_map(|a| a.author.and_then(|a| a.display_name))
            .collect();
        let year = self.publication_year.unwrap_or(0);
        let abstract_text = self
            .abstract_inverted_index
            .as_ref()
            .map(reconstruct_abstract)
            .unwrap_or_default();
        let venue = self
            .primary_location
            .and_then(|l| l.source)
            .and_then(|s| s.display_name)
            .unwrap_or_default();

        Reference {
            id: derive_citation_key(&authors, year),
            title: self.display_name.or(self.title).unwrap_or_default(),
            authors,
            year,
            venue,
            abstract_text,
            doi: self.doi.as_deref().map(normalize_doi).filter(|d| !d.is_empty()),
            citation_count: self.cited_by_count,
            embedding: None,
            scores: None,
        }
    }
}

impl OpenAlexClient {
    /// Create a new client from provider configuration
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("refscore/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        let rps = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            mailto: config.mailto.clone(),
            per_page: config.per_page.clamp(1, 200),
            batch_chunk_size: config.batch_chunk_size.clamp(1, 100),
            limiter: RateLimiter::direct(Quota::per_second(rps)),
        })
    }

    async fn fetch_page(&self, params: Vec<(&str, String)>) -> Result<WorksPage> {
        self.limiter.until_ready().await;

        let mut params = params;
        if let Some(mailto) = &self.mailto {
            params.push(("mailto", mailto.clone()));
        }

        let url = format!("{}/works", self.base_url);
        let response = self.client.get(&url).query(&params).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::provider(
                PROVIDER_NAME,
                format!("API error {}: {}", status, body),
            ));
        }

        response.json::<WorksPage>().await.map_err(|e| {
            AppError::provider(PROVIDER_NAME, format!("Failed to parse response: {}", e))
        })
    }

    async fn search_pages(&self, query: &str, limit: usize) -> Result<Vec<Reference>> {
        let mut collected = Vec::new();
        let mut page = 1usize;

        while collected.len() < limit {
            let per_page = self.per_page.min(limit - collected.len()).max(1);
            let batch = self
                .fetch_page(vec![
                    ("search", query.to_string()),
                    ("per-page", per_page.to_string()),
                    ("page", page.to_string()),
                ])
                .await?;

            let received = batch.results.len();
            debug!(query, page, received, "OpenAlex page fetched");
            collected.extend(batch.results.into_iter().map(Work::into_reference));

            if received < per_page {
                break;
            }
            page += 1;
        }

        collected.truncate(limit);
        Ok(collected)
    }

    async fn lookup_chunks(&self, dois: &[String]) -> Result<HashMap<String, Reference>> {
        let mut found = HashMap::new();

        for chunk in dois.chunks(self.batch_chunk_size) {
            let filter = chunk
                .iter()
                .map(|d| format!("https://doi.org/{}", d))
                .collect::<Vec<_>>()
                .join("|");

            let page = self
                .fetch_page(vec![
                    ("filter", format!("doi:{}", filter)),
                    ("per-page", chunk.len().to_string()),
                ])
                .await?;

            for work in page.results {
                let reference = work.into_reference();
                if let Some(doi) = reference.doi.clone() {
                    found.insert(doi, reference);
                }
            }
        }

        Ok(found)
    }
}

#[async_trait]
impl MetadataProvider for OpenAlexClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Reference>> {
        let query = query.trim();
        if query.is_empty() || limit == 0 {
            return Ok(vec![]);
        }

        let start = Instant::now();
        let result = self.search_pages(query, limit).await;
        metrics::record_provider_request(
            PROVIDER_NAME,
            "search",
            start.elapsed().as_secs_f64(),
            result.is_ok(),
        );
        result
    }

    async fn batch_lookup(&self, dois: &[String]) -> Result<HashMap<String, Reference>> {
        let mut normalized: Vec<String> = dois
            .iter()
            .map(|d| normalize_doi(d))
            .filter(|d| !d.is_empty())
            .collect();
        normalized.sort();
        normalized.dedup();

        if normalized.is_empty() {
            return Ok(HashMap::new());
        }

        let start = Instant::now();
        let result = self.lookup_chunks(&normalized).await;
        metrics::record_provider_request(
            PROVIDER_NAME,
            "batch_lookup",
            start.elapsed().as_secs_f64(),
            result.is_ok(),
        );

        result.map_err(|e| {
            warn!(error = %e, count = normalized.len(), "OpenAlex batch lookup failed");
            AppError::BatchLookup {
                message: e.to_string(),
            }
        })
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_mapping() {
        let json = serde_json::json!({
            "display_name": "Quiet luxury and consumer trust",
            "authorships": [
                {"author": {"display_name": "Jane Smith"}},
                {"author": {"display_name": "Raj Patel"}}
            ],
            "publication_year": 2020,
            "primary_location": {"source": {"display_name": "Journal of Marketing"}},
            "abstract_inverted_index": {"We": [0], "study": [1], "trust": [2]},
            "doi": "https://doi.org/10.1000/QL.2020",
            "cited_by_count": 42
        });
        let work: Work = serde_json::from_value(json).unwrap();
        let reference = work.into_reference();

        assert_eq!(reference.id, "Smith2020");
        assert_eq!(reference.title, "Quiet luxury and consumer trust");
        assert_eq!(reference.authors.len(), 2);
        assert_eq!(reference.venue, "Journal of Marketing");
        assert_eq!(reference.abstract_text, "We study trust");
        assert_eq!(reference.doi.as_deref(), Some("10.1000/ql.2020"));
        assert_eq!(reference.citation_count, Some(42));
    }

    #[test]
    fn test_sparse_work_mapping() {
        let work: Work = serde_json::from_value(serde_json::json!({ "title": "Untitled" })).unwrap();
        let reference = work.into_reference();
        assert_eq!(reference.id, "Unknown");
        assert_eq!(reference.year, 0);
        assert!(reference.abstract_text.is_empty());
        assert!(reference.doi.is_none());
    }

    #[tokio::test]
    async fn test_empty_query_issues_no_request() {
        let config = ProviderConfig {
            base_url: "http://127.0.0.1:9".into(),
            ..Default::default()
        };
        let client = OpenAlexClient::new(&config).unwrap();
        assert!(client.search("   ", 10).await.unwrap().is_empty());
        assert!(client.batch_lookup(&[]).await.unwrap().is_empty());
    }
}

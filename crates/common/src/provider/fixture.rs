//! Static in-memory provider

use super::{normalize_doi, MetadataProvider};
use crate::errors::{AppError, Result};
use crate::models::Reference;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Serves a fixed set of references. Search matches any query word of three
/// or more characters against title and abstract, preserving insertion order.
///
/// Every query received is recorded so callers can assert on provider traffic.
#[derive(Default)]
pub struct StaticProvider {
    references: Vec<Reference>,
    fail: bool,
    queries: Mutex<Vec<String>>,
}

impl StaticProvider {
    pub fn new(references: Vec<Reference>) -> Self {
        Self {
            references,
            fail: false,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// A provider whose every call fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// Queries received so far
    pub fn queries(&self) -> Vec<String> {
        self.queries
            .lock()
            .map(|q| q.clone())
            .unwrap_or_default()
    }

    fn record(&self, query: &str) {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.to_string());
        }
    }
}

#[async_trait]
impl MetadataProvider for StaticProvider {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Reference>> {
        self.record(query);
        if self.fail {
            return Err(AppError::provider("static", "provider configured to fail"));
        }

        let terms: Vec<String> = query
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() >= 3)
            .map(|t| t.to_lowercase())
            .collect();

        Ok(self
            .references
            .iter()
            .filter(|r| {
                let haystack = r.searchable_text().to_lowercase();
                terms.iter().any(|t| haystack.contains(t.as_str()))
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn batch_lookup(&self, dois: &[String]) -> Result<HashMap<String, Reference>> {
        if self.fail {
            return Err(AppError::BatchLookup {
                message: "provider configured to fail".into(),
            });
        }

        let wanted: Vec<String> = dois.iter().map(|d| normalize_doi(d)).collect();
        Ok(self
            .references
            .iter()
            .filter_map(|r| {
                let doi = normalize_doi(r.doi.as_deref()?);
                wanted.contains(&doi).then(|| (doi, r.clone()))
            })
            .collect())
    }

    fn name(&self) -> &str {
        "static"
    }
}

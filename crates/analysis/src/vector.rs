//! TF-IDF vector space
//!
//! A model is fit once over a small transient corpus and is immutable
//! afterwards. Vectors from two different models are not comparable.

use crate::text::{is_stopword, tokenize};
use std::collections::{BTreeMap, HashMap};

/// Sparse vector keyed by vocabulary index
pub type SparseVector = BTreeMap<usize, f64>;

/// Fitted TF-IDF model
#[derive(Debug, Clone, Default)]
pub struct TfIdfModel {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    documents: usize,
}

impl TfIdfModel {
    /// Fit over `corpus`, with `idf = ln((N + 1) / (df + 1)) + 1`
    pub fn fit<S: AsRef<str>>(corpus: &[S]) -> Self {
        let mut vocabulary: HashMap<String, usize> = HashMap::new();
        let mut document_frequency: Vec<usize> = Vec::new();

        for document in corpus {
            let mut seen: Vec<usize> = terms(document.as_ref())
                .into_iter()
                .map(|term| {
                    let next = vocabulary.len();
                    *vocabulary.entry(term).or_insert(next)
                })
                .collect();
            seen.sort_unstable();
            seen.dedup();

            for index in seen {
                if index >= document_frequency.len() {
                    document_frequency.resize(index + 1, 0);
                }
                document_frequency[index] += 1;
            }
        }

        let n = corpus.len() as f64;
        let idf = document_frequency
            .into_iter()
            .map(|df| ((n + 1.0) / (df as f64 + 1.0)).ln() + 1.0)
            .collect();

        Self {
            vocabulary,
            idf,
            documents: corpus.len(),
        }
    }

    /// `tf * idf` over the fitted vocabulary; unseen terms are dropped
    pub fn transform(&self, text: &str) -> SparseVector {
        let mut vector = SparseVector::new();
        for term in terms(text) {
            if let Some(&index) = self.vocabulary.get(&term) {
                *vector.entry(index).or_insert(0.0) += 1.0;
            }
        }
        for (index, weight) in vector.iter_mut() {
            *weight *= self.idf[*index];
        }
        vector
    }

    /// Dense form of `transform`, one slot per vocabulary term
    pub fn transform_dense(&self, text: &str) -> Vec<f64> {
        let mut dense = vec![0.0; self.vocabulary.len()];
        for (index, weight) in self.transform(text) {
            dense[index] = weight;
        }
        dense
    }

    pub fn idf(&self, term: &str) -> Option<f64> {
        self.vocabulary.get(term).map(|&i| self.idf[i])
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    /// Documents the model was fit on
    pub fn documents(&self) -> usize {
        self.documents
    }
}

/// Cosine similarity, 0 when either vector is empty
pub fn cosine(a: &SparseVector, b: &SparseVector) -> f64 {
    let dot: f64 = a
        .iter()
        .filter_map(|(index, x)| b.get(index).map(|y| x * y))
        .sum();
    let norm_a = a.values().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.values().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
    }
}

fn terms(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| t.chars().count() > 1 && !is_stopword(t))
        .collect()
}

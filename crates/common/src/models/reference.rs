//! Bibliographic reference and per-dimension scores

use serde::{Deserialize, Serialize};

/// A bibliographic record, either parsed from BibTeX or mapped from the
/// metadata provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    /// Citation key
    pub id: String,

    pub title: String,

    /// Author names in citation order
    #[serde(default)]
    pub authors: Vec<String>,

    /// Publication year, 0 when unknown
    #[serde(default)]
    pub year: i32,

    #[serde(default)]
    pub venue: String,

    #[serde(rename = "abstract", default)]
    pub abstract_text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation_count: Option<u64>,

    /// TF-IDF projection attached during a scoring pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<DimensionScores>,
}

impl Reference {
    /// Title and abstract joined, the text scored against a sentence
    pub fn searchable_text(&self) -> String {
        if self.abstract_text.is_empty() {
            self.title.clone()
        } else {
            format!("{} {}", self.title, self.abstract_text)
        }
    }

    /// Year is known
    pub fn has_year(&self) -> bool {
        self.year > 0
    }
}

/// The six relevance dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    Alignment,
    Numbers,
    Entities,
    Methods,
    Recency,
    Authority,
}

impl Dimension {
    pub const ALL: [Dimension; 6] = [
        Dimension::Alignment,
        Dimension::Numbers,
        Dimension::Entities,
        Dimension::Methods,
        Dimension::Recency,
        Dimension::Authority,
    ];
}

/// Scores for one sentence/reference pair.
///
/// The scale depends on the producer: the candidate-ranking path yields
/// 0-100, the manuscript analysis path yields 0-1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DimensionScores {
    pub alignment: f64,
    pub numbers: f64,
    pub entities: f64,
    pub methods: f64,
    pub recency: f64,
    pub authority: f64,
}

impl DimensionScores {
    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Alignment => self.alignment,
            Dimension::Numbers => self.numbers,
            Dimension::Entities => self.entities,
            Dimension::Methods => self.methods,
            Dimension::Recency => self.recency,
            Dimension::Authority => self.authority,
        }
    }

    pub fn set(&mut self, dimension: Dimension, value: f64) {
        match dimension {
            Dimension::Alignment => self.alignment = value,
            Dimension::Numbers => self.numbers = value,
            Dimension::Entities => self.entities = value,
            Dimension::Methods => self.methods = value,
            Dimension::Recency => self.recency = value,
            Dimension::Authority => self.authority = value,
        }
    }

    /// Clamp every dimension into `[lo, hi]`
    pub fn clamped(mut self, lo: f64, hi: f64) -> Self {
        for dimension in Dimension::ALL {
            let value = self.get(dimension);
            let value = if value.is_nan() { lo } else { value.clamp(lo, hi) };
            self.set(dimension, value);
        }
        self
    }

    /// Per-dimension mean, `None` for an empty slice
    pub fn mean(scores: &[DimensionScores]) -> Option<DimensionScores> {
        if scores.is_empty() {
            return None;
        }
        let n = scores.len() as f64;
        let mut mean = DimensionScores::default();
        for dimension in Dimension::ALL {
            let total: f64 = scores.iter().map(|s| s.get(dimension)).sum();
            mean.set(dimension, total / n);
        }
        Some(mean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scores_serialize_with_dimension_names() {
        let scores = DimensionScores {
            alignment: 0.5,
            ..Default::default()
        };
        let json = serde_json::to_value(scores).unwrap();
        assert_eq!(json["Alignment"], 0.5);
        assert!(json.get("Authority").is_some());
    }

    #[test]
    fn test_reference_abstract_field_name() {
        let reference = Reference {
            id: "Smith2020".into(),
            abstract_text: "An abstract.".into(),
            ..Default::default()
        };
        let json = serde_json::to_value(&reference).unwrap();
        assert_eq!(json["abstract"], "An abstract.");
        assert!(json.get("doi").is_none());
    }

    #[test]
    fn test_clamped_handles_nan() {
        let scores = DimensionScores {
            alignment: f64::NAN,
            numbers: 140.0,
            entities: -3.0,
            ..Default::default()
        }
        .clamped(0.0, 100.0);
        assert_eq!(scores.alignment, 0.0);
        assert_eq!(scores.numbers, 100.0);
        assert_eq!(scores.entities, 0.0);
    }

    #[test]
    fn test_mean() {
        let a = DimensionScores { recency: 1.0, ..Default::default() };
        let b = DimensionScores { recency: 0.0, ..Default::default() };
        let mean = DimensionScores::mean(&[a, b]).unwrap();
        assert!((mean.recency - 0.5).abs() < 1e-9);
        assert!(DimensionScores::mean(&[]).is_none());
    }
}

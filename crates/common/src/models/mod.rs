//! Data model shared by the analysis engine and the gateway
//!
//! All types serialize with camelCase field names so they can cross the HTTP
//! boundary unchanged.

mod analysis;
mod fix;
mod reference;
mod sentence;

pub use analysis::AnalysisResult;
pub use fix::{ApplyOutcome, FixAction, FixMutation, FixType, SentenceTarget, Severity};
pub use reference::{Dimension, DimensionScores, Reference};
pub use sentence::{fingerprint, AnalyzedSentence, ParsedSentence};

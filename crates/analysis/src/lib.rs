//! RefScore analysis engine
//!
//! Everything runs in memory over one manuscript at a time:
//! - LaTeX and BibTeX parsing
//! - TF-IDF vector space and entity extraction
//! - Six-dimension citation scoring
//! - Source finding through a metadata provider
//! - Guided fix planning and application
//! - The full analysis pass and the refine pass

pub mod analyzer;
pub mod entities;
pub mod finder;
pub mod parser;
pub mod planner;
pub mod refiner;
pub mod scoring;
pub mod text;
pub mod vector;

pub use analyzer::Analyzer;
pub use finder::{CitationFinder, FileEdit, RankedCandidate};
pub use planner::{apply_fix, GuidedFixPlanner};
pub use refiner::{NoProgress, ProgressSink, RefineOptions, Refiner};
pub use scoring::{compute_weighted_total, ScoringEngine};
pub use vector::{cosine, SparseVector, TfIdfModel};

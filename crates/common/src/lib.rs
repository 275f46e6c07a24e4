//! RefScore Common Library
//! 
//! Shared code for the RefScore crates including:
//! - Data model (references, sentences, analysis results, fix actions)
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability
//! - Metadata provider clients
//! - Refinement service client

pub mod config;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod provider;
pub mod refine;

// Re-export commonly used types
pub use errors::{AppError, Result};
pub use config::AppConfig;
pub use provider::MetadataProvider;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Configuration management for RefScore services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with REFSCORE__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Bibliographic metadata provider
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Dimension weights for the weighted total
    #[serde(default)]
    pub scoring: ScoringWeights,

    /// Citation finder budgets and filters
    #[serde(default)]
    pub finder: FinderConfig,

    /// Guided fix planner thresholds
    #[serde(default)]
    pub planner: PlannerConfig,

    /// External refinement service
    #[serde(default)]
    pub refinement: RefinementConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum request body in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Provider kind: openalex, static
    #[serde(default = "default_provider_kind")]
    pub kind: String,

    /// API base URL
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,

    /// Contact address sent as `mailto` (polite pool)
    pub mailto: Option<String>,

    /// Results per page requested from the API
    #[serde(default = "default_per_page")]
    pub per_page: usize,

    /// Request timeout in seconds
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,

    /// Outbound requests per second
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// DOIs per batch lookup request
    #[serde(default = "default_batch_chunk")]
    pub batch_chunk_size: usize,

    /// Cached search responses (0 disables the cache)
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

/// Per-dimension weights used by the weighted total
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ScoringWeights {
    #[serde(default = "default_weight")]
    pub alignment: f64,
    #[serde(default = "default_weight")]
    pub numbers: f64,
    #[serde(default = "default_weight")]
    pub entities: f64,
    #[serde(default = "default_weight")]
    pub methods: f64,
    #[serde(default = "default_weight")]
    pub recency: f64,
    #[serde(default = "default_weight")]
    pub authority: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FinderConfig {
    /// Candidates retrieved for a gap search
    #[serde(default = "default_gap_candidate_cap")]
    pub gap_candidate_cap: usize,

    /// Total candidates split across better-source queries
    #[serde(default = "default_better_sources_budget")]
    pub better_sources_budget: usize,

    /// Weighted-total points a candidate must beat the baseline by
    #[serde(default = "default_min_improvement")]
    pub min_improvement: f64,

    /// Abstracts shorter than this are filtered out
    #[serde(default = "default_min_abstract_len")]
    pub min_abstract_len: usize,

    /// Title fragments marking non-article records
    #[serde(default = "default_generic_titles")]
    pub generic_titles: Vec<String>,

    /// Ranked results returned
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlannerConfig {
    /// Alignment below this (unit scale) is low relevance
    #[serde(default = "default_low_relevance")]
    pub low_relevance_threshold: f64,

    /// Recency below this (unit scale) is outdated
    #[serde(default = "default_outdated")]
    pub outdated_threshold: f64,

    /// Suggestions attached to one action
    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RefinementConfig {
    /// Base URL of the refinement service
    #[serde(default = "default_refinement_url")]
    pub base_url: String,

    /// Soft timeout for the progress channel connect
    #[serde(default = "default_progress_timeout")]
    pub progress_connect_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for logs
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_body_limit() -> usize { 4 * 1024 * 1024 }
fn default_provider_kind() -> String { "openalex".to_string() }
fn default_provider_base_url() -> String { "https://api.openalex.org".to_string() }
fn default_per_page() -> usize { 200 }
fn default_provider_timeout() -> u64 { 30 }
fn default_requests_per_second() -> u32 { 10 }
fn default_batch_chunk() -> usize { 50 }
fn default_cache_capacity() -> usize { 256 }
fn default_weight() -> f64 { 1.0 }
fn default_gap_candidate_cap() -> usize { 500 }
fn default_better_sources_budget() -> usize { 150 }
fn default_min_improvement() -> f64 { 5.0 }
fn default_min_abstract_len() -> usize { 80 }
fn default_top_k() -> usize { 3 }
fn default_low_relevance() -> f64 { 0.4 }
fn default_outdated() -> f64 { 0.2 }
fn default_max_suggestions() -> usize { 3 }
fn default_refinement_url() -> String { "http://localhost:8001".to_string() }
fn default_progress_timeout() -> u64 { 2000 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { false }
fn default_metrics_port() -> u16 { 0 }
fn default_service_name() -> String { "refscore".to_string() }

fn default_generic_titles() -> Vec<String> {
    [
        "contents",
        "table of contents",
        "index",
        "editorial",
        "front matter",
        "back matter",
        "erratum",
        "correction",
        "preface",
        "masthead",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // e.g., REFSCORE__SERVER__PORT=8081
            .add_source(
                Environment::with_prefix("REFSCORE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific config file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("REFSCORE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl ProviderConfig {
    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RefinementConfig {
    /// Get the progress connect timeout as Duration
    pub fn progress_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.progress_connect_timeout_ms)
    }
}

impl ScoringWeights {
    /// Equal weight on every dimension
    pub fn equal() -> Self {
        Self {
            alignment: 1.0,
            numbers: 1.0,
            entities: 1.0,
            methods: 1.0,
            recency: 1.0,
            authority: 1.0,
        }
    }

    /// Sum of all six weights
    pub fn sum(&self) -> f64 {
        self.alignment + self.numbers + self.entities + self.methods + self.recency + self.authority
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: default_provider_kind(),
            base_url: default_provider_base_url(),
            mailto: None,
            per_page: default_per_page(),
            timeout_secs: default_provider_timeout(),
            requests_per_second: default_requests_per_second(),
            batch_chunk_size: default_batch_chunk(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self::equal()
    }
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            gap_candidate_cap: default_gap_candidate_cap(),
            better_sources_budget: default_better_sources_budget(),
            min_improvement: default_min_improvement(),
            min_abstract_len: default_min_abstract_len(),
            generic_titles: default_generic_titles(),
            top_k: default_top_k(),
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            low_relevance_threshold: default_low_relevance(),
            outdated_threshold: default_outdated(),
            max_suggestions: default_max_suggestions(),
        }
    }
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            base_url: default_refinement_url(),
            progress_connect_timeout_ms: default_progress_timeout(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.provider.per_page, 200);
        assert_eq!(config.finder.top_k, 3);
        assert_eq!(config.finder.min_abstract_len, 80);
        assert!((config.planner.low_relevance_threshold - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn test_equal_weights_sum() {
        assert!((ScoringWeights::default().sum() - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_refinement_client_does_not_target_gateway() {
        let config = AppConfig::default();
        assert!(!config
            .refinement
            .base_url
            .ends_with(&format!(":{}", config.server.port)));
    }

    #[test]
    fn test_progress_timeout_duration() {
        let config = RefinementConfig::default();
        assert_eq!(config.progress_connect_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_generic_titles_include_editorial() {
        let config = FinderConfig::default();
        assert!(config.generic_titles.iter().any(|t| t == "editorial"));
    }
}

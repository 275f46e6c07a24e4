//! Metrics and observability utilities
//!
//! Prometheus-style metrics with a shared prefix. Recording is a no-op until a
//! recorder (the gateway's Prometheus exporter) is installed.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

/// Metrics prefix for all RefScore metrics
pub const METRICS_PREFIX: &str = "refscore";

/// Buckets for pass latency (analysis and refinement, in seconds)
pub const PASS_BUCKETS: &[f64] = &[
    0.010, // 10ms
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
    10.00, // 10s
    30.00, // 30s
    60.00, // 60s
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_analysis_passes_total", METRICS_PREFIX),
        Unit::Count,
        "Total analysis passes"
    );

    describe_histogram!(
        format!("{}_analysis_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Analysis pass latency in seconds"
    );

    describe_counter!(
        format!("{}_provider_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total metadata provider requests"
    );

    describe_histogram!(
        format!("{}_provider_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Metadata provider request latency in seconds"
    );

    describe_counter!(
        format!("{}_candidates_ranked_total", METRICS_PREFIX),
        Unit::Count,
        "Candidates scored by the citation finder"
    );

    describe_counter!(
        format!("{}_fix_actions_total", METRICS_PREFIX),
        Unit::Count,
        "Fix actions emitted by the planner"
    );

    describe_counter!(
        format!("{}_refine_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total refine requests"
    );

    describe_counter!(
        format!("{}_cache_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Provider cache hits"
    );

    describe_counter!(
        format!("{}_cache_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Provider cache misses"
    );
}

/// Record one analysis pass
pub fn record_analysis(duration_secs: f64, sentence_count: usize) {
    counter!(format!("{}_analysis_passes_total", METRICS_PREFIX)).increment(1);

    histogram!(format!("{}_analysis_duration_seconds", METRICS_PREFIX)).record(duration_secs);

    tracing::debug!(duration_secs, sentence_count, "Analysis pass recorded");
}

/// Record one metadata provider request
pub fn record_provider_request(provider: &str, operation: &str, duration_secs: f64, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_provider_requests_total", METRICS_PREFIX),
        "provider" => provider.to_string(),
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_provider_duration_seconds", METRICS_PREFIX),
        "provider" => provider.to_string(),
        "operation" => operation.to_string()
    )
    .record(duration_secs);
}

/// Record candidates scored by one finder call
pub fn record_candidates_ranked(path: &str, count: usize) {
    counter!(
        format!("{}_candidates_ranked_total", METRICS_PREFIX),
        "path" => path.to_string()
    )
    .increment(count as u64);
}

/// Record one emitted fix action
pub fn record_fix_action(fix_type: &str) {
    counter!(
        format!("{}_fix_actions_total", METRICS_PREFIX),
        "type" => fix_type.to_string()
    )
    .increment(1);
}

/// Record one refine request
pub fn record_refine(success: bool) {
    let status = if success { "success" } else { "error" };
    counter!(
        format!("{}_refine_requests_total", METRICS_PREFIX),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Helper to record cache metrics
pub fn record_cache(hit: bool, cache_name: &str) {
    if hit {
        counter!(
            format!("{}_cache_hits_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    } else {
        counter!(
            format!("{}_cache_misses_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_buckets_sorted() {
        let mut prev = 0.0;
        for &bucket in PASS_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
    }

    #[test]
    fn test_recording_without_recorder() {
        // No recorder installed: every helper must be a silent no-op
        register_metrics();
        record_analysis(0.1, 3);
        record_provider_request("static", "search", 0.01, true);
        record_candidates_ranked("gap", 12);
        record_fix_action("gap");
        record_refine(false);
        record_cache(true, "search");
    }
}

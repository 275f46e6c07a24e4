//! Refine handler

use axum::{extract::State, Json};
use std::time::Instant;
use tracing::info;

use crate::AppState;
use refscore_analysis::RefineOptions;
use refscore_common::{
    errors::Result,
    refine::{RefineRequest, RefineResponse},
};

/// Cite sources for every unsupported claim in a bare manuscript.
///
/// Progress is broadcast to `/ws` subscribers while the pass runs.
pub async fn refine(
    State(state): State<AppState>,
    Json(request): Json<RefineRequest>,
) -> Result<Json<RefineResponse>> {
    let start = Instant::now();

    let options = RefineOptions {
        max_results: request.max_results(),
        no_cache: request.no_cache(),
    };

    let response = state
        .refiner
        .refine(&request.manuscript_text, options, &state.progress)
        .await?;

    info!(
        manuscript_len = request.manuscript_text.len(),
        no_cache = options.no_cache,
        duration_ms = start.elapsed().as_millis() as u64,
        "Refine request completed"
    );

    Ok(Json(response))
}

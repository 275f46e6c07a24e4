//! Analysis and fix-plan handlers

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;
use validator::Validate;

use crate::AppState;
use refscore_analysis::apply_fix;
use refscore_common::{
    errors::{AppError, Result},
    models::{AnalysisResult, ApplyOutcome, FixAction, Reference},
};

/// Manuscript and bibliography to analyze
#[derive(Debug, Deserialize, Validate)]
pub struct AnalyzeRequest {
    #[validate(length(max = 4000000))]
    pub manuscript: String,

    #[serde(default)]
    pub bibliography: String,
}

#[derive(Serialize)]
pub struct FixPlanResponse {
    pub analysis: AnalysisResult,
    pub actions: Vec<FixAction>,
}

/// A planned action to apply to the current texts
#[derive(Debug, Deserialize, Validate)]
pub struct ApplyRequest {
    pub action: FixAction,

    #[validate(length(min = 1))]
    pub manuscript: String,

    #[serde(default)]
    pub bibliography: String,

    /// Source picked by the user; the first suggestion otherwise
    #[serde(default)]
    pub chosen: Option<Reference>,
}

fn validation_error(e: validator::ValidationErrors) -> AppError {
    AppError::Validation {
        message: e.to_string(),
        field: None,
    }
}

/// Run a full analysis pass
pub async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalysisResult>> {
    request.validate().map_err(validation_error)?;

    let result = state
        .analyzer
        .analyze(&request.manuscript, &request.bibliography)
        .await?;
    Ok(Json(result))
}

/// Analyze, then plan fixes for every sentence
pub async fn fix_plan(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<FixPlanResponse>> {
    let start = Instant::now();
    request.validate().map_err(validation_error)?;

    let analysis = state
        .analyzer
        .analyze(&request.manuscript, &request.bibliography)
        .await?;
    let actions = state.planner.generate_plan(&analysis).await;

    info!(
        sentences = analysis.analyzed_sentences.len(),
        actions = actions.len(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Fix plan generated"
    );

    Ok(Json(FixPlanResponse { analysis, actions }))
}

/// Apply one action. A stale target or missing source yields a `no_op`
/// outcome with a notice, not an error.
pub async fn apply(Json(request): Json<ApplyRequest>) -> Result<Json<ApplyOutcome>> {
    request.validate().map_err(validation_error)?;

    let outcome = apply_fix(
        &request.action,
        &request.manuscript,
        &request.bibliography,
        request.chosen.as_ref(),
    );
    if let ApplyOutcome::NoOp { notice } = &outcome {
        info!(action = %request.action.id, notice = %notice, "Fix not applied");
    }
    Ok(Json(outcome))
}

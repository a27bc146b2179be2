//! Dispatch trigger handlers
//!
//! The worker sweeps on its own interval; these endpoints let an external
//! scheduler or an operator force the same work to happen right now.

use axum::{extract::State, http::StatusCode, Extension, Json};
use dialcast_core::{DispatchSummary, SweepSummary};
use dialcast_storage::repository::CampaignRepository;
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use crate::auth::{AppState, AuthContext};
use crate::handlers::campaigns::ErrorResponse;

/// Request body for running one dispatch unit
#[derive(Debug, Deserialize)]
pub struct RunDispatchRequest {
    pub campaign_id: Uuid,
}

/// Run one dispatch unit for a campaign
///
/// POST /api/v1/dispatch/run
///
/// A no-op for campaigns that are not running or are outside their call
/// window; the summary says which.
pub async fn run_dispatch(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(input): Json<RunDispatchRequest>,
) -> Result<Json<DispatchSummary>, (StatusCode, Json<ErrorResponse>)> {
    let repo = CampaignRepository::new(state.db_pool.pool().clone());

    // Owner check before any dialing happens
    let campaign = repo
        .get_by_user(auth.user_id, input.campaign_id)
        .await
        .map_err(|e| {
            error!("Failed to load campaign for dispatch: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "internal_error".to_string(),
                    message: "Failed to run dispatch".to_string(),
                }),
            )
        })?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: "not_found".to_string(),
                    message: "Campaign not found".to_string(),
                }),
            )
        })?;

    let summary = state.worker.run_unit(campaign.id).await.map_err(|e| {
        error!("Dispatch unit for campaign {} failed: {}", campaign.id, e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "internal_error".to_string(),
                message: "Failed to run dispatch".to_string(),
            }),
        )
    })?;

    Ok(Json(summary))
}

/// Sweep all due work: promote scheduled campaigns, advance running ones,
/// and spawn recurring occurrences
///
/// POST /api/v1/dispatch/process-due
pub async fn process_due(State(state): State<Arc<AppState>>) -> Json<SweepSummary> {
    Json(state.worker.process_due().await)
}

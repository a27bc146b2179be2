//! Campaign handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use dialcast_core::{CampaignError, NewCampaign, RecurrenceSettings};
use dialcast_storage::models::{
    Campaign, CampaignStats, CampaignStatus, CreateRecipient, Recipient, RecurrenceType,
    UpdateCampaign,
};
use dialcast_storage::repository::{CampaignRepository, RecipientRepository};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::{AppState, AuthContext};

/// Error response
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Query parameters for listing campaigns
#[derive(Debug, Deserialize)]
pub struct ListCampaignsQuery {
    pub status: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// Campaign list response
#[derive(Debug, Serialize)]
pub struct CampaignListResponse {
    pub data: Vec<CampaignResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Campaign response
#[derive(Debug, Serialize)]
pub struct CampaignResponse {
    pub id: Uuid,
    pub name: String,
    pub caller_number: String,
    pub agent_id: Uuid,
    pub purpose: Option<String>,
    pub goal: Option<String>,
    pub template_id: Option<Uuid>,
    pub send_now: bool,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub window_start: String,
    pub window_end: String,
    pub window_days: Vec<i32>,
    pub max_concurrency: i32,
    pub recurrence_type: Option<String>,
    pub recurrence_interval: i32,
    pub recurrence_end_date: Option<DateTime<Utc>>,
    pub recurrence_max_runs: Option<i32>,
    pub run_count: i32,
    pub parent_campaign_id: Option<Uuid>,
    pub occurrence_number: Option<i32>,
    pub total_recipients: i32,
    pub completed_count: i32,
    pub failed_count: i32,
    pub progress_percentage: f64,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Campaign> for CampaignResponse {
    fn from(c: Campaign) -> Self {
        let progress = c.progress_percentage();
        Self {
            id: c.id,
            name: c.name,
            caller_number: c.caller_number,
            agent_id: c.agent_id,
            purpose: c.purpose,
            goal: c.goal,
            template_id: c.template_id,
            send_now: c.send_now,
            scheduled_at: c.scheduled_at,
            window_start: c.window_start,
            window_end: c.window_end,
            window_days: c.window_days,
            max_concurrency: c.max_concurrency,
            recurrence_type: c.recurrence_type,
            recurrence_interval: c.recurrence_interval,
            recurrence_end_date: c.recurrence_end_date,
            recurrence_max_runs: c.recurrence_max_runs,
            run_count: c.run_count,
            parent_campaign_id: c.parent_campaign_id,
            occurrence_number: c.occurrence_number,
            total_recipients: c.total_recipients,
            completed_count: c.completed_count,
            failed_count: c.failed_count,
            progress_percentage: progress,
            status: c.status,
            started_at: c.started_at,
            completed_at: c.completed_at,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// Recipient response
#[derive(Debug, Serialize)]
pub struct RecipientResponse {
    pub id: Uuid,
    pub sort_order: i32,
    pub phone_number: String,
    pub name: Option<String>,
    pub contact_id: Option<Uuid>,
    pub call_record_id: Option<Uuid>,
    pub status: String,
    pub error_message: Option<String>,
    pub attempted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Recipient> for RecipientResponse {
    fn from(r: Recipient) -> Self {
        Self {
            id: r.id,
            sort_order: r.sort_order,
            phone_number: r.phone_number,
            name: r.name,
            contact_id: r.contact_id,
            call_record_id: r.call_record_id,
            status: r.status,
            error_message: r.error_message,
            attempted_at: r.attempted_at,
            completed_at: r.completed_at,
        }
    }
}

/// Campaign detail response with the full recipient list
#[derive(Debug, Serialize)]
pub struct CampaignDetailResponse {
    pub campaign: CampaignResponse,
    pub recipients: Vec<RecipientResponse>,
}

/// Recipient entry in a create request
#[derive(Debug, Deserialize)]
pub struct RecipientInput {
    pub phone_number: String,
    pub name: Option<String>,
    pub contact_id: Option<Uuid>,
}

/// Request body for creating a campaign
#[derive(Debug, Deserialize)]
pub struct CreateCampaignRequest {
    pub name: String,
    pub caller_number: String,
    pub agent_id: Uuid,
    pub purpose: Option<String>,
    pub goal: Option<String>,
    pub template_id: Option<Uuid>,
    #[serde(default = "default_send_now")]
    pub send_now: bool,
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default = "default_window_start")]
    pub window_start: String,
    #[serde(default = "default_window_end")]
    pub window_end: String,
    #[serde(default = "default_window_days")]
    pub window_days: Vec<i32>,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: i32,
    pub recurrence_type: Option<String>,
    #[serde(default = "default_recurrence_interval")]
    pub recurrence_interval: i32,
    pub recurrence_end_date: Option<DateTime<Utc>>,
    pub recurrence_max_runs: Option<i32>,
    pub recipients: Vec<RecipientInput>,
}

fn default_send_now() -> bool {
    true
}

fn default_window_start() -> String {
    "00:00".to_string()
}

fn default_window_end() -> String {
    "23:59".to_string()
}

fn default_window_days() -> Vec<i32> {
    vec![0, 1, 2, 3, 4, 5, 6]
}

fn default_max_concurrency() -> i32 {
    1
}

fn default_recurrence_interval() -> i32 {
    1
}

/// Request body for updating a draft campaign
#[derive(Debug, Deserialize)]
pub struct UpdateCampaignRequest {
    pub name: Option<String>,
    pub caller_number: Option<String>,
    pub agent_id: Option<Uuid>,
    pub purpose: Option<String>,
    pub goal: Option<String>,
    pub template_id: Option<Uuid>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub window_start: Option<String>,
    pub window_end: Option<String>,
    pub window_days: Option<Vec<i32>>,
    pub max_concurrency: Option<i32>,
}

/// Map a lifecycle error onto an HTTP error response
fn campaign_error(action: &str, e: CampaignError) -> (StatusCode, Json<ErrorResponse>) {
    error!("Failed to {} campaign: {}", action, e);
    match e {
        CampaignError::NotFound => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "not_found".to_string(),
                message: "Campaign not found".to_string(),
            }),
        ),
        CampaignError::Database(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "internal_error".to_string(),
                message: format!("Failed to {} campaign", action),
            }),
        ),
        other => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "invalid_request".to_string(),
                message: other.to_string(),
            }),
        ),
    }
}

/// Recurrence settings from the raw request fields.
///
/// A missing, empty, or `none` type means a one-shot campaign.
fn parse_recurrence(
    recurrence_type: Option<String>,
    interval: i32,
    end_date: Option<DateTime<Utc>>,
    max_runs: Option<i32>,
) -> Result<Option<RecurrenceSettings>, (StatusCode, Json<ErrorResponse>)> {
    let raw = match recurrence_type {
        Some(t) if !t.is_empty() && t != "none" => t,
        _ => return Ok(None),
    };

    let parsed: RecurrenceType = raw.parse().map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "validation_error".to_string(),
                message: format!("Unknown recurrence type: {}", raw),
            }),
        )
    })?;

    Ok(Some(RecurrenceSettings {
        recurrence_type: parsed,
        interval,
        end_date,
        max_runs,
    }))
}

/// Fire one dispatch unit in the background. Failures are logged; the
/// worker's next sweep picks up whatever this attempt left behind.
fn kick_dispatch(state: &Arc<AppState>, campaign_id: Uuid) {
    let worker = state.worker.clone();
    tokio::spawn(async move {
        if let Err(e) = worker.run_unit(campaign_id).await {
            error!("Dispatch unit for campaign {} failed: {}", campaign_id, e);
        }
    });
}

/// List campaigns for the authenticated user
///
/// GET /api/v1/campaigns
pub async fn list_campaigns(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListCampaignsQuery>,
) -> Result<Json<CampaignListResponse>, (StatusCode, Json<ErrorResponse>)> {
    let repo = CampaignRepository::new(state.db_pool.pool().clone());

    let status = query.status.and_then(|s| s.parse::<CampaignStatus>().ok());

    let campaigns = repo
        .list_by_user(auth.user_id, status, query.limit, query.offset)
        .await
        .map_err(|e| {
            error!("Failed to list campaigns: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "internal_error".to_string(),
                    message: "Failed to list campaigns".to_string(),
                }),
            )
        })?;

    let total = repo.count_by_user(auth.user_id, status).await.unwrap_or(0);

    let data = campaigns.into_iter().map(CampaignResponse::from).collect();

    Ok(Json(CampaignListResponse {
        data,
        total,
        limit: query.limit,
        offset: query.offset,
    }))
}

/// Create a new campaign
///
/// POST /api/v1/campaigns
///
/// `send_now` campaigns are started immediately and get their first dispatch
/// unit in the background.
pub async fn create_campaign(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(input): Json<CreateCampaignRequest>,
) -> Result<(StatusCode, Json<CampaignResponse>), (StatusCode, Json<ErrorResponse>)> {
    let recurrence = parse_recurrence(
        input.recurrence_type,
        input.recurrence_interval,
        input.recurrence_end_date,
        input.recurrence_max_runs,
    )?;

    let send_now = input.send_now;

    let recipients = input
        .recipients
        .into_iter()
        .map(|r| CreateRecipient {
            phone_number: r.phone_number,
            name: r.name,
            contact_id: r.contact_id,
        })
        .collect();

    let new_campaign = NewCampaign {
        user_id: auth.user_id,
        name: input.name,
        caller_number: input.caller_number,
        agent_id: input.agent_id,
        purpose: input.purpose,
        goal: input.goal,
        template_id: input.template_id,
        send_now,
        scheduled_at: input.scheduled_at,
        window_start: input.window_start,
        window_end: input.window_end,
        window_days: input.window_days,
        max_concurrency: input.max_concurrency,
        recurrence,
        recipients,
    };

    let mut campaign = state
        .manager
        .create(new_campaign)
        .await
        .map_err(|e| campaign_error("create", e))?;

    info!("Created campaign {} for user {}", campaign.id, auth.user_id);

    // Recurring parents are never dialed; scheduled campaigns wait for the
    // sweep. Only a send_now draft goes straight to running.
    if send_now && campaign.status_enum() == Some(CampaignStatus::Draft) {
        match state.manager.start(auth.user_id, campaign.id).await {
            Ok(started) => {
                kick_dispatch(&state, started.id);
                campaign = started;
            }
            Err(e) => {
                error!("Failed to auto-start campaign {}: {}", campaign.id, e);
            }
        }
    }

    Ok((StatusCode::CREATED, Json(CampaignResponse::from(campaign))))
}

/// Get a campaign with its recipient list
///
/// GET /api/v1/campaigns/:campaign_id
pub async fn get_campaign(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<CampaignDetailResponse>, (StatusCode, Json<ErrorResponse>)> {
    let repo = CampaignRepository::new(state.db_pool.pool().clone());

    let campaign = repo
        .get_by_user(auth.user_id, campaign_id)
        .await
        .map_err(|e| {
            error!("Failed to get campaign: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "internal_error".to_string(),
                    message: "Failed to get campaign".to_string(),
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

    let recipient_repo = RecipientRepository::new(state.db_pool.pool().clone());
    let recipients = recipient_repo
        .list_by_campaign(campaign.id)
        .await
        .map_err(|e| {
            error!("Failed to list campaign recipients: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "internal_error".to_string(),
                    message: "Failed to get campaign".to_string(),
                }),
            )
        })?;

    Ok(Json(CampaignDetailResponse {
        campaign: CampaignResponse::from(campaign),
        recipients: recipients.into_iter().map(RecipientResponse::from).collect(),
    }))
}

/// Update a draft campaign
///
/// PUT /api/v1/campaigns/:campaign_id
pub async fn update_campaign(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<Uuid>,
    Json(input): Json<UpdateCampaignRequest>,
) -> Result<Json<CampaignResponse>, (StatusCode, Json<ErrorResponse>)> {
    let update_input = UpdateCampaign {
        name: input.name,
        caller_number: input.caller_number,
        agent_id: input.agent_id,
        purpose: input.purpose,
        goal: input.goal,
        template_id: input.template_id,
        scheduled_at: input.scheduled_at,
        window_start: input.window_start,
        window_end: input.window_end,
        window_days: input.window_days,
        max_concurrency: input.max_concurrency,
    };

    let campaign = state
        .manager
        .update(auth.user_id, campaign_id, update_input)
        .await
        .map_err(|e| campaign_error("update", e))?;

    info!("Updated campaign {}", campaign_id);

    Ok(Json(CampaignResponse::from(campaign)))
}

/// Delete a draft campaign
///
/// DELETE /api/v1/campaigns/:campaign_id
pub async fn delete_campaign(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    state
        .manager
        .delete(auth.user_id, campaign_id)
        .await
        .map_err(|e| campaign_error("delete", e))?;

    info!("Deleted campaign {}", campaign_id);

    Ok(StatusCode::NO_CONTENT)
}

/// Start a campaign
///
/// POST /api/v1/campaigns/:campaign_id/start
///
/// Starting a terminal campaign re-runs it from scratch.
pub async fn start_campaign(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<CampaignResponse>, (StatusCode, Json<ErrorResponse>)> {
    let campaign = state
        .manager
        .start(auth.user_id, campaign_id)
        .await
        .map_err(|e| campaign_error("start", e))?;

    kick_dispatch(&state, campaign.id);

    info!("Started campaign {}", campaign_id);

    Ok(Json(CampaignResponse::from(campaign)))
}

/// Pause a running campaign or a recurring parent
///
/// POST /api/v1/campaigns/:campaign_id/pause
pub async fn pause_campaign(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<CampaignResponse>, (StatusCode, Json<ErrorResponse>)> {
    let campaign = state
        .manager
        .pause(auth.user_id, campaign_id)
        .await
        .map_err(|e| campaign_error("pause", e))?;

    info!("Paused campaign {}", campaign_id);

    Ok(Json(CampaignResponse::from(campaign)))
}

/// Resume a paused campaign
///
/// POST /api/v1/campaigns/:campaign_id/resume
pub async fn resume_campaign(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<CampaignResponse>, (StatusCode, Json<ErrorResponse>)> {
    let campaign = state
        .manager
        .resume(auth.user_id, campaign_id)
        .await
        .map_err(|e| campaign_error("resume", e))?;

    // A resumed one-shot goes back to running; give it a unit right away
    // rather than waiting out the poll interval
    if campaign.status_enum() == Some(CampaignStatus::Running) {
        kick_dispatch(&state, campaign.id);
    }

    info!("Resumed campaign {}", campaign_id);

    Ok(Json(CampaignResponse::from(campaign)))
}

/// Cancel a campaign
///
/// POST /api/v1/campaigns/:campaign_id/cancel
pub async fn cancel_campaign(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<CampaignResponse>, (StatusCode, Json<ErrorResponse>)> {
    let campaign = state
        .manager
        .cancel(auth.user_id, campaign_id)
        .await
        .map_err(|e| campaign_error("cancel", e))?;

    info!("Cancelled campaign {}", campaign_id);

    Ok(Json(CampaignResponse::from(campaign)))
}

/// Get campaign statistics
///
/// GET /api/v1/campaigns/:campaign_id/stats
pub async fn get_campaign_stats(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<CampaignStats>, (StatusCode, Json<ErrorResponse>)> {
    let stats = state
        .manager
        .stats(auth.user_id, campaign_id)
        .await
        .map_err(|e| campaign_error("get stats for", e))?;

    Ok(Json(stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn create_request_fills_dial_defaults() {
        let input: CreateCampaignRequest = serde_json::from_value(serde_json::json!({
            "name": "Renewal reminders",
            "caller_number": "+15550001111",
            "agent_id": "7c9e6679-7425-40de-944b-e07fc1f90ae7",
            "recipients": [{"phone_number": "+15550002222"}],
        }))
        .expect("minimal create request should deserialize");

        assert!(input.send_now);
        assert_eq!(input.window_start, "00:00");
        assert_eq!(input.window_end, "23:59");
        assert_eq!(input.window_days, vec![0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(input.max_concurrency, 1);
        assert_eq!(input.recurrence_interval, 1);
        assert!(input.scheduled_at.is_none());
        assert!(input.recurrence_type.is_none());
    }

    #[test]
    fn blank_recurrence_type_means_one_shot() {
        assert!(parse_recurrence(None, 1, None, None).unwrap().is_none());
        assert!(parse_recurrence(Some(String::new()), 1, None, None)
            .unwrap()
            .is_none());
        assert!(parse_recurrence(Some("none".to_string()), 1, None, None)
            .unwrap()
            .is_none());
    }

    #[test]
    fn recurrence_type_parses_or_rejects() {
        let settings = parse_recurrence(Some("weekly".to_string()), 2, None, Some(5))
            .unwrap()
            .expect("weekly should produce settings");
        assert_eq!(settings.recurrence_type, RecurrenceType::Weekly);
        assert_eq!(settings.interval, 2);
        assert_eq!(settings.max_runs, Some(5));

        assert!(parse_recurrence(Some("fortnightly".to_string()), 1, None, None).is_err());
    }
}

//! Campaign Manager - Handles campaign lifecycle and validation

use super::window::{CallWindow, WindowError};
use chrono::{DateTime, Utc};
use dialcast_common::types::{AgentId, TemplateId, UserId};
use dialcast_storage::db::DatabasePool;
use dialcast_storage::models::{
    Campaign, CampaignStats, CampaignStatus, CreateCampaign, CreateRecipient, RecurrenceType,
    UpdateCampaign,
};
use dialcast_storage::repository::{
    CampaignRepository, PhoneNumberRepository, RecipientRepository,
};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Campaign manager errors
#[derive(Error, Debug)]
pub enum CampaignError {
    #[error("Campaign not found")]
    NotFound,

    #[error("Campaign name is required")]
    EmptyName,

    #[error("Recipient list must not be empty")]
    EmptyRecipients,

    #[error("Recipient list exceeds the maximum of {0}")]
    TooManyRecipients(usize),

    #[error("Caller number is not one of your active numbers")]
    CallerNumberNotOwned,

    #[error("Invalid call window: {0}")]
    InvalidWindow(#[from] WindowError),

    #[error("Concurrency must be at least 1")]
    InvalidConcurrency,

    #[error("Recurrence interval must be at least 1")]
    InvalidRecurrenceInterval,

    #[error("Campaign is not in draft status")]
    NotDraft,

    #[error("Cannot {action} campaign in {status} status")]
    InvalidTransition {
        action: &'static str,
        status: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Recurrence settings on a new campaign
#[derive(Debug, Clone)]
pub struct RecurrenceSettings {
    pub recurrence_type: RecurrenceType,
    pub interval: i32,
    pub end_date: Option<DateTime<Utc>>,
    pub max_runs: Option<i32>,
}

/// Validated input for creating a campaign
#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub user_id: UserId,
    pub name: String,
    pub caller_number: String,
    pub agent_id: AgentId,
    pub purpose: Option<String>,
    pub goal: Option<String>,
    pub template_id: Option<TemplateId>,
    pub send_now: bool,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub window_start: String,
    pub window_end: String,
    pub window_days: Vec<i32>,
    pub max_concurrency: i32,
    pub recurrence: Option<RecurrenceSettings>,
    pub recipients: Vec<CreateRecipient>,
}

/// Campaign Manager - Owner-scoped lifecycle operations
pub struct CampaignManager {
    campaign_repo: CampaignRepository,
    recipient_repo: RecipientRepository,
    phone_repo: PhoneNumberRepository,
    /// Upper bound on recipients per campaign
    max_recipients: usize,
}

impl CampaignManager {
    /// Create a new campaign manager
    pub fn new(db_pool: DatabasePool) -> Self {
        let pool = db_pool.pool().clone();
        Self {
            campaign_repo: CampaignRepository::new(pool.clone()),
            recipient_repo: RecipientRepository::new(pool.clone()),
            phone_repo: PhoneNumberRepository::new(pool),
            max_recipients: 500,
        }
    }

    /// Set the recipient list size limit
    pub fn with_max_recipients(mut self, limit: usize) -> Self {
        self.max_recipients = limit;
        self
    }

    /// Create a campaign with its recipient list.
    ///
    /// The caller number must be an active number owned by the user. The
    /// initial status is `recurring` for recurring parents, `scheduled`
    /// when a future start is requested, and `draft` otherwise; `send_now`
    /// is stored but acted on by the caller.
    pub async fn create(&self, input: NewCampaign) -> Result<Campaign, CampaignError> {
        if input.name.trim().is_empty() {
            return Err(CampaignError::EmptyName);
        }

        if input.recipients.is_empty() {
            return Err(CampaignError::EmptyRecipients);
        }

        if input.recipients.len() > self.max_recipients {
            return Err(CampaignError::TooManyRecipients(self.max_recipients));
        }

        CallWindow::parse(&input.window_start, &input.window_end, &input.window_days)?;

        if input.max_concurrency < 1 {
            return Err(CampaignError::InvalidConcurrency);
        }

        if let Some(ref recurrence) = input.recurrence {
            if recurrence.interval < 1 {
                return Err(CampaignError::InvalidRecurrenceInterval);
            }
        }

        let owned = self
            .phone_repo
            .get_active(input.user_id, &input.caller_number)
            .await?;
        if owned.is_none() {
            return Err(CampaignError::CallerNumberNotOwned);
        }

        let status = if input.recurrence.is_some() {
            CampaignStatus::Recurring
        } else if input.scheduled_at.is_some() && !input.send_now {
            CampaignStatus::Scheduled
        } else {
            CampaignStatus::Draft
        };

        let recipient_count = input.recipients.len();
        let create = CreateCampaign {
            user_id: input.user_id,
            name: input.name.trim().to_string(),
            caller_number: input.caller_number,
            agent_id: input.agent_id,
            purpose: input.purpose,
            goal: input.goal,
            template_id: input.template_id,
            send_now: input.send_now,
            scheduled_at: input.scheduled_at,
            window_start: input.window_start,
            window_end: input.window_end,
            window_days: input.window_days,
            max_concurrency: input.max_concurrency,
            recurrence_type: input.recurrence.as_ref().map(|r| r.recurrence_type),
            recurrence_interval: input.recurrence.as_ref().map(|r| r.interval).unwrap_or(1),
            recurrence_end_date: input.recurrence.as_ref().and_then(|r| r.end_date),
            recurrence_max_runs: input.recurrence.as_ref().and_then(|r| r.max_runs),
            parent_campaign_id: None,
            occurrence_number: None,
            status,
        };

        let campaign = self
            .campaign_repo
            .create_with_recipients(create, input.recipients)
            .await?;

        info!(
            "Campaign {} created as {} with {} recipients",
            campaign.id, campaign.status, recipient_count
        );

        Ok(campaign)
    }

    /// Start a campaign.
    ///
    /// Draft and scheduled campaigns begin running; a terminal campaign is
    /// reset and re-run from scratch. Recurring parents never start, their
    /// children do.
    pub async fn start(&self, user_id: UserId, campaign_id: Uuid) -> Result<Campaign, CampaignError> {
        let campaign = self
            .campaign_repo
            .get_by_user(user_id, campaign_id)
            .await?
            .ok_or(CampaignError::NotFound)?;

        if campaign.is_recurring_parent() {
            return Err(CampaignError::InvalidTransition {
                action: "start",
                status: campaign.status,
            });
        }

        let from = match campaign.status_enum() {
            Some(status @ (CampaignStatus::Draft | CampaignStatus::Scheduled)) => status,
            Some(status @ (CampaignStatus::Completed
            | CampaignStatus::Cancelled
            | CampaignStatus::Failed)) => {
                let reset = self.recipient_repo.reset_to_pending(campaign_id).await?;
                self.campaign_repo.reset_for_rerun(campaign_id).await?;
                info!(
                    "Campaign {} reset for re-run ({} recipients back to pending)",
                    campaign_id, reset
                );
                status
            }
            _ => {
                return Err(CampaignError::InvalidTransition {
                    action: "start",
                    status: campaign.status,
                });
            }
        };

        let updated = self
            .campaign_repo
            .transition(campaign_id, from, CampaignStatus::Running)
            .await?
            .ok_or_else(|| CampaignError::InvalidTransition {
                action: "start",
                status: campaign.status.clone(),
            })?;

        info!("Campaign {} started", campaign_id);

        Ok(updated)
    }

    /// Pause a running campaign, or suspend a recurring parent's spawning
    pub async fn pause(&self, user_id: UserId, campaign_id: Uuid) -> Result<Campaign, CampaignError> {
        let campaign = self
            .campaign_repo
            .get_by_user(user_id, campaign_id)
            .await?
            .ok_or(CampaignError::NotFound)?;

        let from = match campaign.status_enum() {
            Some(status @ (CampaignStatus::Running | CampaignStatus::Recurring)) => status,
            _ => {
                return Err(CampaignError::InvalidTransition {
                    action: "pause",
                    status: campaign.status,
                });
            }
        };

        let updated = self
            .campaign_repo
            .transition(campaign_id, from, CampaignStatus::Paused)
            .await?
            .ok_or_else(|| CampaignError::InvalidTransition {
                action: "pause",
                status: campaign.status.clone(),
            })?;

        info!("Campaign {} paused", campaign_id);

        Ok(updated)
    }

    /// Resume a paused campaign to running, or a parent back to recurring
    pub async fn resume(&self, user_id: UserId, campaign_id: Uuid) -> Result<Campaign, CampaignError> {
        let campaign = self
            .campaign_repo
            .get_by_user(user_id, campaign_id)
            .await?
            .ok_or(CampaignError::NotFound)?;

        if campaign.status_enum() != Some(CampaignStatus::Paused) {
            return Err(CampaignError::InvalidTransition {
                action: "resume",
                status: campaign.status,
            });
        }

        let to = if campaign.is_recurring_parent() {
            CampaignStatus::Recurring
        } else {
            CampaignStatus::Running
        };

        let updated = self
            .campaign_repo
            .transition(campaign_id, CampaignStatus::Paused, to)
            .await?
            .ok_or_else(|| CampaignError::InvalidTransition {
                action: "resume",
                status: campaign.status.clone(),
            })?;

        info!("Campaign {} resumed as {}", campaign_id, updated.status);

        Ok(updated)
    }

    /// Cancel a campaign from any non-terminal status.
    ///
    /// Pending recipients are skipped; in-flight calls finish on their own
    /// through the status callback. Cancelling a recurring parent also
    /// cancels its active children.
    pub async fn cancel(&self, user_id: UserId, campaign_id: Uuid) -> Result<Campaign, CampaignError> {
        let campaign = self
            .campaign_repo
            .get_by_user(user_id, campaign_id)
            .await?
            .ok_or(CampaignError::NotFound)?;

        let from = match campaign.status_enum() {
            Some(status) if !status.is_terminal() => status,
            _ => {
                return Err(CampaignError::InvalidTransition {
                    action: "cancel",
                    status: campaign.status,
                });
            }
        };

        let updated = self
            .campaign_repo
            .transition(campaign_id, from, CampaignStatus::Cancelled)
            .await?
            .ok_or_else(|| CampaignError::InvalidTransition {
                action: "cancel",
                status: campaign.status.clone(),
            })?;

        let skipped = self.recipient_repo.skip_pending(campaign_id).await?;

        if campaign.is_recurring_parent() {
            let children = self.campaign_repo.list_active_children(campaign_id).await?;
            for child in children {
                let Some(child_status) = child.status_enum() else {
                    continue;
                };
                if self
                    .campaign_repo
                    .transition(child.id, child_status, CampaignStatus::Cancelled)
                    .await?
                    .is_some()
                {
                    let child_skipped = self.recipient_repo.skip_pending(child.id).await?;
                    info!(
                        "Cancelled occurrence {} of campaign {} ({} pending recipients skipped)",
                        child.id, campaign_id, child_skipped
                    );
                }
            }
        }

        info!(
            "Campaign {} cancelled, {} pending recipients skipped",
            campaign_id, skipped
        );

        Ok(updated)
    }

    /// Update a draft campaign
    pub async fn update(
        &self,
        user_id: UserId,
        campaign_id: Uuid,
        input: UpdateCampaign,
    ) -> Result<Campaign, CampaignError> {
        let campaign = self
            .campaign_repo
            .get_by_user(user_id, campaign_id)
            .await?
            .ok_or(CampaignError::NotFound)?;

        if campaign.status_enum() != Some(CampaignStatus::Draft) {
            return Err(CampaignError::NotDraft);
        }

        if let Some(ref name) = input.name {
            if name.trim().is_empty() {
                return Err(CampaignError::EmptyName);
            }
        }

        // The merged window must stay valid even when only one side changes
        let start = input
            .window_start
            .clone()
            .unwrap_or_else(|| campaign.window_start.clone());
        let end = input
            .window_end
            .clone()
            .unwrap_or_else(|| campaign.window_end.clone());
        let days = input
            .window_days
            .clone()
            .unwrap_or_else(|| campaign.window_days.clone());
        CallWindow::parse(&start, &end, &days)?;

        if let Some(max_concurrency) = input.max_concurrency {
            if max_concurrency < 1 {
                return Err(CampaignError::InvalidConcurrency);
            }
        }

        if let Some(ref number) = input.caller_number {
            if self.phone_repo.get_active(user_id, number).await?.is_none() {
                return Err(CampaignError::CallerNumberNotOwned);
            }
        }

        self.campaign_repo
            .update(campaign_id, user_id, input)
            .await?
            .ok_or(CampaignError::NotDraft)
    }

    /// Delete a draft campaign
    pub async fn delete(&self, user_id: UserId, campaign_id: Uuid) -> Result<(), CampaignError> {
        let campaign = self
            .campaign_repo
            .get_by_user(user_id, campaign_id)
            .await?
            .ok_or(CampaignError::NotFound)?;

        if campaign.status_enum() != Some(CampaignStatus::Draft) {
            return Err(CampaignError::NotDraft);
        }

        if !self.campaign_repo.delete(campaign_id, user_id).await? {
            return Err(CampaignError::NotDraft);
        }

        info!("Campaign {} deleted", campaign_id);

        Ok(())
    }

    /// Get campaign statistics
    pub async fn stats(
        &self,
        user_id: UserId,
        campaign_id: Uuid,
    ) -> Result<CampaignStats, CampaignError> {
        let campaign = self
            .campaign_repo
            .get_by_user(user_id, campaign_id)
            .await?
            .ok_or(CampaignError::NotFound)?;

        let counts = self.recipient_repo.counts(campaign_id).await?;
        let progress = campaign.progress_percentage();

        Ok(CampaignStats {
            campaign_id,
            status: campaign.status,
            total_recipients: campaign.total_recipients,
            pending: counts.pending,
            calling: counts.calling,
            completed: counts.completed,
            failed: counts.failed,
            skipped: counts.skipped,
            completed_count: campaign.completed_count,
            failed_count: campaign.failed_count,
            progress_percentage: progress,
        })
    }

    /// Check whether a running campaign has drained and complete it if so.
    ///
    /// Counts are read fresh from the recipient rows rather than trusting
    /// the incremental counters. Returns the parent campaign id when a
    /// completed child has one, so the caller can nudge the recurrence
    /// spawner.
    pub async fn check_completion(
        &self,
        campaign_id: Uuid,
    ) -> Result<Option<Uuid>, CampaignError> {
        let counts = self.recipient_repo.counts(campaign_id).await?;
        if !counts.is_drained() {
            return Ok(None);
        }

        match self
            .campaign_repo
            .transition(campaign_id, CampaignStatus::Running, CampaignStatus::Completed)
            .await?
        {
            Some(campaign) => {
                info!(
                    "Campaign {} completed ({} completed, {} failed, {} skipped)",
                    campaign_id, counts.completed, counts.failed, counts.skipped
                );
                Ok(campaign.parent_campaign_id)
            }
            None => Ok(None),
        }
    }
}

//! Campaign Dispatch Worker - Drives running campaigns through dispatch units
//!
//! Each dispatch unit claims a bounded chunk of pending recipients for one
//! campaign, bridges them, and checks for drain. Any unit is safe to invoke
//! at any time for any campaign: ineligible campaigns are a no-op, and the
//! claim step is atomic, so concurrent units never dial the same recipient.
//! A long-lived worker sweeps everything due on an interval; the same units
//! can also be fired directly through the API.

use super::manager::CampaignManager;
use super::recurrence::RecurrenceSpawner;
use super::window::CallWindow;
use crate::telephony::BridgeOrchestrator;
use anyhow::Result;
use chrono::Utc;
use dialcast_storage::db::DatabasePool;
use dialcast_storage::models::{CampaignStatus, RecipientStatus};
use dialcast_storage::repository::{CampaignRepository, RecipientRepository};
use serde::Serialize;
use std::sync::Arc;
use tokio::time::{interval, sleep, Duration as TokioDuration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Outcome of one dispatch unit for one campaign
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchSummary {
    pub message: String,
    /// Recipients claimed by this unit
    pub processed: u32,
    /// Bridges successfully started
    pub initiated: u32,
    /// Claimed recipients that failed to dial
    pub failed: u32,
    /// Pending recipients left after this unit
    pub remaining: i64,
}

impl DispatchSummary {
    fn noop(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }
}

/// Outcome of one sweep across everything due
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepSummary {
    pub message: String,
    /// Scheduled campaigns promoted to running
    pub promoted: u32,
    /// Recipients claimed across all units
    pub processed: u32,
    /// Bridges successfully started
    pub initiated: u32,
    /// Claimed recipients that failed to dial
    pub failed: u32,
    /// Child occurrences spawned for recurring parents
    pub spawned: u32,
}

/// Slots open for new calls: the stricter of the system ceiling and the
/// campaign's requested concurrency, less calls already in flight.
fn available_slots(system_ceiling: i64, max_concurrency: i32, calling: i64) -> i64 {
    let limit = system_ceiling.min(max_concurrency.max(1) as i64);
    (limit - calling).max(0)
}

/// Campaign Dispatch Worker
pub struct CampaignDispatchWorker {
    campaign_repo: CampaignRepository,
    recipient_repo: RecipientRepository,
    campaign_manager: Arc<CampaignManager>,
    spawner: RecurrenceSpawner,
    bridge: BridgeOrchestrator,
    /// Maximum recipients claimed per unit
    chunk_size: i64,
    /// Delay between consecutive bridge starts in one unit
    inter_call_delay: TokioDuration,
    /// System-wide cap on concurrent calls per campaign
    system_ceiling: i64,
    /// Interval between sweeps (seconds)
    poll_interval_secs: u64,
}

impl CampaignDispatchWorker {
    /// Create a new dispatch worker
    pub fn new(
        db_pool: DatabasePool,
        campaign_manager: Arc<CampaignManager>,
        bridge: BridgeOrchestrator,
    ) -> Self {
        let pool = db_pool.pool().clone();

        Self {
            campaign_repo: CampaignRepository::new(pool.clone()),
            recipient_repo: RecipientRepository::new(pool),
            campaign_manager,
            spawner: RecurrenceSpawner::new(db_pool),
            bridge,
            chunk_size: 5,
            inter_call_delay: TokioDuration::from_millis(2000),
            system_ceiling: 5,
            poll_interval_secs: 60,
        }
    }

    /// Set the claim chunk size
    pub fn with_chunk_size(mut self, size: i64) -> Self {
        self.chunk_size = size;
        self
    }

    /// Set the delay between consecutive bridge starts
    pub fn with_inter_call_delay_ms(mut self, millis: u64) -> Self {
        self.inter_call_delay = TokioDuration::from_millis(millis);
        self
    }

    /// Set the system-wide concurrency ceiling
    pub fn with_system_ceiling(mut self, ceiling: i64) -> Self {
        self.system_ceiling = ceiling;
        self
    }

    /// Set the sweep interval
    pub fn with_poll_interval(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs;
        self
    }

    /// Run the dispatch worker
    pub async fn run(&self) {
        let mut ticker = interval(TokioDuration::from_secs(self.poll_interval_secs));

        info!(
            "Campaign dispatch worker started (chunk: {}, ceiling: {}, interval: {}s)",
            self.chunk_size, self.system_ceiling, self.poll_interval_secs
        );

        loop {
            ticker.tick().await;

            let summary = self.process_due().await;
            if summary.promoted > 0 || summary.processed > 0 || summary.spawned > 0 {
                debug!(
                    "Dispatch sweep: promoted {}, initiated {}, failed {}, spawned {}",
                    summary.promoted, summary.initiated, summary.failed, summary.spawned
                );
            }
        }
    }

    /// Sweep everything due: promote scheduled campaigns whose start time
    /// has passed, run a unit for every running campaign, and spawn due
    /// occurrences of recurring parents. Each step is best-effort; failures
    /// are logged without stalling the rest of the sweep.
    pub async fn process_due(&self) -> SweepSummary {
        let mut summary = SweepSummary::default();

        // Snapshot before promotions so a freshly promoted campaign gets
        // exactly one unit this sweep
        let running = self.campaign_repo.list_running().await.unwrap_or_else(|e| {
            error!("Failed to list running campaigns: {}", e);
            Vec::new()
        });

        match self.campaign_repo.get_scheduled_due().await {
            Ok(due) => {
                for campaign in due {
                    match self
                        .campaign_repo
                        .transition(campaign.id, CampaignStatus::Scheduled, CampaignStatus::Running)
                        .await
                    {
                        Ok(Some(_)) => {
                            info!("Promoted scheduled campaign {} to running", campaign.id);
                            summary.promoted += 1;
                            self.advance(campaign.id, &mut summary).await;
                        }
                        // Another sweep won the promotion
                        Ok(None) => {}
                        Err(e) => error!("Failed to promote campaign {}: {}", campaign.id, e),
                    }
                }
            }
            Err(e) => error!("Failed to list due scheduled campaigns: {}", e),
        }

        for campaign in &running {
            self.advance(campaign.id, &mut summary).await;
        }

        match self.spawner.spawn_due().await {
            Ok(children) => {
                summary.spawned = children.len() as u32;
                for child in children {
                    if child.status_enum() == Some(CampaignStatus::Running) {
                        self.advance(child.id, &mut summary).await;
                    }
                }
            }
            Err(e) => error!("Failed to spawn recurring occurrences: {}", e),
        }

        summary.message = format!(
            "Promoted {}, initiated {}, failed {}, spawned {}",
            summary.promoted, summary.initiated, summary.failed, summary.spawned
        );

        summary
    }

    /// Run one dispatch unit for one campaign.
    ///
    /// No-op conditions (wrong status, outside the call window, no free
    /// slots) return a summary describing why; per-recipient dial failures
    /// are folded into the summary. Only store failures before any call is
    /// placed surface as errors.
    pub async fn run_unit(&self, campaign_id: Uuid) -> Result<DispatchSummary> {
        let Some(campaign) = self.campaign_repo.get(campaign_id).await? else {
            return Ok(DispatchSummary::noop("Campaign not found"));
        };

        if campaign.status_enum() != Some(CampaignStatus::Running) {
            debug!(
                "Campaign {} is {}, skipping dispatch",
                campaign.id, campaign.status
            );
            return Ok(DispatchSummary::noop(format!(
                "Campaign is {}, not running",
                campaign.status
            )));
        }

        let window = match CallWindow::parse(
            &campaign.window_start,
            &campaign.window_end,
            &campaign.window_days,
        ) {
            Ok(window) => window,
            Err(e) => {
                warn!("Campaign {} has an invalid call window: {}", campaign.id, e);
                return Ok(DispatchSummary::noop(format!("Invalid call window: {}", e)));
            }
        };

        if !window.contains(Utc::now()) {
            debug!("Campaign {} is outside its call window", campaign.id);
            let counts = self.recipient_repo.counts(campaign.id).await?;
            return Ok(DispatchSummary {
                message: "Outside call window".to_string(),
                remaining: counts.pending,
                ..Default::default()
            });
        }

        let calling = self.recipient_repo.count_calling(campaign.id).await?;
        let slots = available_slots(self.system_ceiling, campaign.max_concurrency, calling);
        if slots == 0 {
            let counts = self.recipient_repo.counts(campaign.id).await?;
            return Ok(DispatchSummary {
                message: "All concurrency slots are in use".to_string(),
                remaining: counts.pending,
                ..Default::default()
            });
        }

        let claimed = self
            .recipient_repo
            .claim_batch(campaign.id, slots.min(self.chunk_size))
            .await?;

        if claimed.is_empty() {
            let counts = self.recipient_repo.counts(campaign.id).await?;
            if counts.is_drained() {
                self.finish_campaign(campaign.id).await;
                return Ok(DispatchSummary::noop("Campaign completed"));
            }
            return Ok(DispatchSummary {
                message: "Waiting for in-flight calls".to_string(),
                remaining: counts.pending,
                ..Default::default()
            });
        }

        debug!(
            "Campaign {}: claimed {} recipients ({} slots, {} already calling)",
            campaign.id,
            claimed.len(),
            slots,
            calling
        );

        let mut initiated = 0u32;
        let mut failed = 0u32;
        let total = claimed.len();

        for (index, recipient) in claimed.iter().enumerate() {
            match self.bridge.dial(&campaign, recipient).await {
                Ok(outcome) => {
                    initiated += 1;
                    debug!(
                        "Bridged recipient {} on campaign {} (conference {})",
                        recipient.id, campaign.id, outcome.conference_name
                    );
                }
                Err(e) => {
                    warn!(
                        "Failed to start bridge for recipient {} on campaign {}: {}",
                        recipient.id, campaign.id, e
                    );
                    failed += 1;
                    self.record_dial_failure(campaign.id, recipient.id, &e.to_string())
                        .await;
                }
            }

            // Pace outbound legs so the provider is not burst-dialed
            if index + 1 < total {
                sleep(self.inter_call_delay).await;
            }
        }

        let counts = self.recipient_repo.counts(campaign.id).await?;
        if counts.is_drained() {
            self.finish_campaign(campaign.id).await;
            return Ok(DispatchSummary {
                message: "Campaign completed".to_string(),
                processed: initiated + failed,
                initiated,
                failed,
                remaining: 0,
            });
        }

        Ok(DispatchSummary {
            message: format!("Initiated {} calls, {} failed", initiated, failed),
            processed: initiated + failed,
            initiated,
            failed,
            remaining: counts.pending,
        })
    }

    /// Run the completion path for a campaign after a call resolved.
    ///
    /// If that was the last in-flight call the campaign completes, and for
    /// a child occurrence the parent's next run is lined up. A next run
    /// that is already due starts dialing immediately.
    pub async fn handle_completion(&self, campaign_id: Uuid) -> Result<()> {
        let Some(parent_id) = self.campaign_manager.check_completion(campaign_id).await? else {
            return Ok(());
        };

        let Some(child) = self.spawner.spawn_for_parent(parent_id).await? else {
            return Ok(());
        };

        if child.status_enum() == Some(CampaignStatus::Running) {
            let summary = self.run_unit(child.id).await?;
            debug!(
                "Started occurrence {} for parent {}: {}",
                child.id, parent_id, summary.message
            );
        }

        Ok(())
    }

    async fn advance(&self, campaign_id: Uuid, summary: &mut SweepSummary) {
        match self.run_unit(campaign_id).await {
            Ok(unit) => {
                summary.processed += unit.processed;
                summary.initiated += unit.initiated;
                summary.failed += unit.failed;
            }
            Err(e) => error!("Dispatch unit failed for campaign {}: {}", campaign_id, e),
        }
    }

    /// Complete a drained campaign; a completed child occurrence lines up
    /// the parent's next run for the following sweep.
    async fn finish_campaign(&self, campaign_id: Uuid) {
        match self.campaign_manager.check_completion(campaign_id).await {
            Ok(Some(parent_id)) => {
                if let Err(e) = self.spawner.spawn_for_parent(parent_id).await {
                    error!(
                        "Failed to spawn next occurrence for campaign {}: {}",
                        parent_id, e
                    );
                }
            }
            Ok(None) => {}
            Err(e) => error!("Failed to finalize campaign {}: {}", campaign_id, e),
        }
    }

    async fn record_dial_failure(&self, campaign_id: Uuid, recipient_id: Uuid, message: &str) {
        match self
            .recipient_repo
            .resolve(recipient_id, RecipientStatus::Failed, Some(message))
            .await
        {
            Ok(true) => {
                if let Err(e) = self.campaign_repo.increment_failed(campaign_id).await {
                    error!(
                        "Failed to bump failed count for campaign {}: {}",
                        campaign_id, e
                    );
                }
            }
            // The status callback resolved this recipient first
            Ok(false) => {}
            Err(e) => error!(
                "Failed to record dial failure for recipient {}: {}",
                recipient_id, e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_available_slots_respects_system_ceiling() {
        assert_eq!(available_slots(5, 20, 0), 5);
    }

    #[test]
    fn test_available_slots_respects_campaign_limit() {
        assert_eq!(available_slots(5, 2, 0), 2);
    }

    #[test]
    fn test_available_slots_subtracts_in_flight() {
        assert_eq!(available_slots(5, 5, 3), 2);
    }

    #[test]
    fn test_available_slots_never_negative() {
        assert_eq!(available_slots(5, 5, 9), 0);
    }

    #[test]
    fn test_available_slots_floors_concurrency_at_one() {
        assert_eq!(available_slots(5, 0, 0), 1);
        assert_eq!(available_slots(5, -3, 0), 1);
    }

    #[test]
    fn test_dispatch_summary_serializes_counts() {
        let summary = DispatchSummary {
            message: "ok".to_string(),
            processed: 3,
            initiated: 2,
            failed: 1,
            remaining: 4,
        };

        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["processed"], 3);
        assert_eq!(value["initiated"], 2);
        assert_eq!(value["remaining"], 4);
    }

    #[test]
    fn test_sweep_summary_serializes_counts() {
        let summary = SweepSummary {
            message: "ok".to_string(),
            promoted: 1,
            processed: 2,
            initiated: 2,
            failed: 0,
            spawned: 1,
        };

        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["promoted"], 1);
        assert_eq!(value["spawned"], 1);
    }
}

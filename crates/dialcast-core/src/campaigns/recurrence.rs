//! Recurrence - Occurrence arithmetic and the child campaign spawner
//!
//! A recurring campaign is a template that never dials itself. The spawner
//! clones it into child occurrences on a cadence, keeping at most one child
//! scheduled or running at a time.

use anyhow::Result;
use chrono::{DateTime, Duration, Months, Utc};
use dialcast_storage::db::DatabasePool;
use dialcast_storage::models::{Campaign, CampaignStatus, RecurrenceType};
use dialcast_storage::repository::CampaignRepository;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Compute the next occurrence time from a base instant.
///
/// Monthly steps use calendar months with end-of-month clamping, so a
/// campaign anchored on the 31st lands on the last day of shorter months.
/// Intervals below 1 are treated as 1.
pub fn next_occurrence(
    base: DateTime<Utc>,
    recurrence_type: RecurrenceType,
    interval: i32,
) -> DateTime<Utc> {
    let interval = interval.max(1);
    match recurrence_type {
        RecurrenceType::Hourly => base + Duration::hours(interval as i64),
        RecurrenceType::Daily => base + Duration::days(interval as i64),
        RecurrenceType::Weekly => base + Duration::weeks(interval as i64),
        RecurrenceType::Monthly => base
            .checked_add_months(Months::new(interval as u32))
            .unwrap_or(DateTime::<Utc>::MAX_UTC),
    }
}

/// Spawns child occurrences of recurring parent campaigns
#[derive(Clone)]
pub struct RecurrenceSpawner {
    campaign_repo: CampaignRepository,
}

impl RecurrenceSpawner {
    /// Create a new recurrence spawner
    pub fn new(db_pool: DatabasePool) -> Self {
        let pool = db_pool.pool().clone();
        Self {
            campaign_repo: CampaignRepository::new(pool),
        }
    }

    /// Sweep all recurring parents and spawn any due occurrences.
    ///
    /// Per-parent failures are logged and skipped so one broken parent
    /// cannot stall the rest. Returns the children spawned this sweep.
    pub async fn spawn_due(&self) -> Result<Vec<Campaign>> {
        let parents = self.campaign_repo.list_recurring_parents().await?;
        let mut spawned = Vec::new();

        for parent in parents {
            match self.spawn_for_parent(parent.id).await {
                Ok(Some(child)) => spawned.push(child),
                Ok(None) => {}
                Err(e) => warn!("Failed to spawn occurrence for campaign {}: {}", parent.id, e),
            }
        }

        Ok(spawned)
    }

    /// Spawn the next occurrence for one recurring parent, if one is due.
    ///
    /// Returns `None` when the parent is not eligible: it already has an
    /// active child, its schedule has terminated, or it is no longer a
    /// recurring parent.
    pub async fn spawn_for_parent(&self, parent_id: Uuid) -> Result<Option<Campaign>> {
        let Some(parent) = self.campaign_repo.get(parent_id).await? else {
            return Ok(None);
        };

        if parent.status_enum() != Some(CampaignStatus::Recurring) || !parent.is_recurring_parent()
        {
            debug!(
                "Campaign {} is not an eligible recurring parent (status: {})",
                parent.id, parent.status
            );
            return Ok(None);
        }

        let Some(recurrence_type) = parent.recurrence_type_enum() else {
            warn!(
                "Recurring campaign {} has no valid recurrence type ({:?})",
                parent.id, parent.recurrence_type
            );
            return Ok(None);
        };

        if self.campaign_repo.has_active_child(parent_id).await? {
            return Ok(None);
        }

        if let Some(max_runs) = parent.recurrence_max_runs {
            if parent.run_count >= max_runs {
                return self.terminate(&parent, "run limit reached").await;
            }
        }

        let now = Utc::now();
        if let Some(end_date) = parent.recurrence_end_date {
            if now > end_date {
                return self.terminate(&parent, "end date passed").await;
            }
        }

        let latest = self.campaign_repo.get_latest_child(parent_id).await?;
        let base = latest
            .as_ref()
            .and_then(|child| child.completed_at.or(child.started_at))
            .unwrap_or(parent.created_at);
        let occurrence = latest
            .as_ref()
            .and_then(|child| child.occurrence_number)
            .unwrap_or(0)
            + 1;

        let due = next_occurrence(base, recurrence_type, parent.recurrence_interval);
        if let Some(end_date) = parent.recurrence_end_date {
            if due > end_date {
                return self.terminate(&parent, "next occurrence falls past end date").await;
            }
        }

        // A due occurrence starts running right away; a future one is
        // parked as scheduled and promoted by the dispatch sweep.
        let child = if due <= now {
            self.campaign_repo
                .clone_occurrence(parent_id, occurrence, CampaignStatus::Running, None, Some(now))
                .await?
        } else {
            self.campaign_repo
                .clone_occurrence(
                    parent_id,
                    occurrence,
                    CampaignStatus::Scheduled,
                    Some(due),
                    None,
                )
                .await?
        };

        if let Some(ref child) = child {
            info!(
                "Spawned occurrence {} of recurring campaign {} as {} ({})",
                occurrence, parent.id, child.id, child.status
            );
        }

        Ok(child)
    }

    async fn terminate(&self, parent: &Campaign, reason: &str) -> Result<Option<Campaign>> {
        let updated = self
            .campaign_repo
            .transition(parent.id, CampaignStatus::Recurring, CampaignStatus::Completed)
            .await?;

        if updated.is_some() {
            info!("Recurring campaign {} completed: {}", parent.id, reason);
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_hourly_step() {
        assert_eq!(
            next_occurrence(utc(2024, 1, 1, 0, 0), RecurrenceType::Hourly, 6),
            utc(2024, 1, 1, 6, 0)
        );
    }

    #[test]
    fn test_daily_step() {
        assert_eq!(
            next_occurrence(utc(2024, 1, 1, 9, 30), RecurrenceType::Daily, 3),
            utc(2024, 1, 4, 9, 30)
        );
    }

    #[test]
    fn test_weekly_step() {
        assert_eq!(
            next_occurrence(utc(2024, 1, 1, 12, 0), RecurrenceType::Weekly, 2),
            utc(2024, 1, 15, 12, 0)
        );
    }

    #[test]
    fn test_monthly_clamps_to_leap_february() {
        assert_eq!(
            next_occurrence(utc(2024, 1, 31, 10, 0), RecurrenceType::Monthly, 1),
            utc(2024, 2, 29, 10, 0)
        );
    }

    #[test]
    fn test_monthly_clamps_to_short_february() {
        assert_eq!(
            next_occurrence(utc(2023, 1, 31, 10, 0), RecurrenceType::Monthly, 1),
            utc(2023, 2, 28, 10, 0)
        );
    }

    #[test]
    fn test_monthly_multi_step_keeps_day_when_it_fits() {
        assert_eq!(
            next_occurrence(utc(2024, 1, 31, 10, 0), RecurrenceType::Monthly, 2),
            utc(2024, 3, 31, 10, 0)
        );
    }

    #[test]
    fn test_interval_floor_is_one() {
        assert_eq!(
            next_occurrence(utc(2024, 1, 1, 0, 0), RecurrenceType::Daily, 0),
            utc(2024, 1, 2, 0, 0)
        );
    }
}

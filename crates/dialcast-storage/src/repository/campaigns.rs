//! Campaign repository

use chrono::{DateTime, Utc};
use dialcast_common::types::UserId;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    Campaign, CampaignStatus, CreateCampaign, CreateRecipient, UpdateCampaign,
};

/// Campaign repository
#[derive(Clone)]
pub struct CampaignRepository {
    pool: PgPool,
}

impl CampaignRepository {
    /// Create a new campaign repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the database pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create a campaign together with its recipient rows in one transaction,
    /// so a failed recipient insert never leaves a partial campaign behind.
    pub async fn create_with_recipients(
        &self,
        input: CreateCampaign,
        recipients: Vec<CreateRecipient>,
    ) -> Result<Campaign, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let id = Uuid::new_v4();
        let total = recipients.len() as i32;
        let recurrence_type = input.recurrence_type.map(|t| t.to_string());

        let campaign = sqlx::query_as::<_, Campaign>(
            r#"
            INSERT INTO campaigns (
                id, user_id, name, caller_number, agent_id, purpose, goal,
                template_id, send_now, scheduled_at, window_start, window_end,
                window_days, max_concurrency, recurrence_type, recurrence_interval,
                recurrence_end_date, recurrence_max_runs, parent_campaign_id,
                occurrence_number, total_recipients, status
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                $13, $14, $15, $16, $17, $18, $19, $20, $21, $22
            )
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.user_id)
        .bind(&input.name)
        .bind(&input.caller_number)
        .bind(input.agent_id)
        .bind(&input.purpose)
        .bind(&input.goal)
        .bind(input.template_id)
        .bind(input.send_now)
        .bind(input.scheduled_at)
        .bind(&input.window_start)
        .bind(&input.window_end)
        .bind(&input.window_days)
        .bind(input.max_concurrency)
        .bind(&recurrence_type)
        .bind(input.recurrence_interval)
        .bind(input.recurrence_end_date)
        .bind(input.recurrence_max_runs)
        .bind(input.parent_campaign_id)
        .bind(input.occurrence_number)
        .bind(total)
        .bind(input.status.to_string())
        .fetch_one(&mut *tx)
        .await?;

        for (i, recipient) in recipients.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO campaign_recipients (
                    id, campaign_id, sort_order, phone_number, name, contact_id, status
                )
                VALUES ($1, $2, $3, $4, $5, $6, 'pending')
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(id)
            .bind(i as i32)
            .bind(&recipient.phone_number)
            .bind(&recipient.name)
            .bind(recipient.contact_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(campaign)
    }

    /// Get a campaign by ID
    pub async fn get(&self, id: Uuid) -> Result<Option<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Get a campaign by ID and owner
    pub async fn get_by_user(
        &self,
        user_id: UserId,
        id: Uuid,
    ) -> Result<Option<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// List campaigns for an owner
    pub async fn list_by_user(
        &self,
        user_id: UserId,
        status: Option<CampaignStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Campaign>, sqlx::Error> {
        if let Some(status) = status {
            sqlx::query_as::<_, Campaign>(
                r#"
                SELECT * FROM campaigns
                WHERE user_id = $1 AND status = $2
                ORDER BY created_at DESC
                LIMIT $3 OFFSET $4
                "#,
            )
            .bind(user_id)
            .bind(status.to_string())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, Campaign>(
                r#"
                SELECT * FROM campaigns
                WHERE user_id = $1
                ORDER BY created_at DESC
                LIMIT $2 OFFSET $3
                "#,
            )
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
        }
    }

    /// Count campaigns for an owner
    pub async fn count_by_user(
        &self,
        user_id: UserId,
        status: Option<CampaignStatus>,
    ) -> Result<i64, sqlx::Error> {
        let count: (i64,) = if let Some(status) = status {
            sqlx::query_as("SELECT COUNT(*) FROM campaigns WHERE user_id = $1 AND status = $2")
                .bind(user_id)
                .bind(status.to_string())
                .fetch_one(&self.pool)
                .await?
        } else {
            sqlx::query_as("SELECT COUNT(*) FROM campaigns WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?
        };
        Ok(count.0)
    }

    /// Update a draft campaign with field-wise COALESCE semantics
    pub async fn update(
        &self,
        id: Uuid,
        user_id: UserId,
        input: UpdateCampaign,
    ) -> Result<Option<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>(
            r#"
            UPDATE campaigns SET
                name = COALESCE($3, name),
                caller_number = COALESCE($4, caller_number),
                agent_id = COALESCE($5, agent_id),
                purpose = COALESCE($6, purpose),
                goal = COALESCE($7, goal),
                template_id = COALESCE($8, template_id),
                scheduled_at = COALESCE($9, scheduled_at),
                window_start = COALESCE($10, window_start),
                window_end = COALESCE($11, window_end),
                window_days = COALESCE($12, window_days),
                max_concurrency = COALESCE($13, max_concurrency),
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND status = 'draft'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(&input.name)
        .bind(&input.caller_number)
        .bind(input.agent_id)
        .bind(&input.purpose)
        .bind(&input.goal)
        .bind(input.template_id)
        .bind(input.scheduled_at)
        .bind(&input.window_start)
        .bind(&input.window_end)
        .bind(&input.window_days)
        .bind(input.max_concurrency)
        .fetch_optional(&self.pool)
        .await
    }

    /// Delete a draft campaign
    pub async fn delete(&self, id: Uuid, user_id: UserId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM campaigns WHERE id = $1 AND user_id = $2 AND status = 'draft'",
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Conditionally transition a campaign between statuses.
    ///
    /// The update only applies while the row still holds `from`, so two
    /// concurrent transitions cannot both win. Entering `running` stamps
    /// `started_at` if unset; entering a terminal status stamps
    /// `completed_at`. Returns the updated row, or `None` when the guard
    /// did not match.
    pub async fn transition(
        &self,
        id: Uuid,
        from: CampaignStatus,
        to: CampaignStatus,
    ) -> Result<Option<Campaign>, sqlx::Error> {
        let started_at = if to == CampaignStatus::Running {
            Some(Utc::now())
        } else {
            None
        };
        let completed_at = if to.is_terminal() { Some(Utc::now()) } else { None };

        sqlx::query_as::<_, Campaign>(
            r#"
            UPDATE campaigns SET
                status = $3,
                started_at = COALESCE(started_at, $4),
                completed_at = COALESCE($5, completed_at),
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(from.to_string())
        .bind(to.to_string())
        .bind(started_at)
        .bind(completed_at)
        .fetch_optional(&self.pool)
        .await
    }

    /// Zero the outcome counters and clear run timestamps ahead of a re-run
    pub async fn reset_for_rerun(&self, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE campaigns SET
                completed_count = 0,
                failed_count = 0,
                started_at = NULL,
                completed_at = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Increment the completed counter
    pub async fn increment_completed(&self, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE campaigns SET completed_count = completed_count + 1, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Increment the failed counter
    pub async fn increment_failed(&self, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE campaigns SET failed_count = failed_count + 1, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get scheduled campaigns whose due time has passed
    pub async fn get_scheduled_due(&self) -> Result<Vec<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>(
            r#"
            SELECT * FROM campaigns
            WHERE status = 'scheduled'
              AND scheduled_at IS NOT NULL
              AND scheduled_at <= NOW()
            ORDER BY scheduled_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    /// List all running campaigns
    pub async fn list_running(&self) -> Result<Vec<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>(
            "SELECT * FROM campaigns WHERE status = 'running' ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
    }

    /// List recurring parent campaigns eligible for spawning
    pub async fn list_recurring_parents(&self) -> Result<Vec<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>(
            r#"
            SELECT * FROM campaigns
            WHERE status = 'recurring' AND parent_campaign_id IS NULL
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    /// Get the most recent child occurrence of a recurring parent
    pub async fn get_latest_child(
        &self,
        parent_id: Uuid,
    ) -> Result<Option<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>(
            r#"
            SELECT * FROM campaigns
            WHERE parent_campaign_id = $1
            ORDER BY occurrence_number DESC
            LIMIT 1
            "#,
        )
        .bind(parent_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Whether a recurring parent currently has a scheduled or running child
    pub async fn has_active_child(&self, parent_id: Uuid) -> Result<bool, sqlx::Error> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM campaigns
            WHERE parent_campaign_id = $1 AND status IN ('scheduled', 'running')
            "#,
        )
        .bind(parent_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.0 > 0)
    }

    /// List a parent's scheduled or running children
    pub async fn list_active_children(
        &self,
        parent_id: Uuid,
    ) -> Result<Vec<Campaign>, sqlx::Error> {
        sqlx::query_as::<_, Campaign>(
            r#"
            SELECT * FROM campaigns
            WHERE parent_campaign_id = $1 AND status IN ('scheduled', 'running')
            ORDER BY occurrence_number ASC
            "#,
        )
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Clone a recurring parent into its next child occurrence.
    ///
    /// Copies the dial config, window, concurrency, and full recipient list,
    /// and bumps the parent's run count, all in one transaction. Returns
    /// `None` when the parent row is gone.
    pub async fn clone_occurrence(
        &self,
        parent_id: Uuid,
        occurrence: i32,
        status: CampaignStatus,
        scheduled_at: Option<DateTime<Utc>>,
        started_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Campaign>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let child_id = Uuid::new_v4();
        let child = sqlx::query_as::<_, Campaign>(
            r#"
            INSERT INTO campaigns (
                id, user_id, name, caller_number, agent_id, purpose, goal,
                template_id, send_now, scheduled_at, window_start, window_end,
                window_days, max_concurrency, recurrence_type, recurrence_interval,
                recurrence_end_date, recurrence_max_runs, parent_campaign_id,
                occurrence_number, total_recipients, status, started_at
            )
            SELECT
                $2, user_id, name, caller_number, agent_id, purpose, goal,
                template_id, false, $3, window_start, window_end,
                window_days, max_concurrency, recurrence_type, recurrence_interval,
                recurrence_end_date, recurrence_max_runs, id,
                $4, total_recipients, $5, $6
            FROM campaigns
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(parent_id)
        .bind(child_id)
        .bind(scheduled_at)
        .bind(occurrence)
        .bind(status.to_string())
        .bind(started_at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(child) = child else {
            return Ok(None);
        };

        sqlx::query(
            r#"
            INSERT INTO campaign_recipients (
                id, campaign_id, sort_order, phone_number, name, contact_id, status
            )
            SELECT gen_random_uuid(), $2, sort_order, phone_number, name, contact_id, 'pending'
            FROM campaign_recipients
            WHERE campaign_id = $1
            "#,
        )
        .bind(parent_id)
        .bind(child_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE campaigns SET run_count = run_count + 1, updated_at = NOW() WHERE id = $1",
        )
        .bind(parent_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(child))
    }
}

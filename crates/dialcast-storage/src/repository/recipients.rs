//! Campaign recipient repository

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{CampaignRecipientCounts, Recipient, RecipientStatus};

/// Campaign recipient repository
#[derive(Clone)]
pub struct RecipientRepository {
    pool: PgPool,
}

impl RecipientRepository {
    /// Create a new recipient repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a recipient by ID
    pub async fn get(&self, id: Uuid) -> Result<Option<Recipient>, sqlx::Error> {
        sqlx::query_as::<_, Recipient>("SELECT * FROM campaign_recipients WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Get the recipient linked to a call record
    pub async fn get_by_call_record(
        &self,
        call_record_id: Uuid,
    ) -> Result<Option<Recipient>, sqlx::Error> {
        sqlx::query_as::<_, Recipient>(
            "SELECT * FROM campaign_recipients WHERE call_record_id = $1",
        )
        .bind(call_record_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// List a campaign's recipients in dial order
    pub async fn list_by_campaign(
        &self,
        campaign_id: Uuid,
    ) -> Result<Vec<Recipient>, sqlx::Error> {
        sqlx::query_as::<_, Recipient>(
            "SELECT * FROM campaign_recipients WHERE campaign_id = $1 ORDER BY sort_order ASC",
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Count recipients currently in flight for a campaign
    pub async fn count_calling(&self, campaign_id: Uuid) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM campaign_recipients WHERE campaign_id = $1 AND status = 'calling'",
        )
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.0)
    }

    /// Per-status counts for a campaign
    pub async fn counts(
        &self,
        campaign_id: Uuid,
    ) -> Result<CampaignRecipientCounts, sqlx::Error> {
        sqlx::query_as::<_, CampaignRecipientCounts>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                COUNT(*) FILTER (WHERE status = 'calling') AS calling,
                COUNT(*) FILTER (WHERE status = 'completed') AS completed,
                COUNT(*) FILTER (WHERE status = 'failed') AS failed,
                COUNT(*) FILTER (WHERE status = 'skipped') AS skipped
            FROM campaign_recipients
            WHERE campaign_id = $1
            "#,
        )
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await
    }

    /// Atomically claim the next pending recipients for dialing.
    ///
    /// One statement flips up to `limit` rows from `pending` to `calling` in
    /// `sort_order`, stamping `attempted_at` as part of the claim. The
    /// `FOR UPDATE SKIP LOCKED` subselect guarantees overlapping invocations
    /// never claim the same row twice.
    pub async fn claim_batch(
        &self,
        campaign_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Recipient>, sqlx::Error> {
        let mut claimed = sqlx::query_as::<_, Recipient>(
            r#"
            UPDATE campaign_recipients SET
                status = 'calling',
                attempted_at = NOW(),
                updated_at = NOW()
            WHERE id IN (
                SELECT id FROM campaign_recipients
                WHERE campaign_id = $1 AND status = 'pending'
                ORDER BY sort_order ASC
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(campaign_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        // UPDATE .. RETURNING does not preserve the subselect's order
        claimed.sort_by_key(|r| r.sort_order);
        Ok(claimed)
    }

    /// Link a recipient to its call record
    pub async fn set_call_record(
        &self,
        id: Uuid,
        call_record_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE campaign_recipients SET call_record_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(call_record_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Resolve an in-flight recipient to a terminal status.
    ///
    /// Guarded on `calling` so a duplicate provider callback or a raced
    /// dispatch failure can resolve each attempt at most once. Returns
    /// whether this call won the transition.
    pub async fn resolve(
        &self,
        id: Uuid,
        status: RecipientStatus,
        error_message: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE campaign_recipients SET
                status = $2,
                error_message = $3,
                completed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status = 'calling'
            "#,
        )
        .bind(id)
        .bind(status.to_string())
        .bind(error_message)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Skip all pending recipients of a cancelled campaign
    pub async fn skip_pending(&self, campaign_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE campaign_recipients SET
                status = 'skipped',
                updated_at = NOW()
            WHERE campaign_id = $1 AND status = 'pending'
            "#,
        )
        .bind(campaign_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Reset every recipient back to pending ahead of a campaign re-run,
    /// clearing all outcome fields
    pub async fn reset_to_pending(&self, campaign_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE campaign_recipients SET
                status = 'pending',
                call_record_id = NULL,
                error_message = NULL,
                attempted_at = NULL,
                completed_at = NULL,
                updated_at = NOW()
            WHERE campaign_id = $1 AND status <> 'pending'
            "#,
        )
        .bind(campaign_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

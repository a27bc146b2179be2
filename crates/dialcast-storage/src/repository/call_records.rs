//! Call record repository

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{CallRecord, CallStatus, CreateCallRecord};

/// Call record repository
#[derive(Clone)]
pub struct CallRecordRepository {
    pool: PgPool,
}

impl CallRecordRepository {
    /// Create a new call record repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a call record for a new outbound attempt
    pub async fn create(&self, input: CreateCallRecord) -> Result<CallRecord, sqlx::Error> {
        let id = Uuid::new_v4();

        sqlx::query_as::<_, CallRecord>(
            r#"
            INSERT INTO call_records (
                id, user_id, campaign_id, recipient_id, contact_id, to_number,
                from_number, direction, status, conference_name, call_purpose,
                call_goal, template_id, started_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'outbound', 'initiated', $8, $9, $10, $11, NOW())
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.user_id)
        .bind(input.campaign_id)
        .bind(input.recipient_id)
        .bind(input.contact_id)
        .bind(&input.to_number)
        .bind(&input.from_number)
        .bind(&input.conference_name)
        .bind(&input.call_purpose)
        .bind(&input.call_goal)
        .bind(input.template_id)
        .fetch_one(&self.pool)
        .await
    }

    /// Get a call record by ID
    pub async fn get(&self, id: Uuid) -> Result<Option<CallRecord>, sqlx::Error> {
        sqlx::query_as::<_, CallRecord>("SELECT * FROM call_records WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Get a call record by the provider's call SID
    pub async fn get_by_provider_id(
        &self,
        provider_call_id: &str,
    ) -> Result<Option<CallRecord>, sqlx::Error> {
        sqlx::query_as::<_, CallRecord>(
            "SELECT * FROM call_records WHERE provider_call_id = $1",
        )
        .bind(provider_call_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Store the provider call SID once a leg has been accepted
    pub async fn set_provider_call_id(
        &self,
        id: Uuid,
        provider_call_id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE call_records SET provider_call_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(provider_call_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Update the call status as reported by provider callbacks.
    ///
    /// Terminal statuses stamp `completed_at` and record the duration when
    /// the provider supplied one.
    pub async fn update_status(
        &self,
        id: Uuid,
        status: CallStatus,
        duration_seconds: Option<i32>,
    ) -> Result<Option<CallRecord>, sqlx::Error> {
        let completed_at = if status.is_terminal() { Some(Utc::now()) } else { None };

        sqlx::query_as::<_, CallRecord>(
            r#"
            UPDATE call_records SET
                status = $2,
                duration_seconds = COALESCE($3, duration_seconds),
                completed_at = COALESCE($4, completed_at),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status.to_string())
        .bind(duration_seconds)
        .bind(completed_at)
        .fetch_optional(&self.pool)
        .await
    }
}

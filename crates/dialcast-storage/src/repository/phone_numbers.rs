//! Provisioned phone number repository

use dialcast_common::types::UserId;
use sqlx::PgPool;

use crate::models::PhoneNumber;

/// Phone number repository
#[derive(Clone)]
pub struct PhoneNumberRepository {
    pool: PgPool,
}

impl PhoneNumberRepository {
    /// Create a new phone number repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Look up an active number owned by this user; campaign caller ids must
    /// resolve here before a campaign is created
    pub async fn get_active(
        &self,
        user_id: UserId,
        number: &str,
    ) -> Result<Option<PhoneNumber>, sqlx::Error> {
        sqlx::query_as::<_, PhoneNumber>(
            r#"
            SELECT * FROM phone_numbers
            WHERE user_id = $1 AND number = $2 AND status = 'active'
            "#,
        )
        .bind(user_id)
        .bind(number)
        .fetch_optional(&self.pool)
        .await
    }
}

use sqlx::PgPool;

use crate::db::error::DatabaseError;
use crate::models::{Bot, BotState};

pub struct BotRepository {
    pool: PgPool,
}

impl BotRepository {
    pub fn new(pool: &PgPool) -> Self {
        Self { pool: pool.clone() }
    }

    pub async fn create(
        &self,
        id: &str,
        meeting_id: &str,
        provider_bot_id: &str,
    ) -> Result<Bot, DatabaseError> {
        let bot = sqlx::query_as::<_, Bot>(
            r#"
            INSERT INTO bots (id, meeting_id, provider_bot_id)
            VALUES ($1, $2, $3)
            RETURNING id, meeting_id, provider_bot_id, state, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(meeting_id)
        .bind(provider_bot_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DatabaseError::ConstraintViolation("provider bot id already registered".to_string())
            }
            _ => DatabaseError::from(e),
        })?;

        Ok(bot)
    }

    /// The bot currently responsible for a meeting. Retries can leave
    /// several rows per meeting; the newest one wins.
    pub async fn find_latest_for_meeting(
        &self,
        meeting_id: &str,
    ) -> Result<Option<Bot>, DatabaseError> {
        let bot = sqlx::query_as::<_, Bot>(
            r#"
            SELECT id, meeting_id, provider_bot_id, state, created_at, updated_at
            FROM bots
            WHERE meeting_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(meeting_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(bot)
    }

    /// Overwrites the bot state. Re-applying the current state is a no-op by
    /// construction, which is what makes duplicate lifecycle deliveries safe.
    pub async fn update_state(
        &self,
        provider_bot_id: &str,
        state: BotState,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE bots
            SET state = $2, updated_at = CURRENT_TIMESTAMP
            WHERE provider_bot_id = $1
            "#,
        )
        .bind(provider_bot_id)
        .bind(state)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

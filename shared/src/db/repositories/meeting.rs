use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::db::error::DatabaseError;
use crate::models::{Meeting, MeetingStatus};

pub struct NewMeeting {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub timezone: String,
    pub attendee_emails: Vec<String>,
    pub meet_url: String,
}

pub struct MeetingRepository {
    pool: PgPool,
}

impl MeetingRepository {
    pub fn new(pool: &PgPool) -> Self {
        Self { pool: pool.clone() }
    }

    pub async fn create(&self, meeting: NewMeeting) -> Result<Meeting, DatabaseError> {
        let created = sqlx::query_as::<_, Meeting>(
            r#"
            INSERT INTO meetings (id, owner_id, title, start_at, end_at, timezone, attendee_emails, meet_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, owner_id, title, start_at, end_at, timezone, attendee_emails,
                      meet_url, calendar_event_id, status, next_chunk_seq, created_at, updated_at
            "#,
        )
        .bind(&meeting.id)
        .bind(&meeting.owner_id)
        .bind(&meeting.title)
        .bind(meeting.start_at)
        .bind(meeting.end_at)
        .bind(&meeting.timezone)
        .bind(&meeting.attendee_emails)
        .bind(&meeting.meet_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Meeting>, DatabaseError> {
        let meeting = sqlx::query_as::<_, Meeting>(
            r#"
            SELECT id, owner_id, title, start_at, end_at, timezone, attendee_emails,
                   meet_url, calendar_event_id, status, next_chunk_seq, created_at, updated_at
            FROM meetings
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(meeting)
    }

    pub async fn find_for_owner(
        &self,
        owner_id: &str,
        id: &str,
    ) -> Result<Option<Meeting>, DatabaseError> {
        let meeting = sqlx::query_as::<_, Meeting>(
            r#"
            SELECT id, owner_id, title, start_at, end_at, timezone, attendee_emails,
                   meet_url, calendar_event_id, status, next_chunk_seq, created_at, updated_at
            FROM meetings
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(meeting)
    }

    /// Keyset page of an owner's meetings, newest first. ULID ids are
    /// time-ordered, so `id < cursor` walks backwards in creation order.
    pub async fn list_for_owner(
        &self,
        owner_id: &str,
        limit: i64,
        cursor: Option<&str>,
    ) -> Result<Vec<Meeting>, DatabaseError> {
        let meetings = sqlx::query_as::<_, Meeting>(
            r#"
            SELECT id, owner_id, title, start_at, end_at, timezone, attendee_emails,
                   meet_url, calendar_event_id, status, next_chunk_seq, created_at, updated_at
            FROM meetings
            WHERE owner_id = $1 AND ($2::TEXT IS NULL OR id < $2)
            ORDER BY id DESC
            LIMIT $3
            "#,
        )
        .bind(owner_id)
        .bind(cursor)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(meetings)
    }

    pub async fn update_status(
        &self,
        id: &str,
        status: MeetingStatus,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE meetings
            SET status = $2, updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes the meeting row; bots, transcript chunks and the artifact go
    /// with it via FK cascade.
    pub async fn delete(&self, id: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM meetings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

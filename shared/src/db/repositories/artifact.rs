use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::db::error::DatabaseError;
use crate::models::{ActionItem, MeetingArtifact};

pub struct ArtifactRepository {
    pool: PgPool,
}

impl ArtifactRepository {
    pub fn new(pool: &PgPool) -> Self {
        Self { pool: pool.clone() }
    }

    /// One artifact per meeting, overwrite semantics. Finalize may run more
    /// than once (webhook plus manual trigger); the last write wins in full.
    pub async fn upsert(
        &self,
        id: &str,
        meeting_id: &str,
        final_transcript: &str,
        summary: Option<&str>,
        action_items: &[ActionItem],
        topics: &[String],
        completed_at: DateTime<Utc>,
    ) -> Result<MeetingArtifact, DatabaseError> {
        let artifact = sqlx::query_as::<_, MeetingArtifact>(
            r#"
            INSERT INTO meeting_artifacts
                (id, meeting_id, final_transcript, summary, action_items, topics, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (meeting_id) DO UPDATE
            SET final_transcript = EXCLUDED.final_transcript,
                summary = EXCLUDED.summary,
                action_items = EXCLUDED.action_items,
                topics = EXCLUDED.topics,
                completed_at = EXCLUDED.completed_at,
                updated_at = CURRENT_TIMESTAMP
            RETURNING id, meeting_id, final_transcript, summary, action_items, topics,
                      completed_at, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(meeting_id)
        .bind(final_transcript)
        .bind(summary)
        .bind(Json(action_items))
        .bind(topics)
        .bind(completed_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(artifact)
    }

    pub async fn find_by_meeting(
        &self,
        meeting_id: &str,
    ) -> Result<Option<MeetingArtifact>, DatabaseError> {
        let artifact = sqlx::query_as::<_, MeetingArtifact>(
            r#"
            SELECT id, meeting_id, final_transcript, summary, action_items, topics,
                   completed_at, created_at, updated_at
            FROM meeting_artifacts
            WHERE meeting_id = $1
            "#,
        )
        .bind(meeting_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(artifact)
    }
}

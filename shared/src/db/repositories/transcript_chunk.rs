use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::db::error::DatabaseError;
use crate::models::TranscriptChunk;

/// Result of an append attempt. Duplicate delivery is a normal outcome of
/// the webhook protocol, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Inserted,
    /// The dedup key already existed (redelivery), or the meeting row was
    /// gone by the time the fragment arrived. Either way nothing was stored.
    Duplicate,
    /// The fragment carried no text; nothing to store.
    Skipped,
}

pub struct NewChunk {
    pub id: String,
    pub meeting_id: String,
    pub provider_bot_id: String,
    pub dedup_key: String,
    pub speaker_id: Option<String>,
    pub speaker_name: Option<String>,
    pub text: String,
    pub start_ms: Option<i64>,
    pub end_ms: Option<i64>,
    pub received_at: DateTime<Utc>,
}

pub struct TranscriptChunkRepository {
    pool: PgPool,
}

impl TranscriptChunkRepository {
    pub fn new(pool: &PgPool) -> Self {
        Self { pool: pool.clone() }
    }

    /// Single-statement append: the CTE takes the next value of the
    /// meeting's atomic cursor and feeds it into the insert, so concurrent
    /// writers can never observe the same seq. A dedup-key conflict inserts
    /// nothing and still consumes a cursor value; seq is monotonic per
    /// meeting but not contiguous.
    pub async fn insert(&self, chunk: NewChunk) -> Result<AppendOutcome, DatabaseError> {
        let result = sqlx::query(
            r#"
            WITH next AS (
                UPDATE meetings
                SET next_chunk_seq = next_chunk_seq + 1, updated_at = CURRENT_TIMESTAMP
                WHERE id = $2
                RETURNING next_chunk_seq - 1 AS seq
            )
            INSERT INTO transcript_chunks
                (id, meeting_id, provider_bot_id, seq, dedup_key,
                 speaker_id, speaker_name, text, start_ms, end_ms, received_at)
            SELECT $1, $2, $3, next.seq, $4, $5, $6, $7, $8, $9, $10
            FROM next
            ON CONFLICT (dedup_key) DO NOTHING
            "#,
        )
        .bind(&chunk.id)
        .bind(&chunk.meeting_id)
        .bind(&chunk.provider_bot_id)
        .bind(&chunk.dedup_key)
        .bind(&chunk.speaker_id)
        .bind(&chunk.speaker_name)
        .bind(&chunk.text)
        .bind(chunk.start_ms)
        .bind(chunk.end_ms)
        .bind(chunk.received_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            Ok(AppendOutcome::Inserted)
        } else {
            Ok(AppendOutcome::Duplicate)
        }
    }

    /// Page of chunks with seq strictly greater than the cursor, ascending.
    pub async fn list_after(
        &self,
        meeting_id: &str,
        after_seq: Option<i64>,
        limit: i64,
    ) -> Result<Vec<TranscriptChunk>, DatabaseError> {
        let chunks = sqlx::query_as::<_, TranscriptChunk>(
            r#"
            SELECT id, meeting_id, provider_bot_id, seq, dedup_key,
                   speaker_id, speaker_name, text, start_ms, end_ms, received_at
            FROM transcript_chunks
            WHERE meeting_id = $1 AND seq > $2
            ORDER BY seq ASC
            LIMIT $3
            "#,
        )
        .bind(meeting_id)
        .bind(after_seq.unwrap_or(-1))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(chunks)
    }

    /// Everything stored for a meeting, in display order.
    pub async fn list_all(&self, meeting_id: &str) -> Result<Vec<TranscriptChunk>, DatabaseError> {
        let chunks = sqlx::query_as::<_, TranscriptChunk>(
            r#"
            SELECT id, meeting_id, provider_bot_id, seq, dedup_key,
                   speaker_id, speaker_name, text, start_ms, end_ms, received_at
            FROM transcript_chunks
            WHERE meeting_id = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(meeting_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(chunks)
    }

    pub async fn count_for_meeting(&self, meeting_id: &str) -> Result<i64, DatabaseError> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM transcript_chunks WHERE meeting_id = $1")
                .bind(meeting_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count.0)
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

/// Coarse user-facing meeting status, projected from bot lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "meeting_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    Scheduled,
    InProgress,
    Completed,
    Failed,
}

/// Lifecycle state of a recording bot as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "bot_state", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BotState {
    Scheduled,
    Joining,
    InCall,
    Done,
    Failed,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Meeting {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub timezone: String,
    pub attendee_emails: Vec<String>,
    pub meet_url: String,
    pub calendar_event_id: Option<String>,
    pub status: MeetingStatus,
    /// Per-meeting transcript cursor. Incremented atomically on every
    /// fragment insert; gaps are expected (duplicates and empty fragments
    /// consume values).
    pub next_chunk_seq: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One provider bot dispatched to a meeting. A meeting can accumulate
/// several rows over its lifetime (retries); readers must take the most
/// recently created one.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Bot {
    pub id: String,
    pub meeting_id: String,
    pub provider_bot_id: String,
    pub state: BotState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only transcript fragment. Never updated after insert.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TranscriptChunk {
    pub id: String,
    pub meeting_id: String,
    pub provider_bot_id: String,
    pub seq: i64,
    pub dedup_key: String,
    pub speaker_id: Option<String>,
    pub speaker_name: Option<String>,
    pub text: String,
    pub start_ms: Option<i64>,
    pub end_ms: Option<i64>,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionItem {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
}

/// Finalized output for a meeting: the assembled transcript plus the
/// structured summary. One row per meeting, overwritten on re-finalize.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MeetingArtifact {
    pub id: String,
    pub meeting_id: String,
    pub final_transcript: String,
    pub summary: Option<String>,
    pub action_items: Json<Vec<ActionItem>>,
    pub topics: Vec<String>,
    pub completed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

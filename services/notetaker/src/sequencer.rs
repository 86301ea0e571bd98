use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::debug;
use ulid::Ulid;

use shared::db::error::DatabaseError;
use shared::db::repositories::{AppendOutcome, NewChunk, TranscriptChunkRepository};

use crate::webhook::{Participant, Word};

/// Idempotent, append-only ingestion of transcript fragments. Ordering is a
/// per-meeting cursor assigned atomically at insert time; duplicate
/// deliveries are rejected by the dedup key and reported as success.
pub struct Sequencer {
    chunks: TranscriptChunkRepository,
}

impl Sequencer {
    pub fn new(chunks: TranscriptChunkRepository) -> Self {
        Self { chunks }
    }

    pub async fn append(
        &self,
        meeting_id: &str,
        provider_bot_id: &str,
        words: &[Word],
        participant: Option<&Participant>,
        received_at: DateTime<Utc>,
    ) -> Result<AppendOutcome, DatabaseError> {
        let Some(text) = join_words(words) else {
            // Pure non-text signal (punctuation-only or empty fragment).
            return Ok(AppendOutcome::Skipped);
        };

        let (start_ms, end_ms) = derive_offsets(words);
        let speaker_id = participant.and_then(|p| p.id).map(|id| id.to_string());
        let speaker_name = participant.and_then(|p| p.name.clone());

        let chunk = NewChunk {
            id: Ulid::new().to_string(),
            meeting_id: meeting_id.to_string(),
            provider_bot_id: provider_bot_id.to_string(),
            dedup_key: dedup_key(provider_bot_id, received_at, speaker_id.as_deref(), start_ms, &text),
            speaker_id,
            speaker_name,
            text,
            start_ms,
            end_ms,
            received_at,
        };

        let outcome = self.chunks.insert(chunk).await?;
        if outcome == AppendOutcome::Duplicate {
            debug!(
                "duplicate transcript delivery for meeting {} (bot {})",
                meeting_id, provider_bot_id
            );
        }

        Ok(outcome)
    }
}

/// Word tokens joined with single spaces. None when nothing textual remains.
pub fn join_words(words: &[Word]) -> Option<String> {
    let tokens: Vec<&str> = words
        .iter()
        .filter_map(|w| w.text.as_deref())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" "))
    }
}

/// Millisecond offsets from the first word's start and the last word's end,
/// falling back to the last word's start when the provider omits the end.
pub fn derive_offsets(words: &[Word]) -> (Option<i64>, Option<i64>) {
    let start = words
        .first()
        .and_then(|w| w.start_timestamp.as_ref())
        .and_then(|t| t.relative);

    let end = words.last().and_then(|w| {
        w.end_timestamp
            .as_ref()
            .and_then(|t| t.relative)
            .or_else(|| w.start_timestamp.as_ref().and_then(|t| t.relative))
    });

    (start.map(seconds_to_ms), end.map(seconds_to_ms))
}

fn seconds_to_ms(seconds: f64) -> i64 {
    (seconds * 1000.0).round() as i64
}

/// Deterministic identity of one delivery. Two deliveries of the same
/// fragment derive the same key whatever seq they would have been assigned;
/// distinct fragments differ in offsets, speaker or text and therefore in
/// the digest.
pub fn dedup_key(
    provider_bot_id: &str,
    received_at: DateTime<Utc>,
    speaker_id: Option<&str>,
    start_ms: Option<i64>,
    text: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(speaker_id.unwrap_or("").as_bytes());
    hasher.update(start_ms.unwrap_or(-1).to_le_bytes());
    hasher.update(text.as_bytes());
    let digest = format!("{:x}", hasher.finalize());

    format!(
        "{}:{}:{}",
        provider_bot_id,
        received_at.timestamp_millis(),
        &digest[..16]
    )
}

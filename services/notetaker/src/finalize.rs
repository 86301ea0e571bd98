use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{info, warn};
use ulid::Ulid;

use shared::db::repositories::{ArtifactRepository, MeetingRepository, TranscriptChunkRepository};
use shared::models::{MeetingStatus, TranscriptChunk};

use crate::error::ServiceError;
use crate::summarize::{MeetingSummary, Summarizer};

/// Assembles the final transcript and summary once a call ends. Invoked
/// from the bot-done webhook and from the manual finalize endpoint; both
/// paths may run for the same meeting, so every write is an overwrite and
/// an in-flight guard keeps the expensive summarization call from running
/// twice concurrently.
pub struct Finalizer {
    meetings: MeetingRepository,
    chunks: TranscriptChunkRepository,
    artifacts: ArtifactRepository,
    summarizer: Arc<dyn Summarizer>,
    in_flight: DashMap<String, ()>,
}

impl Finalizer {
    pub fn new(
        meetings: MeetingRepository,
        chunks: TranscriptChunkRepository,
        artifacts: ArtifactRepository,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        Self {
            meetings,
            chunks,
            artifacts,
            summarizer,
            in_flight: DashMap::new(),
        }
    }

    pub async fn finalize(&self, meeting_id: &str) -> Result<(), ServiceError> {
        let meeting = self
            .meetings
            .find_by_id(meeting_id)
            .await?
            .ok_or(ServiceError::NotFound("meeting"))?;

        let _guard = match self.in_flight.entry(meeting.id.clone()) {
            Entry::Occupied(_) => {
                info!("finalize already running for meeting {}, skipping", meeting.id);
                return Ok(());
            }
            Entry::Vacant(entry) => {
                entry.insert(());
                InFlightGuard {
                    map: &self.in_flight,
                    key: meeting.id.clone(),
                }
            }
        };

        let chunks = self.chunks.list_all(&meeting.id).await?;
        let final_transcript = assemble_transcript(&chunks);

        let summary = if final_transcript.is_empty() {
            MeetingSummary::default()
        } else {
            match self.summarizer.summarize(&final_transcript).await {
                Ok(summary) => summary,
                Err(e) => {
                    // AI degradation is not pipeline failure: the meeting
                    // still completes, with an empty summary.
                    warn!(
                        "summarization failed for meeting {}, storing empty summary: {}",
                        meeting.id, e
                    );
                    MeetingSummary::default()
                }
            }
        };

        let summary_text = (!summary.summary.is_empty()).then_some(summary.summary.as_str());

        self.artifacts
            .upsert(
                &Ulid::new().to_string(),
                &meeting.id,
                &final_transcript,
                summary_text,
                &summary.action_items,
                &summary.topics,
                Utc::now(),
            )
            .await?;

        self.meetings
            .update_status(&meeting.id, MeetingStatus::Completed)
            .await?;

        info!(
            "finalized meeting {} ({} chunks, {} transcript chars)",
            meeting.id,
            chunks.len(),
            final_transcript.len()
        );

        Ok(())
    }
}

/// Chunk texts in seq order, separated by blank lines.
pub fn assemble_transcript(chunks: &[TranscriptChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
        .trim()
        .to_string()
}

struct InFlightGuard<'a> {
    map: &'a DashMap<String, ()>,
    key: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.map.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn chunk(seq: i64, text: &str) -> TranscriptChunk {
        TranscriptChunk {
            id: format!("chunk-{seq}"),
            meeting_id: "m-1".to_string(),
            provider_bot_id: "bot-1".to_string(),
            seq,
            dedup_key: format!("key-{seq}"),
            speaker_id: None,
            speaker_name: None,
            text: text.to_string(),
            start_ms: None,
            end_ms: None,
            received_at: Utc::now(),
        }
    }

    #[test]
    fn transcript_joins_chunks_with_blank_lines() {
        let chunks = vec![chunk(0, "Hello"), chunk(1, "world")];
        assert_eq!(assemble_transcript(&chunks), "Hello\n\nworld");
    }

    #[test]
    fn empty_chunk_list_yields_empty_transcript() {
        assert_eq!(assemble_transcript(&[]), "");
    }
}

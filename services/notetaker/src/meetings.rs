use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use ulid::Ulid;
use url::Url;

use shared::db::repositories::{
    ArtifactRepository, BotRepository, MeetingRepository, NewMeeting, TranscriptChunkRepository,
};
use shared::models::{ActionItem, BotState, Meeting, MeetingStatus, TranscriptChunk};

use crate::config::{DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT, TRANSCRIPT_PAGE_LIMIT};
use crate::error::ServiceError;
use crate::finalize::Finalizer;
use crate::recall::RecallClient;

#[derive(Debug, Deserialize)]
pub struct ScheduleMeetingRequest {
    pub title: String,
    pub meet_url: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub timezone: Option<String>,
    #[serde(default)]
    pub attendee_emails: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListMeetingsQuery {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MeetingDto {
    pub id: String,
    pub title: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub timezone: String,
    pub status: MeetingStatus,
    pub meet_url: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Meeting> for MeetingDto {
    fn from(meeting: &Meeting) -> Self {
        Self {
            id: meeting.id.clone(),
            title: meeting.title.clone(),
            start_at: meeting.start_at,
            end_at: meeting.end_at,
            timezone: meeting.timezone.clone(),
            status: meeting.status,
            meet_url: meeting.meet_url.clone(),
            created_at: meeting.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MeetingPage {
    pub items: Vec<MeetingDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ArtifactDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub action_items: Vec<ActionItem>,
    pub topics: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct MeetingDetailDto {
    #[serde(flatten)]
    pub meeting: MeetingDto,
    pub attendee_emails: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar_event_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_state: Option<BotState>,
}

#[derive(Debug, Serialize)]
pub struct TranscriptChunkDto {
    pub id: String,
    pub seq: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker_name: Option<String>,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_ms: Option<i64>,
    pub received_at: DateTime<Utc>,
}

impl From<TranscriptChunk> for TranscriptChunkDto {
    fn from(chunk: TranscriptChunk) -> Self {
        Self {
            id: chunk.id,
            seq: chunk.seq,
            speaker_name: chunk.speaker_name,
            text: chunk.text,
            start_ms: chunk.start_ms,
            end_ms: chunk.end_ms,
            received_at: chunk.received_at,
        }
    }
}

/// Owner-scoped meeting operations behind the HTTP API.
pub struct MeetingService {
    meetings: MeetingRepository,
    bots: BotRepository,
    chunks: TranscriptChunkRepository,
    artifacts: ArtifactRepository,
    recall: RecallClient,
    finalizer: Arc<Finalizer>,
}

impl MeetingService {
    pub fn new(
        meetings: MeetingRepository,
        bots: BotRepository,
        chunks: TranscriptChunkRepository,
        artifacts: ArtifactRepository,
        recall: RecallClient,
        finalizer: Arc<Finalizer>,
    ) -> Self {
        Self {
            meetings,
            bots,
            chunks,
            artifacts,
            recall,
            finalizer,
        }
    }

    /// Provisions the recording bot, then persists the meeting and bot
    /// records. Provider failure leaves nothing behind; the meeting id is
    /// generated up front so the provider metadata can carry it.
    pub async fn schedule(
        &self,
        owner_id: &str,
        request: ScheduleMeetingRequest,
    ) -> Result<MeetingDto, ServiceError> {
        validate_schedule(&request)?;

        let meeting_id = Ulid::new().to_string();
        let meet_url = request.meet_url.trim().to_string();

        let provider_bot_id = self.recall.create_bot(&meet_url, &meeting_id).await?;

        let meeting = self
            .meetings
            .create(NewMeeting {
                id: meeting_id,
                owner_id: owner_id.to_string(),
                title: request.title.trim().to_string(),
                start_at: request.start_at,
                end_at: request.end_at,
                timezone: request.timezone.unwrap_or_else(|| "UTC".to_string()),
                attendee_emails: request.attendee_emails,
                meet_url,
            })
            .await?;

        self.bots
            .create(&Ulid::new().to_string(), &meeting.id, &provider_bot_id)
            .await?;

        info!("scheduled meeting {} for owner {}", meeting.id, owner_id);

        Ok(MeetingDto::from(&meeting))
    }

    pub async fn list(
        &self,
        owner_id: &str,
        query: ListMeetingsQuery,
    ) -> Result<MeetingPage, ServiceError> {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT);

        let mut meetings = self
            .meetings
            .list_for_owner(owner_id, limit + 1, query.cursor.as_deref())
            .await?;

        let next_cursor = if meetings.len() as i64 > limit {
            meetings.truncate(limit as usize);
            meetings.last().map(|m| m.id.clone())
        } else {
            None
        };

        Ok(MeetingPage {
            items: meetings.iter().map(MeetingDto::from).collect(),
            next_cursor,
        })
    }

    pub async fn get(
        &self,
        owner_id: &str,
        meeting_id: &str,
    ) -> Result<MeetingDetailDto, ServiceError> {
        let meeting = self
            .meetings
            .find_for_owner(owner_id, meeting_id)
            .await?
            .ok_or(ServiceError::NotFound("meeting"))?;

        let bot = self.bots.find_latest_for_meeting(&meeting.id).await?;
        let artifact = self.artifacts.find_by_meeting(&meeting.id).await?;

        Ok(MeetingDetailDto {
            meeting: MeetingDto::from(&meeting),
            attendee_emails: meeting.attendee_emails.clone(),
            calendar_event_id: meeting.calendar_event_id.clone(),
            artifact: artifact.map(|artifact| ArtifactDto {
                summary: artifact.summary,
                action_items: artifact.action_items.0,
                topics: artifact.topics,
                completed_at: artifact.completed_at,
            }),
            bot_state: bot.map(|bot| bot.state),
        })
    }

    /// Transcript feed page. The polling contract: pass the last seen seq
    /// back as `after_seq` until an empty page comes back.
    pub async fn transcript(
        &self,
        owner_id: &str,
        meeting_id: &str,
        after_seq: Option<i64>,
    ) -> Result<Vec<TranscriptChunkDto>, ServiceError> {
        let meeting = self
            .meetings
            .find_for_owner(owner_id, meeting_id)
            .await?
            .ok_or(ServiceError::NotFound("meeting"))?;

        let chunks = self
            .chunks
            .list_after(&meeting.id, after_seq, TRANSCRIPT_PAGE_LIMIT)
            .await?;

        Ok(chunks.into_iter().map(TranscriptChunkDto::from).collect())
    }

    pub async fn finalize(&self, owner_id: &str, meeting_id: &str) -> Result<(), ServiceError> {
        self.meetings
            .find_for_owner(owner_id, meeting_id)
            .await?
            .ok_or(ServiceError::NotFound("meeting"))?;

        self.finalizer.finalize(meeting_id).await
    }

    pub async fn delete(&self, owner_id: &str, meeting_id: &str) -> Result<(), ServiceError> {
        let meeting = self
            .meetings
            .find_for_owner(owner_id, meeting_id)
            .await?
            .ok_or(ServiceError::NotFound("meeting"))?;

        self.meetings.delete(&meeting.id).await?;

        info!("deleted meeting {} for owner {}", meeting.id, owner_id);

        Ok(())
    }
}

fn validate_schedule(request: &ScheduleMeetingRequest) -> Result<(), ServiceError> {
    if request.title.trim().is_empty() {
        return Err(ServiceError::validation("title is required"));
    }

    let url = Url::parse(request.meet_url.trim()).map_err(|_| {
        ServiceError::validation(
            "a valid meeting URL is required (e.g. from Google Meet, Zoom, or Teams)",
        )
    })?;
    if url.scheme() != "https" {
        return Err(ServiceError::validation("meeting URL must use https"));
    }

    if request.end_at <= request.start_at {
        return Err(ServiceError::validation("end time must be after start time"));
    }

    Ok(())
}

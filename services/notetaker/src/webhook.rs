use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

use shared::db::repositories::{BotRepository, MeetingRepository};
use shared::models::{BotState, MeetingStatus};

use crate::finalize::Finalizer;
use crate::sequencer::Sequencer;

pub const TRANSCRIPT_DATA_EVENT: &str = "transcript.data";
pub const BOT_DONE_EVENT: &str = "bot.done";

/// Provider webhook envelope. Everything inside is optional on purpose:
/// deliveries are validated here instead of trusted, and anything that does
/// not fit is dropped after the ack.
#[derive(Debug, Deserialize)]
pub struct WebhookEnvelope {
    pub event: String,
    pub data: Option<EventData>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventData {
    pub data: Option<EventBody>,
    pub bot: Option<BotRef>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventBody {
    #[serde(default)]
    pub words: Vec<Word>,
    pub participant: Option<Participant>,
}

/// One recognized word with timing relative to the start of the recording,
/// in seconds.
#[derive(Debug, Deserialize)]
pub struct Word {
    pub text: Option<String>,
    pub start_timestamp: Option<WordTimestamp>,
    pub end_timestamp: Option<WordTimestamp>,
}

#[derive(Debug, Deserialize)]
pub struct WordTimestamp {
    pub relative: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct Participant {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub is_host: Option<bool>,
    pub platform: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BotRef {
    pub id: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Event -> bot state table. Each event deterministically overwrites the
/// state; duplicates re-write the same value and are therefore no-ops.
pub fn bot_state_for_event(event: &str) -> Option<BotState> {
    match event {
        "bot.joining_call" | "bot.in_waiting_room" => Some(BotState::Joining),
        "bot.in_call_not_recording"
        | "bot.recording_permission_allowed"
        | "bot.in_call_recording"
        | "bot.call_ended" => Some(BotState::InCall),
        "bot.done" => Some(BotState::Done),
        "bot.fatal" => Some(BotState::Failed),
        _ => None,
    }
}

/// Coarser event -> meeting status table, projected from the same lifecycle
/// events. Joining-phase events do not move the meeting out of `scheduled`.
pub fn meeting_status_for_event(event: &str) -> Option<MeetingStatus> {
    match event {
        "bot.in_call_not_recording"
        | "bot.recording_permission_allowed"
        | "bot.in_call_recording"
        | "bot.call_ended" => Some(MeetingStatus::InProgress),
        "bot.done" => Some(MeetingStatus::Completed),
        "bot.fatal" => Some(MeetingStatus::Failed),
        _ => None,
    }
}

pub struct WebhookProcessor {
    meetings: MeetingRepository,
    bots: BotRepository,
    sequencer: Sequencer,
    finalizer: Arc<Finalizer>,
}

impl WebhookProcessor {
    pub fn new(
        meetings: MeetingRepository,
        bots: BotRepository,
        sequencer: Sequencer,
        finalizer: Arc<Finalizer>,
    ) -> Self {
        Self {
            meetings,
            bots,
            sequencer,
            finalizer,
        }
    }

    /// Entry point for provider deliveries. Never fails: the provider
    /// retries aggressively on non-success responses, so surfacing internal
    /// errors would only amplify duplicate delivery. Everything is logged
    /// and swallowed.
    pub async fn process(&self, body: &[u8]) {
        let envelope: WebhookEnvelope = match serde_json::from_slice(body) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("dropping malformed webhook body: {}", e);
                return;
            }
        };

        let event = envelope.event.clone();
        if let Err(e) = self.route(envelope).await {
            warn!("webhook processing failed for event {}: {}", event, e);
        }
    }

    async fn route(&self, envelope: WebhookEnvelope) -> anyhow::Result<()> {
        let event = envelope.event.as_str();

        let bot = envelope.data.as_ref().and_then(|d| d.bot.as_ref());
        let Some(meeting_id) = bot.and_then(|b| b.metadata.get("meeting_id")).cloned() else {
            debug!("dropping {} webhook without meeting correlation", event);
            return Ok(());
        };
        let provider_bot_id = bot.and_then(|b| b.id.clone()).unwrap_or_default();

        if event == TRANSCRIPT_DATA_EVENT {
            let body = envelope
                .data
                .and_then(|d| d.data)
                .unwrap_or_default();
            self.sequencer
                .append(
                    &meeting_id,
                    &provider_bot_id,
                    &body.words,
                    body.participant.as_ref(),
                    Utc::now(),
                )
                .await?;
            return Ok(());
        }

        let bot_state = bot_state_for_event(event);
        let meeting_status = meeting_status_for_event(event);

        if bot_state.is_none() && meeting_status.is_none() {
            debug!("ignoring unrecognized webhook event {}", event);
            return Ok(());
        }

        if let Some(state) = bot_state {
            if !self.bots.update_state(&provider_bot_id, state).await? {
                debug!("lifecycle event {} for unknown bot {}", event, provider_bot_id);
            }
        }

        if let Some(status) = meeting_status {
            self.meetings.update_status(&meeting_id, status).await?;
        }

        if event == BOT_DONE_EVENT {
            // Detached on purpose: the ack must not wait on summarization,
            // and a finalize failure must not fail the delivery.
            let finalizer = Arc::clone(&self.finalizer);
            tokio::spawn(async move {
                if let Err(e) = finalizer.finalize(&meeting_id).await {
                    error!("finalize for meeting {} failed: {}", meeting_id, e);
                }
            });
        }

        Ok(())
    }
}

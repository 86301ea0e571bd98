use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use shared::models::ActionItem;

use crate::config::{OpenAiConfig, SUMMARY_INPUT_CHAR_CAP};

/// Structured output of a summarization call. Default is the degraded
/// "nothing extracted" result used whenever the model call fails.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeetingSummary {
    pub summary: String,
    pub action_items: Vec<ActionItem>,
    pub topics: Vec<String>,
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, transcript: &str) -> Result<MeetingSummary>;
}

pub struct OpenAiSummarizer {
    http: Client,
    config: OpenAiConfig,
}

const SYSTEM_PROMPT: &str =
    "You are a strict JSON-only meeting summarization engine. Return only valid JSON.";

impl OpenAiSummarizer {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn summarize(&self, transcript: &str) -> Result<MeetingSummary> {
        let body = json!({
            "model": self.config.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": build_prompt(transcript) },
            ],
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.config.api_base))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .context("failed to send summarization request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("summarization API returned HTTP {status}: {body}"));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .context("failed to parse summarization response")?;

        let content = completion
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
            .ok_or_else(|| anyhow!("summarization response had no content"))?;

        parse_summary_content(content)
    }
}

fn build_prompt(transcript: &str) -> String {
    [
        "You are an AI that summarizes meeting transcripts.",
        "",
        "Return STRICT JSON only, matching exactly this structure:",
        "",
        r#"{ "summary": "string", "action_items": [{ "text": "string", "owner": "optional", "due_at": "optional ISO date" }], "topics": ["string"] }"#,
        "",
        "Rules:",
        "- summary: 2-4 sentence overview of the meeting",
        "- action_items: concrete tasks with owners and due dates when mentioned",
        "- topics: main discussion topics as short strings",
        "- No comments or explanations in the JSON",
        "",
        "Transcript:",
        truncate_chars(transcript, SUMMARY_INPUT_CHAR_CAP),
    ]
    .join("\n")
}

/// Character-boundary truncation; the cap protects the model call, not the
/// stored transcript.
pub fn truncate_chars(text: &str, cap: usize) -> &str {
    match text.char_indices().nth(cap) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// The strict response contract. Missing fields or wrong types fail the
/// whole parse; a shape violation is treated exactly like a transport
/// failure by the caller.
#[derive(Debug, Deserialize)]
struct SummaryContent {
    summary: String,
    action_items: Vec<ActionItemContent>,
    topics: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ActionItemContent {
    text: String,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    due_at: Option<String>,
}

pub fn parse_summary_content(content: &str) -> Result<MeetingSummary> {
    let parsed: SummaryContent = serde_json::from_str(content)
        .context("summarization response did not match the expected schema")?;

    Ok(MeetingSummary {
        summary: parsed.summary,
        action_items: parsed
            .action_items
            .into_iter()
            .map(|item| ActionItem {
                text: item.text,
                owner: item.owner,
                due_at: item.due_at.as_deref().and_then(parse_due_date),
            })
            .collect(),
        topics: parsed.topics,
    })
}

/// Models return due dates as either full timestamps or bare dates;
/// anything else is dropped rather than failing the whole summary.
fn parse_due_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::config::RecallConfig;
use crate::error::ServiceError;

pub struct RecallClient {
    http: Client,
    config: RecallConfig,
}

#[derive(Debug, Deserialize)]
struct CreateBotResponse {
    id: Option<String>,
}

impl RecallClient {
    pub fn new(config: RecallConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    /// Asks the provider to dispatch a recording bot to the meeting,
    /// subscribing this service's webhook to transcript and lifecycle
    /// events, with the meeting id as correlation metadata. Returns the
    /// opaque provider bot id. Persists nothing; the caller creates the
    /// meeting and bot records only after this succeeds.
    pub async fn create_bot(
        &self,
        meeting_url: &str,
        meeting_id: &str,
    ) -> Result<String, ServiceError> {
        let body = json!({
            "meeting_url": meeting_url,
            "recording_config": {
                "transcript": {
                    "provider": {
                        "recallai_streaming": {}
                    }
                },
                "realtime_endpoints": [
                    {
                        "type": "webhook",
                        "url": self.config.webhook_url,
                        "events": ["transcript.data", "bot.status_change"],
                    }
                ],
            },
            "metadata": { "meeting_id": meeting_id },
        });

        let response = self
            .http
            .post(format!("{}/bot/", self.config.api_base))
            .header("Authorization", format!("Token {}", self.config.api_key))
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::Provider(format!("bot request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Provider(format!(
                "bot API returned HTTP {status}: {body}"
            )));
        }

        let parsed: CreateBotResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Provider(format!("malformed bot API response: {e}")))?;

        let bot_id = parsed
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ServiceError::Provider("bot API did not return a bot id".to_string()))?;

        info!("provisioned bot {} for meeting {}", bot_id, meeting_id);

        Ok(bot_id)
    }
}
